//! Ledger configuration
//!
//! Every field falls back to the protocol constant, so an empty JSON object
//! is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::constants::{COINBASE_REWARD, CUT_OFF_AGE};
use crate::storage::Amount;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// How far below the best height a fork may still be extended
    #[serde(default = "default_cut_off_age")]
    pub cut_off_age: u64,
    /// Coinbase value used by the block assembler
    #[serde(default = "default_coinbase_reward")]
    pub coinbase_reward: Amount,
}

fn default_cut_off_age() -> u64 {
    CUT_OFF_AGE
}

fn default_coinbase_reward() -> Amount {
    COINBASE_REWARD
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            cut_off_age: CUT_OFF_AGE,
            coinbase_reward: COINBASE_REWARD,
        }
    }
}

impl LedgerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cut_off_age == 0 {
            return Err(ConfigError::Invalid("cut_off_age must be at least 1".into()));
        }
        if self.coinbase_reward < 0 {
            return Err(ConfigError::Invalid(format!(
                "coinbase_reward must be non-negative, got {}",
                self.coinbase_reward
            )));
        }
        Ok(())
    }
}
