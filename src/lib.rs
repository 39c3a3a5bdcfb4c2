//! UTXO ledger core
//!
//! A transaction validator over an unspent-output set, and a chain manager
//! that applies it to incoming blocks, tracks competing forks within a
//! bounded window, and exposes the best fork for block production.

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod mining;
pub mod service;
pub mod storage;
pub mod validation;

/// Protocol constants
pub mod constants {
    use crate::storage::Amount;

    /// Base units per coin
    pub const COIN: Amount = 100_000_000;

    /// How many blocks below the best height a fork may still be extended
    pub const CUT_OFF_AGE: u64 = 10;

    /// Default coinbase value for assembled blocks
    pub const COINBASE_REWARD: Amount = 25 * COIN;
}

pub use config::LedgerConfig;
pub use consensus::{Block, BlockChain, ChainError};
pub use validation::{Transaction, TransactionError};
