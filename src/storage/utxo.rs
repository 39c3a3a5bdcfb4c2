//! UTXO pool implementation
//!
//! In-memory ledger snapshot of unspent transaction outputs for one fork.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::crypto::{Hash, PublicKey};

/// Output value in base units. Signed so that negative declarations can be
/// represented and rejected by validation.
pub type Amount = i64;

/// Reference to one output of one transaction: (producing tx hash, output index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UtxoRef {
    pub tx_hash: Hash,
    pub index: u32,
}

impl UtxoRef {
    pub fn new(tx_hash: Hash, index: u32) -> Self {
        Self { tx_hash, index }
    }
}

impl fmt::Display for UtxoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_hash.short(), self.index)
    }
}

/// A transaction output: value locked to an owner key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Amount in base units
    pub value: Amount,
    /// Key whose signature may spend this output
    pub owner: PublicKey,
}

impl TxOutput {
    pub fn new(value: Amount, owner: PublicKey) -> Self {
        Self { value, owner }
    }
}

/// Set of spendable outputs as of one block.
///
/// Cloning yields an independent snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoPool {
    utxos: HashMap<UtxoRef, TxOutput>,
}

impl UtxoPool {
    pub fn new() -> Self {
        Self {
            utxos: HashMap::new(),
        }
    }

    pub fn contains(&self, utxo: &UtxoRef) -> bool {
        self.utxos.contains_key(utxo)
    }

    pub fn get(&self, utxo: &UtxoRef) -> Option<&TxOutput> {
        self.utxos.get(utxo)
    }

    /// Add a spendable output, replacing any output already under that reference
    pub fn add(&mut self, utxo: UtxoRef, output: TxOutput) {
        self.utxos.insert(utxo, output);
    }

    /// Remove a spent output
    pub fn remove(&mut self, utxo: &UtxoRef) -> Option<TxOutput> {
        self.utxos.remove(utxo)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UtxoRef, &TxOutput)> {
        self.utxos.iter()
    }

    /// All references spendable by `owner`, sorted for stable output
    pub fn refs_owned_by(&self, owner: &PublicKey) -> Vec<UtxoRef> {
        let mut refs: Vec<UtxoRef> = self
            .utxos
            .iter()
            .filter(|(_, output)| output.owner == *owner)
            .map(|(utxo, _)| *utxo)
            .collect();
        refs.sort();
        refs
    }

    pub fn balance_of(&self, owner: &PublicKey) -> i128 {
        self.utxos
            .values()
            .filter(|output| output.owner == *owner)
            .map(|output| output.value as i128)
            .sum()
    }

    pub fn total_value(&self) -> i128 {
        self.utxos.values().map(|output| output.value as i128).sum()
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }
}
