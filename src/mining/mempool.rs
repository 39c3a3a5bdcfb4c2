//! Pending-transaction pool
//!
//! Transactions submitted by clients wait here, unvalidated, until a block
//! that includes them is accepted.

use std::collections::HashMap;

use crate::crypto::Hash;
use crate::validation::Transaction;

/// Transactions unique by hash, kept in arrival order
#[derive(Debug, Clone, Default)]
pub struct TransactionPool {
    entries: HashMap<Hash, Transaction>,
    by_arrival: Vec<Hash>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `tx`. Returns false if a transaction with the same hash is
    /// already pooled.
    pub fn add_transaction(&mut self, tx: Transaction) -> bool {
        let hash = tx.hash();
        if self.entries.contains_key(&hash) {
            return false;
        }
        self.entries.insert(hash, tx);
        self.by_arrival.push(hash);
        true
    }

    pub fn remove_transaction(&mut self, hash: &Hash) -> Option<Transaction> {
        let tx = self.entries.remove(hash)?;
        self.by_arrival.retain(|h| h != hash);
        Some(tx)
    }

    /// Drop every transaction whose hash is in `hashes`
    pub fn remove_all<'a, I>(&mut self, hashes: I) -> usize
    where
        I: IntoIterator<Item = &'a Hash>,
    {
        let before = self.entries.len();
        for hash in hashes {
            self.entries.remove(hash);
        }
        let entries = &self.entries;
        self.by_arrival.retain(|h| entries.contains_key(h));
        before - self.entries.len()
    }

    pub fn get(&self, hash: &Hash) -> Option<&Transaction> {
        self.entries.get(hash)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.entries.contains_key(hash)
    }

    /// Pooled transactions in arrival order
    pub fn transactions(&self) -> Vec<Transaction> {
        self.by_arrival
            .iter()
            .filter_map(|hash| self.entries.get(hash))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_arrival.clear();
    }
}
