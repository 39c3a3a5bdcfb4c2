//! Block structure
//!
//! A block links to its parent by hash and carries one coinbase plus zero or
//! more ordinary transactions. Its hash is fixed at construction.

use serde::{Deserialize, Serialize};

use crate::crypto::{compute_merkle_root, ContentHasher, Hash};
use crate::validation::Transaction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Parent block hash; `None` only for genesis
    prev_hash: Option<Hash>,
    /// Ordinary transactions in application order
    transactions: Vec<Transaction>,
    /// Value-creating transaction for this block
    coinbase: Transaction,
    /// Merkle root over the coinbase hash followed by each transaction hash
    merkle_root: Hash,
    hash: Hash,
}

impl Block {
    /// Create a block on top of `prev_hash`. The coinbase is anchored to the
    /// parent, which makes its hash (and output reference) unique per fork.
    pub fn new(prev_hash: Hash, coinbase: Transaction, transactions: Vec<Transaction>) -> Self {
        Self::build(Some(prev_hash), coinbase, transactions)
    }

    /// Create a parentless genesis block holding only a coinbase
    pub fn genesis(coinbase: Transaction) -> Self {
        Self::build(None, coinbase, Vec::new())
    }

    fn build(prev_hash: Option<Hash>, mut coinbase: Transaction, transactions: Vec<Transaction>) -> Self {
        coinbase.anchor = prev_hash;
        let tx_hashes: Vec<Hash> = std::iter::once(&coinbase)
            .chain(transactions.iter())
            .map(|tx| tx.hash())
            .collect();
        let merkle_root = compute_merkle_root(&tx_hashes);
        let hash = header_hash(prev_hash.as_ref(), &merkle_root, tx_hashes.len());

        Self {
            prev_hash,
            transactions,
            coinbase,
            merkle_root,
            hash,
        }
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn prev_hash(&self) -> Option<&Hash> {
        self.prev_hash.as_ref()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn coinbase(&self) -> &Transaction {
        &self.coinbase
    }

    pub fn merkle_root(&self) -> Hash {
        self.merkle_root
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_none()
    }

    /// Recompute the hash from contents; false if the block was tampered
    /// with after deserialisation
    pub fn verify_hash(&self) -> bool {
        let rebuilt = Self::build(self.prev_hash, self.coinbase.clone(), self.transactions.clone());
        self.coinbase.anchor == self.prev_hash
            && rebuilt.hash == self.hash
            && rebuilt.merkle_root == self.merkle_root
    }
}

fn header_hash(prev_hash: Option<&Hash>, merkle_root: &Hash, tx_count: usize) -> Hash {
    let mut hasher = ContentHasher::new().domain(b"block");
    match prev_hash {
        Some(prev) => hasher.update_bytes(&[1]).update_hash(prev),
        None => hasher.update_bytes(&[0]),
    };
    hasher.update_hash(merkle_root).update_len(tx_count);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;

    fn coinbase(seed: u8, value: i64) -> Transaction {
        Transaction::coinbase(value, PrivateKey::from_bytes(&[seed; 32]).unwrap().public_key())
    }

    #[test]
    fn test_genesis_detection() {
        let genesis = Block::genesis(coinbase(1, 25));
        assert!(genesis.is_genesis());
        assert!(genesis.prev_hash().is_none());
        assert!(genesis.transactions().is_empty());

        let child = Block::new(genesis.hash(), coinbase(2, 25), Vec::new());
        assert!(!child.is_genesis());
        assert_eq!(child.prev_hash(), Some(&genesis.hash()));
    }

    #[test]
    fn test_hash_commits_to_parent_and_coinbase() {
        let parent_a = Block::genesis(coinbase(1, 25));
        let parent_b = Block::genesis(coinbase(1, 26));
        assert_ne!(parent_a.hash(), parent_b.hash());

        let a = Block::new(parent_a.hash(), coinbase(2, 25), Vec::new());
        let b = Block::new(parent_b.hash(), coinbase(2, 25), Vec::new());
        assert_ne!(a.hash(), b.hash());
        assert_ne!(a.coinbase().hash(), b.coinbase().hash());
    }

    #[test]
    fn test_coinbase_anchored_to_parent() {
        let genesis = Block::genesis(coinbase(1, 25));
        assert_eq!(genesis.coinbase().anchor, None);

        let b1 = Block::new(genesis.hash(), coinbase(2, 25), Vec::new());
        let b2 = Block::new(b1.hash(), coinbase(2, 25), Vec::new());
        assert_eq!(b1.coinbase().anchor, Some(genesis.hash()));
        assert_ne!(b1.coinbase().utxo_ref(0), b2.coinbase().utxo_ref(0));
    }

    #[test]
    fn test_genesis_differs_from_zero_parent() {
        let genesis = Block::genesis(coinbase(1, 25));
        let zero_parent = Block::new(Hash::zero(), coinbase(1, 25), Vec::new());
        assert_ne!(genesis.hash(), zero_parent.hash());
    }

    #[test]
    fn test_verify_hash_after_serde() {
        let block = Block::new(Hash::zero(), coinbase(2, 25), vec![coinbase(3, 1)]);
        let json = serde_json::to_string(&block).unwrap();
        let decoded: Block = serde_json::from_str(&json).unwrap();
        assert!(decoded.verify_hash());
        assert_eq!(decoded.hash(), block.hash());

        let tampered = json.replace("\"value\":1", "\"value\":2");
        let tampered: Block = serde_json::from_str(&tampered).unwrap();
        assert!(!tampered.verify_hash());

        let mut reanchored: serde_json::Value = serde_json::from_str(&json).unwrap();
        reanchored["coinbase"]["anchor"] = serde_json::Value::Null;
        let reanchored: Block = serde_json::from_value(reanchored).unwrap();
        assert!(!reanchored.verify_hash());
    }
}
