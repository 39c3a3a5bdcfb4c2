//! Fork-aware chain manager
//!
//! Keeps a tree of fork states (block, UTXO snapshot, height) reachable within
//! the cut-off window below the best height, applies incoming blocks against
//! their parent's snapshot, and tracks the max-height fork for block building.

use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{ConfigError, LedgerConfig};
use crate::consensus::Block;
use crate::constants::CUT_OFF_AGE;
use crate::crypto::Hash;
use crate::mining::TransactionPool;
use crate::storage::{UtxoPool, UtxoRef};
use crate::validation::{apply_batch, Transaction};

/// Why a block was not added
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Block declares no parent")]
    MissingParent,
    #[error("Block {0} is already in the chain")]
    DuplicateBlock(Hash),
    #[error("Parent {0} is unknown or pruned")]
    UnknownParent(Hash),
    #[error("Coinbase is not anchored to parent {0}")]
    UnanchoredCoinbase(Hash),
    #[error("Only {accepted} of {submitted} transactions are valid")]
    InvalidTransactions { accepted: usize, submitted: usize },
    #[error("Height {height} is at or below the cut-off floor {floor}")]
    BelowCutoff { height: u64, floor: u64 },
}

/// One block's position in the fork tree
#[derive(Debug, Clone)]
pub struct ForkNode {
    pub block: Arc<Block>,
    /// Spendable outputs after applying this block; never mutated once recorded
    pub utxo_pool: Arc<UtxoPool>,
    pub height: u64,
    parent: Option<Hash>,
    children: Vec<Hash>,
}

impl ForkNode {
    pub fn parent(&self) -> Option<&Hash> {
        self.parent.as_ref()
    }

    pub fn children(&self) -> &[Hash] {
        &self.children
    }
}

/// Snapshot of chain counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStats {
    pub height: u64,
    pub tip_hash: Hash,
    pub utxo_count: usize,
    pub fork_count: usize,
    pub frontier_count: usize,
    pub pending_transactions: usize,
}

#[derive(Debug)]
pub struct BlockChain {
    forks: HashMap<Hash, ForkNode>,
    tx_pool: TransactionPool,
    max_height: u64,
    best_hash: Hash,
    best_block: Arc<Block>,
    best_pool: Arc<UtxoPool>,
    cut_off_age: u64,
}

impl BlockChain {
    /// Create a chain holding only `genesis`, which is trusted as valid
    pub fn new(genesis: Block) -> Self {
        Self::from_genesis(genesis, CUT_OFF_AGE)
    }

    /// Like [`new`](Self::new) with the window taken from `config`, which
    /// must pass [`LedgerConfig::validate`]
    pub fn with_config(genesis: Block, config: &LedgerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_genesis(genesis, config.cut_off_age))
    }

    fn from_genesis(genesis: Block, cut_off_age: u64) -> Self {
        let mut pool = UtxoPool::new();
        credit_coinbase(genesis.coinbase(), &mut pool);

        let hash = genesis.hash();
        let block = Arc::new(genesis);
        let pool = Arc::new(pool);

        let mut forks = HashMap::new();
        forks.insert(
            hash,
            ForkNode {
                block: Arc::clone(&block),
                utxo_pool: Arc::clone(&pool),
                height: 1,
                parent: None,
                children: Vec::new(),
            },
        );
        info!("Chain initialised at genesis {}", hash.short());

        Self {
            forks,
            tx_pool: TransactionPool::new(),
            max_height: 1,
            best_hash: hash,
            best_block: block,
            best_pool: pool,
            cut_off_age,
        }
    }

    /// Block at the tip of the max-height fork
    pub fn max_height_block(&self) -> &Block {
        &self.best_block
    }

    /// Snapshot to build the next block on top of the max-height block
    pub fn max_height_utxo_pool(&self) -> &UtxoPool {
        &self.best_pool
    }

    /// Shared handle to the best snapshot, for readers on other threads
    pub fn best_snapshot(&self) -> Arc<UtxoPool> {
        Arc::clone(&self.best_pool)
    }

    pub fn best_block_shared(&self) -> Arc<Block> {
        Arc::clone(&self.best_block)
    }

    pub fn max_height(&self) -> u64 {
        self.max_height
    }

    pub fn best_hash(&self) -> Hash {
        self.best_hash
    }

    pub fn cut_off_age(&self) -> u64 {
        self.cut_off_age
    }

    pub fn transaction_pool(&self) -> &TransactionPool {
        &self.tx_pool
    }

    pub fn transaction_pool_mut(&mut self) -> &mut TransactionPool {
        &mut self.tx_pool
    }

    pub fn contains_block(&self, hash: &Hash) -> bool {
        self.forks.contains_key(hash)
    }

    pub fn get_block(&self, hash: &Hash) -> Option<&Block> {
        self.forks.get(hash).map(|node| node.block.as_ref())
    }

    pub fn get_utxo_pool(&self, hash: &Hash) -> Option<&UtxoPool> {
        self.forks.get(hash).map(|node| node.utxo_pool.as_ref())
    }

    pub fn height_of(&self, hash: &Hash) -> Option<u64> {
        self.forks.get(hash).map(|node| node.height)
    }

    pub fn fork(&self, hash: &Hash) -> Option<&ForkNode> {
        self.forks.get(hash)
    }

    /// Number of retained fork states
    pub fn fork_count(&self) -> usize {
        self.forks.len()
    }

    /// Retained blocks with no retained child, highest first
    pub fn fork_tips(&self) -> Vec<(Hash, u64)> {
        let mut tips: Vec<(Hash, u64)> = self
            .forks
            .iter()
            .filter(|(_, node)| node.children.is_empty())
            .map(|(hash, node)| (*hash, node.height))
            .collect();
        tips.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        tips
    }

    /// Lowest height a block may have and still be accepted
    pub fn min_acceptable_height(&self) -> u64 {
        self.max_height.saturating_sub(self.cut_off_age) + 1
    }

    /// Add `block` if its parent is retained, its coinbase is anchored to that
    /// parent, every ordinary transaction is valid in order against the
    /// parent's snapshot, and its height is above
    /// `max_height - cut_off_age`. Returns the new block's height.
    pub fn try_add_block(&mut self, block: Block) -> Result<u64, ChainError> {
        let prev_hash = *block.prev_hash().ok_or(ChainError::MissingParent)?;
        let hash = block.hash();
        if self.forks.contains_key(&hash) {
            return Err(ChainError::DuplicateBlock(hash));
        }
        let parent = self
            .forks
            .get(&prev_hash)
            .ok_or(ChainError::UnknownParent(prev_hash))?;
        if block.coinbase().anchor != Some(prev_hash) {
            return Err(ChainError::UnanchoredCoinbase(prev_hash));
        }

        let submitted = block.transactions().len();
        let (accepted, mut pool) = apply_batch(block.transactions(), &parent.utxo_pool);
        if accepted.len() != submitted {
            return Err(ChainError::InvalidTransactions {
                accepted: accepted.len(),
                submitted,
            });
        }
        credit_coinbase(block.coinbase(), &mut pool);

        let height = parent.height + 1;
        let floor = self.max_height.saturating_sub(self.cut_off_age);
        if height <= floor {
            return Err(ChainError::BelowCutoff { height, floor });
        }

        let included: Vec<Hash> = block.transactions().iter().map(Transaction::hash).collect();
        let block = Arc::new(block);
        let pool = Arc::new(pool);

        if let Some(parent) = self.forks.get_mut(&prev_hash) {
            parent.children.push(hash);
        }
        self.forks.insert(
            hash,
            ForkNode {
                block: Arc::clone(&block),
                utxo_pool: Arc::clone(&pool),
                height,
                parent: Some(prev_hash),
                children: Vec::new(),
            },
        );

        if height > self.max_height {
            self.max_height = height;
            self.best_hash = hash;
            self.best_block = block;
            self.best_pool = pool;
        }

        let removed = self.tx_pool.remove_all(included.iter());
        let evicted = self.prune();
        info!(
            "Accepted block {} at height {} ({} txs, best height {}, {} pooled txs cleared, {} forks evicted)",
            hash.short(),
            height,
            submitted,
            self.max_height,
            removed,
            evicted
        );

        Ok(height)
    }

    /// Boolean form of [`try_add_block`](Self::try_add_block); the reason for
    /// a rejection is only logged
    pub fn add_block(&mut self, block: Block) -> bool {
        let hash = block.hash();
        match self.try_add_block(block) {
            Ok(_) => true,
            Err(err) => {
                debug!("Rejected block {}: {}", hash.short(), err);
                false
            }
        }
    }

    /// Pool a transaction for a future block. No validation happens here.
    pub fn add_transaction(&mut self, tx: Transaction) {
        self.tx_pool.add_transaction(tx);
    }

    pub fn stats(&self) -> ChainStats {
        ChainStats {
            height: self.max_height,
            tip_hash: self.best_hash,
            utxo_count: self.best_pool.len(),
            fork_count: self.forks.len(),
            frontier_count: self.forks.values().filter(|n| n.children.is_empty()).count(),
            pending_transactions: self.tx_pool.len(),
        }
    }

    /// Evict every fork state that can no longer be a parent, i.e. with
    /// `height < max_height - cut_off_age`.
    ///
    /// Sweeps from the roots of the retained tree downwards; because heights
    /// grow by one along every edge, all evictable nodes hang below an
    /// evictable root. Retained children of evicted nodes become new roots.
    fn prune(&mut self) -> usize {
        let keep_from = self.max_height.saturating_sub(self.cut_off_age);

        let mut stack: Vec<Hash> = self
            .forks
            .iter()
            .filter(|(_, node)| node.height < keep_from)
            .filter(|(_, node)| match node.parent {
                Some(parent) => !self.forks.contains_key(&parent),
                None => true,
            })
            .map(|(hash, _)| *hash)
            .collect();

        let mut evicted = 0;
        while let Some(hash) = stack.pop() {
            let Some(node) = self.forks.remove(&hash) else {
                continue;
            };
            evicted += 1;
            for child in node.children {
                if self.forks.get(&child).map_or(false, |c| c.height < keep_from) {
                    stack.push(child);
                }
            }
        }

        if evicted > 0 {
            debug!(
                "Pruned {} fork states below height {} ({} retained)",
                evicted,
                keep_from,
                self.forks.len()
            );
        }
        evicted
    }
}

/// Credit a coinbase's first output. No subsidy cap is applied.
fn credit_coinbase(coinbase: &Transaction, pool: &mut UtxoPool) {
    if let Some(output) = coinbase.outputs.first() {
        pool.add(UtxoRef::new(coinbase.hash(), 0), output.clone());
    }
}
