//! Block assembly
//!
//! Builds a candidate block on top of the current best fork from the pending
//! transaction pool.

use log::debug;

use crate::consensus::{Block, BlockChain};
use crate::crypto::PublicKey;
use crate::storage::Amount;
use crate::validation::{apply_batch, Transaction};

/// Assembles candidate blocks paying the coinbase to one miner key
#[derive(Debug, Clone)]
pub struct BlockAssembler {
    miner: PublicKey,
    reward: Amount,
}

impl BlockAssembler {
    pub fn new(miner: PublicKey, reward: Amount) -> Self {
        Self { miner, reward }
    }

    pub fn miner(&self) -> &PublicKey {
        &self.miner
    }

    /// Assemble a block atop the best block.
    ///
    /// Pending transactions are filtered through the same greedy batch
    /// applier `add_block` uses, in arrival order, so the result is accepted
    /// by an unchanged chain.
    pub fn assemble(&self, chain: &BlockChain) -> Block {
        let pending = chain.transaction_pool().transactions();
        let (accepted, _) = apply_batch(&pending, chain.max_height_utxo_pool());
        debug!(
            "Assembling block atop {} with {} of {} pending txs",
            chain.best_hash().short(),
            accepted.len(),
            pending.len()
        );
        self.assemble_with(chain, accepted)
    }

    /// Assemble a block atop the best block with exactly `transactions`
    pub fn assemble_with(&self, chain: &BlockChain, transactions: Vec<Transaction>) -> Block {
        let coinbase = Transaction::coinbase(self.reward, self.miner.clone());
        Block::new(chain.best_hash(), coinbase, transactions)
    }
}
