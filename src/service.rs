//! Single-writer ledger service
//!
//! One tokio task owns the `BlockChain` and applies commands from an mpsc
//! queue in arrival order, so every mutation is serialised and every reply
//! observes a consistent best height and snapshot. Snapshots are handed out
//! as shared `Arc`s and can be read from any task.

use log::{debug, info};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::consensus::{Block, BlockChain, ChainStats};
use crate::mining::BlockAssembler;
use crate::storage::UtxoPool;
use crate::validation::Transaction;

/// Commands buffered before submitters start waiting
pub const COMMAND_QUEUE_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Ledger service has stopped")]
    Closed,
}

impl<T> From<mpsc::error::SendError<T>> for ServiceError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        ServiceError::Closed
    }
}

impl From<oneshot::error::RecvError> for ServiceError {
    fn from(_: oneshot::error::RecvError) -> Self {
        ServiceError::Closed
    }
}

enum Command {
    AddBlock {
        block: Block,
        reply: oneshot::Sender<bool>,
    },
    AddTransaction {
        tx: Transaction,
    },
    BestBlock {
        reply: oneshot::Sender<Arc<Block>>,
    },
    BestUtxoPool {
        reply: oneshot::Sender<Arc<UtxoPool>>,
    },
    PendingTransactions {
        reply: oneshot::Sender<Vec<Transaction>>,
    },
    Assemble {
        assembler: BlockAssembler,
        reply: oneshot::Sender<Block>,
    },
    Stats {
        reply: oneshot::Sender<ChainStats>,
    },
}

/// Owner of the applier task
pub struct LedgerService;

impl LedgerService {
    /// Move `chain` into a new applier task.
    ///
    /// The task ends once every handle is dropped and yields the chain back
    /// through the join handle.
    pub fn spawn(chain: BlockChain) -> (LedgerHandle, JoinHandle<BlockChain>) {
        let (sender, receiver) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let task = tokio::spawn(run(chain, receiver));
        (LedgerHandle { sender }, task)
    }
}

async fn run(mut chain: BlockChain, mut receiver: mpsc::Receiver<Command>) -> BlockChain {
    info!("Ledger service started at height {}", chain.max_height());
    while let Some(command) = receiver.recv().await {
        match command {
            Command::AddBlock { block, reply } => {
                let _ = reply.send(chain.add_block(block));
            }
            Command::AddTransaction { tx } => {
                debug!("Pooling tx {}", tx.hash().short());
                chain.add_transaction(tx);
            }
            Command::BestBlock { reply } => {
                let _ = reply.send(chain.best_block_shared());
            }
            Command::BestUtxoPool { reply } => {
                let _ = reply.send(chain.best_snapshot());
            }
            Command::PendingTransactions { reply } => {
                let _ = reply.send(chain.transaction_pool().transactions());
            }
            Command::Assemble { assembler, reply } => {
                let _ = reply.send(assembler.assemble(&chain));
            }
            Command::Stats { reply } => {
                let _ = reply.send(chain.stats());
            }
        }
    }
    info!("Ledger service stopped at height {}", chain.max_height());
    chain
}

/// Cloneable submitter for the ledger service
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<Command>,
}

impl LedgerHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.sender.send(make(reply)).await?;
        Ok(response.await?)
    }

    /// Submit a block; true if it was added
    pub async fn add_block(&self, block: Block) -> Result<bool, ServiceError> {
        self.request(|reply| Command::AddBlock { block, reply }).await
    }

    pub async fn add_transaction(&self, tx: Transaction) -> Result<(), ServiceError> {
        self.sender.send(Command::AddTransaction { tx }).await?;
        Ok(())
    }

    pub async fn best_block(&self) -> Result<Arc<Block>, ServiceError> {
        self.request(|reply| Command::BestBlock { reply }).await
    }

    pub async fn best_utxo_pool(&self) -> Result<Arc<UtxoPool>, ServiceError> {
        self.request(|reply| Command::BestUtxoPool { reply }).await
    }

    pub async fn pending_transactions(&self) -> Result<Vec<Transaction>, ServiceError> {
        self.request(|reply| Command::PendingTransactions { reply }).await
    }

    /// Assemble a candidate block against the state at the time the command
    /// is applied
    pub async fn assemble_block(&self, assembler: BlockAssembler) -> Result<Block, ServiceError> {
        self.request(|reply| Command::Assemble { assembler, reply }).await
    }

    pub async fn stats(&self) -> Result<ChainStats, ServiceError> {
        self.request(|reply| Command::Stats { reply }).await
    }
}
