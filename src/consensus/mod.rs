//! Consensus module - block structure and the fork-aware chain manager

mod block;
mod chain;

pub use block::*;
pub use chain::*;
