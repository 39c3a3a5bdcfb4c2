//! Mining module - pending transaction pool and block assembly

mod assembler;
mod mempool;

pub use assembler::*;
pub use mempool::*;
