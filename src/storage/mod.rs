//! Storage module - in-memory ledger snapshots

mod utxo;

pub use utxo::*;
