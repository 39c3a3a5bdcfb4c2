//! Validation module - transactions and the snapshot-based validator

mod handler;
mod transaction;

pub use handler::*;
pub use transaction::*;
