//! Transaction validation against a ledger snapshot
//!
//! Pure checks of a single transaction plus the greedy, order-dependent
//! batch applier used both for block acceptance and block assembly.

use log::debug;
use std::collections::HashSet;
use thiserror::Error;

use super::Transaction;
use crate::storage::{Amount, UtxoPool, UtxoRef};

/// Reasons a transaction is invalid against a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("Claimed output {0} is not in the UTXO pool")]
    MissingInput(UtxoRef),
    #[error("Invalid signature on input {index}")]
    InvalidSignature { index: usize },
    #[error("Output {0} claimed more than once")]
    DuplicateInput(UtxoRef),
    #[error("Output {index} has negative value {value}")]
    NegativeOutput { index: usize, value: Amount },
    #[error("Outputs ({outputs}) exceed inputs ({inputs})")]
    ValueImbalance { inputs: i128, outputs: i128 },
}

/// Check `tx` against `pool`, stopping at the first failure.
///
/// Check order: claimed outputs exist, signatures verify against the claimed
/// owner, no output claimed twice, no negative outputs, inputs cover outputs.
pub fn check_transaction(tx: &Transaction, pool: &UtxoPool) -> Result<(), TransactionError> {
    let mut input_sum: i128 = 0;

    for (index, input) in tx.inputs.iter().enumerate() {
        let utxo = input.utxo_ref();
        let claimed = pool.get(&utxo).ok_or(TransactionError::MissingInput(utxo))?;

        let verified = match (tx.signing_payload(index), &input.signature) {
            (Some(payload), Some(signature)) => claimed.owner.verify(&payload, signature),
            _ => false,
        };
        if !verified {
            return Err(TransactionError::InvalidSignature { index });
        }

        input_sum += claimed.value as i128;
    }

    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        let utxo = input.utxo_ref();
        if !seen.insert(utxo) {
            return Err(TransactionError::DuplicateInput(utxo));
        }
    }

    if let Some((index, output)) = tx.outputs.iter().enumerate().find(|(_, o)| o.value < 0) {
        return Err(TransactionError::NegativeOutput {
            index,
            value: output.value,
        });
    }

    let output_sum = tx.total_output_value();
    if input_sum < output_sum {
        return Err(TransactionError::ValueImbalance {
            inputs: input_sum,
            outputs: output_sum,
        });
    }

    Ok(())
}

/// Boolean form of [`check_transaction`]
pub fn is_valid_tx(tx: &Transaction, pool: &UtxoPool) -> bool {
    check_transaction(tx, pool).is_ok()
}

/// Remove a transaction's claimed outputs and add its own outputs.
///
/// Performs no validation.
pub fn apply_transaction(tx: &Transaction, pool: &mut UtxoPool) {
    for input in &tx.inputs {
        pool.remove(&input.utxo_ref());
    }
    let tx_hash = tx.hash();
    for (index, output) in tx.outputs.iter().enumerate() {
        pool.add(UtxoRef::new(tx_hash, index as u32), output.clone());
    }
}

/// Ledger handler holding its own copy of a snapshot
#[derive(Debug, Clone)]
pub struct TxHandler {
    pool: UtxoPool,
}

impl TxHandler {
    /// Start from a copy of `pool`; the caller's snapshot is never touched
    pub fn new(pool: &UtxoPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub fn is_valid_tx(&self, tx: &Transaction) -> bool {
        is_valid_tx(tx, &self.pool)
    }

    /// Process `candidates` in order, keeping each one that is valid against
    /// the snapshot as already updated by the ones kept before it.
    ///
    /// Invalid transactions are dropped; callers detect them by comparing
    /// lengths. Conflicts are resolved first-come, not by searching for a
    /// maximal consistent subset.
    pub fn handle_txs(&mut self, candidates: &[Transaction]) -> Vec<Transaction> {
        let mut accepted = Vec::with_capacity(candidates.len());
        for tx in candidates {
            match check_transaction(tx, &self.pool) {
                Ok(()) => {
                    apply_transaction(tx, &mut self.pool);
                    accepted.push(tx.clone());
                }
                Err(err) => debug!("Dropping tx {}: {}", tx.hash().short(), err),
            }
        }
        accepted
    }

    pub fn utxo_pool(&self) -> &UtxoPool {
        &self.pool
    }

    pub fn into_utxo_pool(self) -> UtxoPool {
        self.pool
    }
}

/// Apply a batch to a copy of `pool`, returning the accepted subset and the
/// resulting snapshot.
pub fn apply_batch(candidates: &[Transaction], pool: &UtxoPool) -> (Vec<Transaction>, UtxoPool) {
    let mut handler = TxHandler::new(pool);
    let accepted = handler.handle_txs(candidates);
    (accepted, handler.into_utxo_pool())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{PrivateKey, SchnorrSignature};
    use crate::storage::TxOutput;

    fn key(seed: u8) -> PrivateKey {
        PrivateKey::from_bytes(&[seed; 32]).unwrap()
    }

    /// Pool holding one coinbase output of `value` owned by `owner`
    fn funded(owner: &PrivateKey, value: Amount) -> (UtxoPool, UtxoRef) {
        let coinbase = Transaction::coinbase(value, owner.public_key());
        let mut pool = UtxoPool::new();
        apply_transaction(&coinbase, &mut pool);
        (pool, coinbase.utxo_ref(0))
    }

    #[test]
    fn test_valid_spend() {
        let (alice, bob) = (key(1), key(2));
        let (pool, utxo) = funded(&alice, 100);

        let tx = Transaction::signed(
            &[utxo],
            vec![
                TxOutput::new(60, bob.public_key()),
                TxOutput::new(40, alice.public_key()),
            ],
            &alice,
        );
        assert_eq!(check_transaction(&tx, &pool), Ok(()));
    }

    #[test]
    fn test_missing_input() {
        let alice = key(1);
        let (pool, _) = funded(&alice, 100);
        let bogus = UtxoRef::new(crate::crypto::hash_bytes(b"nowhere"), 0);

        let tx = Transaction::signed(&[bogus], vec![TxOutput::new(1, alice.public_key())], &alice);
        assert_eq!(
            check_transaction(&tx, &pool),
            Err(TransactionError::MissingInput(bogus))
        );
    }

    #[test]
    fn test_wrong_signer() {
        let (alice, mallory) = (key(1), key(3));
        let (pool, utxo) = funded(&alice, 100);

        let tx = Transaction::signed(&[utxo], vec![TxOutput::new(100, mallory.public_key())], &mallory);
        assert_eq!(
            check_transaction(&tx, &pool),
            Err(TransactionError::InvalidSignature { index: 0 })
        );
    }

    #[test]
    fn test_unsigned_and_garbage_signature() {
        let alice = key(1);
        let (pool, utxo) = funded(&alice, 100);

        let mut tx = Transaction::new(Vec::new(), vec![TxOutput::new(10, alice.public_key())]);
        tx.add_input(utxo.tx_hash, utxo.index);
        assert!(!is_valid_tx(&tx, &pool));

        tx.inputs[0].signature = Some(SchnorrSignature([9u8; 64]));
        assert!(!is_valid_tx(&tx, &pool));
    }

    #[test]
    fn test_signature_check_precedes_duplicate_check() {
        let alice = key(1);
        let (pool, utxo) = funded(&alice, 100);

        let mut tx = Transaction::signed(&[utxo, utxo], vec![TxOutput::new(1, alice.public_key())], &alice);
        assert_eq!(
            check_transaction(&tx, &pool),
            Err(TransactionError::DuplicateInput(utxo))
        );

        tx.inputs[1].signature = None;
        assert_eq!(
            check_transaction(&tx, &pool),
            Err(TransactionError::InvalidSignature { index: 1 })
        );
    }

    #[test]
    fn test_negative_output() {
        let alice = key(1);
        let (pool, utxo) = funded(&alice, 100);

        let tx = Transaction::signed(
            &[utxo],
            vec![
                TxOutput::new(150, alice.public_key()),
                TxOutput::new(-50, key(2).public_key()),
            ],
            &alice,
        );
        assert_eq!(
            check_transaction(&tx, &pool),
            Err(TransactionError::NegativeOutput { index: 1, value: -50 })
        );
    }

    #[test]
    fn test_value_imbalance() {
        let alice = key(1);
        let (pool, utxo) = funded(&alice, 100);

        let exact = Transaction::signed(&[utxo], vec![TxOutput::new(100, alice.public_key())], &alice);
        assert!(is_valid_tx(&exact, &pool));

        let over = Transaction::signed(&[utxo], vec![TxOutput::new(101, alice.public_key())], &alice);
        assert_eq!(
            check_transaction(&over, &pool),
            Err(TransactionError::ValueImbalance { inputs: 100, outputs: 101 })
        );
    }

    #[test]
    fn test_no_input_tx_with_outputs_is_invalid_here() {
        let pool = UtxoPool::new();
        let mint = Transaction::coinbase(10, key(1).public_key());
        assert!(!is_valid_tx(&mint, &pool));

        let empty = Transaction::new(Vec::new(), Vec::new());
        assert!(is_valid_tx(&empty, &pool));
    }

    #[test]
    fn test_batch_first_spender_wins() {
        let (alice, bob, carol) = (key(1), key(2), key(3));
        let (pool, utxo) = funded(&alice, 100);

        let to_bob = Transaction::signed(&[utxo], vec![TxOutput::new(100, bob.public_key())], &alice);
        let to_carol = Transaction::signed(&[utxo], vec![TxOutput::new(100, carol.public_key())], &alice);
        assert!(is_valid_tx(&to_carol, &pool));

        let (accepted, after) = apply_batch(&[to_bob.clone(), to_carol], &pool);
        assert_eq!(accepted, vec![to_bob.clone()]);
        assert!(!after.contains(&utxo));
        assert_eq!(after.balance_of(&bob.public_key()), 100);
        assert!(pool.contains(&utxo));
    }

    #[test]
    fn test_batch_chained_spend_in_order_only() {
        let (alice, bob) = (key(1), key(2));
        let (pool, utxo) = funded(&alice, 100);

        let first = Transaction::signed(&[utxo], vec![TxOutput::new(90, bob.public_key())], &alice);
        let second = Transaction::signed(&[first.utxo_ref(0)], vec![TxOutput::new(90, alice.public_key())], &bob);

        let (accepted, _) = apply_batch(&[first.clone(), second.clone()], &pool);
        assert_eq!(accepted.len(), 2);

        let (accepted, _) = apply_batch(&[second, first.clone()], &pool);
        assert_eq!(accepted, vec![first]);
    }

    #[test]
    fn test_handler_keeps_state_across_calls() {
        let (alice, bob) = (key(1), key(2));
        let (pool, utxo) = funded(&alice, 100);
        let mut handler = TxHandler::new(&pool);

        let tx = Transaction::signed(&[utxo], vec![TxOutput::new(100, bob.public_key())], &alice);
        assert_eq!(handler.handle_txs(std::slice::from_ref(&tx)).len(), 1);
        assert!(!handler.is_valid_tx(&tx));
        assert!(handler.handle_txs(&[tx]).is_empty());
        assert_eq!(handler.utxo_pool().len(), 1);
    }
}
