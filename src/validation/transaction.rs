//! Transaction structure
//!
//! UTXO-based transactions whose inputs are authorised by Schnorr signatures
//! over a per-input signing payload.

use serde::{Deserialize, Serialize};

use crate::crypto::{ContentHasher, Hash, PrivateKey, PublicKey, SchnorrSignature};
use crate::storage::{Amount, TxOutput, UtxoRef};

/// A transaction input claiming a previous output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Hash of the transaction containing the output
    pub prev_tx_hash: Hash,
    /// Index of the output in that transaction
    pub output_index: u32,
    /// Owner's signature over `Transaction::signing_payload` for this input
    pub signature: Option<SchnorrSignature>,
}

impl TxInput {
    pub fn new(prev_tx_hash: Hash, output_index: u32) -> Self {
        Self {
            prev_tx_hash,
            output_index,
            signature: None,
        }
    }

    /// The output reference this input claims
    pub fn utxo_ref(&self) -> UtxoRef {
        UtxoRef::new(self.prev_tx_hash, self.output_index)
    }
}

/// A complete transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    /// Parent block a coinbase is minted on top of. Set by `Block::new`, so
    /// no two coinbases along one fork share a hash.
    #[serde(default)]
    pub anchor: Option<Hash>,
}

impl Transaction {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            inputs,
            outputs,
            anchor: None,
        }
    }

    /// Create a coinbase transaction minting `value` to `owner`
    pub fn coinbase(value: Amount, owner: PublicKey) -> Self {
        Self::new(Vec::new(), vec![TxOutput::new(value, owner)])
    }

    /// Build a transaction spending `claims` (all owned by `key`) into
    /// `outputs`, with every input signed.
    pub fn signed(claims: &[UtxoRef], outputs: Vec<TxOutput>, key: &PrivateKey) -> Self {
        let inputs = claims
            .iter()
            .map(|utxo| TxInput::new(utxo.tx_hash, utxo.index))
            .collect();
        let mut tx = Self::new(inputs, outputs);
        for index in 0..tx.inputs.len() {
            tx.sign_input(index, key);
        }
        tx
    }

    /// A coinbase has no inputs
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn add_input(&mut self, prev_tx_hash: Hash, output_index: u32) {
        self.inputs.push(TxInput::new(prev_tx_hash, output_index));
    }

    pub fn add_output(&mut self, value: Amount, owner: PublicKey) {
        self.outputs.push(TxOutput::new(value, owner));
    }

    /// Reference to this transaction's output at `index`
    pub fn utxo_ref(&self, index: u32) -> UtxoRef {
        UtxoRef::new(self.hash(), index)
    }

    /// Content hash over every input (including signatures), every output
    /// and the coinbase anchor
    pub fn hash(&self) -> Hash {
        let mut hasher = ContentHasher::new().domain(b"tx");
        hasher.update_len(self.inputs.len());
        for input in &self.inputs {
            hasher
                .update_hash(&input.prev_tx_hash)
                .update_u32(input.output_index);
            match &input.signature {
                Some(sig) => hasher.update_bytes(&[1]).update_bytes(&sig.0),
                None => hasher.update_bytes(&[0]),
            };
        }
        hash_outputs(&mut hasher, &self.outputs);
        match &self.anchor {
            Some(parent) => hasher.update_bytes(&[1]).update_hash(parent),
            None => hasher.update_bytes(&[0]),
        };
        hasher.finalize()
    }

    /// Payload the owner of input `index`'s claimed output must sign: that
    /// input's output reference followed by every output. `None` when the
    /// index is out of range.
    pub fn signing_payload(&self, index: usize) -> Option<Hash> {
        let input = self.inputs.get(index)?;
        let mut hasher = ContentHasher::new().domain(b"tx-sign");
        hasher
            .update_hash(&input.prev_tx_hash)
            .update_u32(input.output_index);
        hash_outputs(&mut hasher, &self.outputs);
        Some(hasher.finalize())
    }

    /// Sign input `index`. Returns false when there is no such input.
    pub fn sign_input(&mut self, index: usize, key: &PrivateKey) -> bool {
        let Some(payload) = self.signing_payload(index) else {
            return false;
        };
        self.inputs[index].signature = Some(key.sign(&payload));
        true
    }

    pub fn total_output_value(&self) -> i128 {
        self.outputs.iter().map(|o| o.value as i128).sum()
    }
}

fn hash_outputs(hasher: &mut ContentHasher, outputs: &[TxOutput]) {
    hasher.update_len(outputs.len());
    for output in outputs {
        hasher.update_i64(output.value).update_bytes(&output.owner.0);
    }
}
