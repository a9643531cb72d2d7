use crate::codec::{hash_bytes, SignedTransaction, UnsignedTransaction};
use crate::error::EngineError;
use crate::types::{Hash, Key, UnspentOutput};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};

/// The signing primitive. Implementations combine the verified transaction,
/// the outputs it spends and the per-input view signatures into a signed
/// transaction. Purely local.
pub trait TransactionSigner: Send + Sync {
    fn sign(
        &self,
        transaction: &UnsignedTransaction,
        inputs: &[UnspentOutput],
        views: &[Key],
    ) -> Result<SignedTransaction, EngineError>;
}

pub struct SpendKeySigner {
    key: SigningKey,
}

impl SpendKeySigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    pub fn from_seed_hex(seed: &str) -> Result<Self, EngineError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(seed.trim(), &mut bytes)
            .map_err(|err| EngineError::InvalidState(format!("spend key: {err}")))?;
        Ok(Self::new(SigningKey::from_bytes(&bytes)))
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

/// Message signed for input `index`: binds the transaction, that input's
/// view signature and its position.
pub fn input_message(transaction_hash: &Hash, view: &Key, index: usize) -> Hash {
    let mut message = Vec::with_capacity(72);
    message.extend_from_slice(transaction_hash.as_bytes());
    message.extend_from_slice(view.as_bytes());
    message.extend_from_slice(&(index as u64).to_be_bytes());
    hash_bytes(&message)
}

impl TransactionSigner for SpendKeySigner {
    fn sign(
        &self,
        transaction: &UnsignedTransaction,
        inputs: &[UnspentOutput],
        views: &[Key],
    ) -> Result<SignedTransaction, EngineError> {
        if inputs.len() != transaction.inputs.len() || views.len() != transaction.inputs.len() {
            return Err(EngineError::Signing(format!(
                "transaction has {} inputs, got {} outputs and {} views",
                transaction.inputs.len(),
                inputs.len(),
                views.len()
            )));
        }
        for (position, (input, output)) in transaction.inputs.iter().zip(inputs.iter()).enumerate()
        {
            if input.hash != output.transaction_hash || input.index != output.output_index {
                return Err(EngineError::Signing(format!(
                    "input {} does not spend output {}",
                    position, output.output_id
                )));
            }
        }

        let hash = transaction.hash()?;
        let signatures = views
            .iter()
            .enumerate()
            .map(|(index, view)| {
                self.key
                    .sign(input_message(&hash, view, index).as_bytes())
                    .to_bytes()
            })
            .collect();

        Ok(SignedTransaction {
            transaction: transaction.clone(),
            signatures,
        })
    }
}
