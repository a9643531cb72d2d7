//! Deterministic binary encoding of transactions.
//!
//! Layout (all integers big endian):
//!
//! ```text
//! magic 0x77 0x77 | version u8 | asset [32]
//! u16 inputs  | (hash [32], index u32)*
//! u16 outputs | (amount u128, u16 keys, key [32]*, mask [32], threshold u8)*
//! u32 extra   | extra bytes
//! u16 sigs    | signature [64]*
//! ```
//!
//! The transaction hash covers everything before the signature section.

use crate::amount::Amount;
use crate::error::EngineError;
use crate::types::{Hash, Key};
use sha3::{Digest, Sha3_256};

pub const MAGIC: [u8; 2] = [0x77, 0x77];
pub const TX_VERSION: u8 = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Input {
    pub hash: Hash,
    pub index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    pub amount: Amount,
    pub keys: Vec<Key>,
    pub mask: Key,
    pub threshold: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub version: u8,
    pub asset: Hash,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub extra: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: UnsignedTransaction,
    pub signatures: Vec<[u8; 64]>,
}

impl UnsignedTransaction {
    pub fn encode(&self) -> Result<Vec<u8>, EngineError> {
        let mut out = encode_body(self)?;
        out.extend_from_slice(&0u16.to_be_bytes());
        Ok(out)
    }

    pub fn hash(&self) -> Result<Hash, EngineError> {
        Ok(hash_bytes(&encode_body(self)?))
    }
}

impl SignedTransaction {
    pub fn encode(&self) -> Result<Vec<u8>, EngineError> {
        let mut out = encode_body(&self.transaction)?;
        out.extend_from_slice(&len_u16(self.signatures.len(), "signatures")?.to_be_bytes());
        for signature in self.signatures.iter() {
            out.extend_from_slice(signature);
        }
        Ok(out)
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash {
    Hash(Sha3_256::digest(bytes).into())
}

fn len_u16(len: usize, what: &str) -> Result<u16, EngineError> {
    u16::try_from(len).map_err(|_| EngineError::Codec(format!("too many {what}: {len}")))
}

fn encode_body(tx: &UnsignedTransaction) -> Result<Vec<u8>, EngineError> {
    let mut out = Vec::with_capacity(128 + tx.inputs.len() * 36 + tx.extra.len());
    out.extend_from_slice(&MAGIC);
    out.push(tx.version);
    out.extend_from_slice(tx.asset.as_bytes());

    out.extend_from_slice(&len_u16(tx.inputs.len(), "inputs")?.to_be_bytes());
    for input in tx.inputs.iter() {
        out.extend_from_slice(input.hash.as_bytes());
        out.extend_from_slice(&input.index.to_be_bytes());
    }

    out.extend_from_slice(&len_u16(tx.outputs.len(), "outputs")?.to_be_bytes());
    for output in tx.outputs.iter() {
        out.extend_from_slice(&output.amount.to_units()?.to_be_bytes());
        out.extend_from_slice(&len_u16(output.keys.len(), "keys")?.to_be_bytes());
        for key in output.keys.iter() {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(output.mask.as_bytes());
        out.push(output.threshold);
    }

    let extra_len = u32::try_from(tx.extra.len())
        .map_err(|_| EngineError::Codec(format!("extra too large: {}", tx.extra.len())))?;
    out.extend_from_slice(&extra_len.to_be_bytes());
    out.extend_from_slice(&tx.extra);
    Ok(out)
}

struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], EngineError> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                EngineError::Codec(format!("truncated transaction at byte {}", self.position))
            })?;
        let slice = &self.bytes[self.position..end];
        self.position = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], EngineError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, EngineError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, EngineError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, EngineError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn u128(&mut self) -> Result<u128, EngineError> {
        Ok(u128::from_be_bytes(self.array()?))
    }
}

/// Inverse of [`SignedTransaction::encode`]; unsigned transactions decode
/// with an empty signature list.
pub fn decode(raw: &[u8]) -> Result<SignedTransaction, EngineError> {
    let mut reader = Reader {
        bytes: raw,
        position: 0,
    };
    if reader.array::<2>()? != MAGIC {
        return Err(EngineError::Codec("invalid magic".to_string()));
    }
    let version = reader.u8()?;
    let asset = Hash(reader.array()?);

    let input_count = reader.u16()?;
    let mut inputs = Vec::with_capacity(input_count as usize);
    for _ in 0..input_count {
        let hash = Hash(reader.array()?);
        let index = reader.u32()?;
        inputs.push(Input { hash, index });
    }

    let output_count = reader.u16()?;
    let mut outputs = Vec::with_capacity(output_count as usize);
    for _ in 0..output_count {
        let amount = Amount::from_units(reader.u128()?)?;
        let key_count = reader.u16()?;
        let mut keys = Vec::with_capacity(key_count as usize);
        for _ in 0..key_count {
            keys.push(Key(reader.array()?));
        }
        let mask = Key(reader.array()?);
        let threshold = reader.u8()?;
        outputs.push(Output {
            amount,
            keys,
            mask,
            threshold,
        });
    }

    let extra_len = reader.u32()? as usize;
    let extra = reader.take(extra_len)?.to_vec();

    let signature_count = reader.u16()?;
    let mut signatures = Vec::with_capacity(signature_count as usize);
    for _ in 0..signature_count {
        signatures.push(reader.array::<64>()?);
    }

    if reader.position != raw.len() {
        return Err(EngineError::Codec(format!(
            "{} trailing bytes",
            raw.len() - reader.position
        )));
    }

    Ok(SignedTransaction {
        transaction: UnsignedTransaction {
            version,
            asset,
            inputs,
            outputs,
            extra,
        },
        signatures,
    })
}
