use crate::amount::Amount;
use crate::error::EngineError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! fixed_bytes {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = EngineError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(s, &mut bytes).map_err(|err| {
                    EngineError::Codec(format!(
                        "{} {:?}: {}",
                        stringify!($name),
                        s,
                        err
                    ))
                })?;
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(self.0))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                $name::from_str(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(Hash);
fixed_bytes!(Key);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputState {
    Unspent,
    Signed,
    Spent,
}

impl OutputState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputState::Unspent => "unspent",
            OutputState::Signed => "signed",
            OutputState::Spent => "spent",
        }
    }
}

/// A single spendable output as reported by the sequencer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub output_id: String,
    pub transaction_hash: Hash,
    pub output_index: u32,
    #[serde(rename = "kernel_asset_id")]
    pub asset: Hash,
    pub amount: Amount,
    pub sequence: u64,
    pub receivers: Vec<String>,
    pub receivers_threshold: u8,
    pub state: OutputState,
}

impl UnspentOutput {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.output_id.is_empty() {
            return Err(EngineError::MalformedResponse(
                "output without identifier".to_string(),
            ));
        }
        validate_receivers(&self.receivers, self.receivers_threshold).map_err(|reason| {
            EngineError::MalformedResponse(format!("output {}: {}", self.output_id, reason))
        })
    }
}

pub(crate) fn validate_receivers(receivers: &[String], threshold: u8) -> Result<(), String> {
    if receivers.is_empty() || receivers.iter().any(|r| r.is_empty()) {
        return Err("empty receiver set".to_string());
    }
    if threshold == 0 || threshold as usize > receivers.len() {
        return Err(format!(
            "threshold {} out of range for {} receivers",
            threshold,
            receivers.len()
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub members: Vec<String>,
    pub threshold: u8,
    pub amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostKeyRequest {
    pub receivers: Vec<String>,
    pub index: u32,
    pub hint: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostKey {
    pub index: u32,
    pub mask: Key,
    pub keys: Vec<Key>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub request_id: Uuid,
    #[serde(with = "hex")]
    pub raw: Vec<u8>,
}

/// Verification response: one view-key signature per input, in input order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedRequest {
    pub request_id: Uuid,
    pub views: Vec<Key>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Pending,
    Signed,
    Spent,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub request_id: Uuid,
    pub transaction_hash: Hash,
    #[serde(rename = "kernel_asset_id")]
    pub asset: Hash,
    pub amount: Amount,
    pub state: TransactionState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEntryRequest {
    pub chain_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEntry {
    pub entry_id: String,
    pub chain_id: String,
    pub destination: String,
    #[serde(default)]
    pub tag: Option<String>,
    pub members: Vec<String>,
    pub threshold: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterUserRequest {
    pub public_key: String,
    pub signature: String,
    pub pin_base64: String,
    pub salt_base64: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub has_safe: bool,
}
