use crate::error::EngineError;
use crate::types::{
    DepositEntry, DepositEntryRequest, GhostKey, GhostKeyRequest, Hash, OutputState,
    RegisterUserRequest, TransactionRecord, TransactionRequest, UnspentOutput, UserRecord,
    VerifiedRequest,
};
use async_trait::async_trait;
use itertools::Itertools;
use sha3::{Digest, Sha3_256};
use uuid::Uuid;

pub mod http;

/// Filter for one page of outputs.
///
/// `offset` is a sequence number, not a position: the page holds outputs
/// with `sequence >= offset`, ascending.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputQuery {
    pub members: Vec<String>,
    pub threshold: u8,
    pub asset: Option<Hash>,
    pub state: Option<OutputState>,
    pub offset: u64,
    pub limit: usize,
}

impl OutputQuery {
    pub fn new(members: Vec<String>, threshold: u8, limit: usize) -> Self {
        Self {
            members,
            threshold,
            asset: None,
            state: None,
            offset: 0,
            limit,
        }
    }

    pub fn with_asset(mut self, asset: Hash) -> Self {
        self.asset = Some(asset);
        self
    }

    pub fn with_state(mut self, state: OutputState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn members_hash(&self) -> String {
        hash_members(&self.members)
    }
}

/// Order-independent identifier of a receiver set: SHA3-256 over the
/// sorted member ids, hex encoded.
pub fn hash_members(members: &[String]) -> String {
    let joined: String = members.iter().sorted().join("");
    hex::encode(Sha3_256::digest(joined.as_bytes()))
}

/// The remote sequencing service, as far as the engine depends on it.
#[async_trait]
pub trait SequencerApi: Send + Sync {
    async fn list_outputs(&self, query: &OutputQuery) -> Result<Vec<UnspentOutput>, EngineError>;

    async fn create_deposit_entry(
        &self,
        request: &DepositEntryRequest,
    ) -> Result<Vec<DepositEntry>, EngineError>;

    async fn register_user(&self, request: &RegisterUserRequest)
        -> Result<UserRecord, EngineError>;

    async fn request_ghost_keys(
        &self,
        requests: &[GhostKeyRequest],
    ) -> Result<Vec<GhostKey>, EngineError>;

    async fn verify_transactions(
        &self,
        requests: &[TransactionRequest],
    ) -> Result<Vec<VerifiedRequest>, EngineError>;

    async fn send_transactions(
        &self,
        requests: &[TransactionRequest],
    ) -> Result<Vec<TransactionRecord>, EngineError>;

    /// `Ok(None)` when the sequencer has never seen `request_id`.
    async fn get_transaction(
        &self,
        request_id: Uuid,
    ) -> Result<Option<TransactionRecord>, EngineError>;
}
