//! In-memory sequencer used by the unit tests.

use crate::amount::Amount;
use crate::codec::{self, hash_bytes, Input};
use crate::error::EngineError;
use crate::sequencer::{OutputQuery, SequencerApi};
use crate::types::{
    DepositEntry, DepositEntryRequest, GhostKey, GhostKeyRequest, Hash, Key, OutputState,
    RegisterUserRequest, TransactionRecord, TransactionRequest, TransactionState, UnspentOutput,
    UserRecord, VerifiedRequest,
};
use async_trait::async_trait;
use itertools::Itertools;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

pub(crate) const ASSET: Hash = Hash([7u8; 32]);
pub(crate) const OWNER: &str = "8dcf823d-9eb3-4da2-8734-f0aad50c0da6";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    ListOutputs { offset: u64, limit: usize },
    GhostKeys(usize),
    Verify(Uuid),
    Send(Uuid),
    GetTransaction(Uuid),
}

pub(crate) fn unspent(sequence: u64, amount: &str, owner: &str) -> UnspentOutput {
    let mut hash = [0u8; 32];
    hash[24..].copy_from_slice(&sequence.to_be_bytes());
    UnspentOutput {
        output_id: format!("output-{sequence}"),
        transaction_hash: Hash(hash),
        output_index: 0,
        asset: ASSET,
        amount: Amount::from_str(amount).unwrap(),
        sequence,
        receivers: vec![owner.to_string()],
        receivers_threshold: 1,
        state: OutputState::Unspent,
    }
}

pub(crate) fn view_for(input: &Input) -> Key {
    let mut bytes = input.hash.0.to_vec();
    bytes.extend_from_slice(&input.index.to_be_bytes());
    Key(hash_bytes(&bytes).0)
}

fn rejected(description: &str) -> EngineError {
    EngineError::Remote {
        status: 400,
        code: 10002,
        description: description.to_string(),
    }
}

#[derive(Default)]
pub(crate) struct MockSequencer {
    outputs: Mutex<Vec<UnspentOutput>>,
    calls: Mutex<Vec<Call>>,
    verified: Mutex<HashMap<Uuid, Vec<u8>>>,
    records: Mutex<HashMap<Uuid, TransactionRecord>>,
    pub short_views: AtomicBool,
    pub misalign_ghost_keys: AtomicBool,
    pub reject_send: AtomicBool,
}

impl MockSequencer {
    pub fn with_outputs(outputs: Vec<UnspentOutput>) -> Self {
        let mock = Self::default();
        *mock.outputs.lock().unwrap() = outputs;
        mock
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn outputs(&self) -> Vec<UnspentOutput> {
        self.outputs.lock().unwrap().clone()
    }

    pub fn add_output(&self, output: UnspentOutput) {
        self.outputs.lock().unwrap().push(output);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SequencerApi for MockSequencer {
    async fn list_outputs(&self, query: &OutputQuery) -> Result<Vec<UnspentOutput>, EngineError> {
        self.record(Call::ListOutputs {
            offset: query.offset,
            limit: query.limit,
        });
        let members: Vec<&String> = query.members.iter().sorted().collect();
        let page = self
            .outputs
            .lock()
            .unwrap()
            .iter()
            .filter(|output| output.receivers.iter().sorted().collect::<Vec<_>>() == members)
            .filter(|output| output.receivers_threshold == query.threshold)
            .filter(|output| query.asset.map_or(true, |asset| output.asset == asset))
            .filter(|output| query.state.map_or(true, |state| output.state == state))
            .filter(|output| output.sequence >= query.offset)
            .sorted_by_key(|output| output.sequence)
            .take(query.limit)
            .cloned()
            .collect();
        Ok(page)
    }

    async fn create_deposit_entry(
        &self,
        request: &DepositEntryRequest,
    ) -> Result<Vec<DepositEntry>, EngineError> {
        Ok(vec![DepositEntry {
            entry_id: Uuid::new_v4().to_string(),
            chain_id: request.chain_id.clone(),
            destination: format!("deposit-{}", request.chain_id),
            tag: None,
            members: request.members.clone(),
            threshold: request.threshold.unwrap_or(1),
        }])
    }

    async fn register_user(
        &self,
        request: &RegisterUserRequest,
    ) -> Result<UserRecord, EngineError> {
        Ok(UserRecord {
            user_id: format!("user-{}", request.public_key),
            full_name: String::new(),
            has_safe: true,
        })
    }

    async fn request_ghost_keys(
        &self,
        requests: &[GhostKeyRequest],
    ) -> Result<Vec<GhostKey>, EngineError> {
        self.record(Call::GhostKeys(requests.len()));
        let mut keys: Vec<GhostKey> = requests
            .iter()
            .map(|request| GhostKey {
                index: request.index,
                mask: Key(hash_bytes(request.hint.as_bytes()).0),
                keys: request
                    .receivers
                    .iter()
                    .map(|receiver| Key(hash_bytes(format!("{receiver}{}", request.hint).as_bytes()).0))
                    .collect(),
            })
            .collect();
        if self.misalign_ghost_keys.load(Ordering::SeqCst) {
            keys.reverse();
        }
        Ok(keys)
    }

    async fn verify_transactions(
        &self,
        requests: &[TransactionRequest],
    ) -> Result<Vec<VerifiedRequest>, EngineError> {
        let mut responses = vec![];
        for request in requests.iter() {
            self.record(Call::Verify(request.request_id));
            let decoded = codec::decode(&request.raw).map_err(|_| rejected("invalid raw"))?;
            let mut verified = self.verified.lock().unwrap();
            match verified.get(&request.request_id) {
                Some(raw) if *raw != request.raw => {
                    return Err(rejected("request id reused with a different transaction"))
                }
                _ => {
                    verified.insert(request.request_id, request.raw.clone());
                }
            }
            let mut views: Vec<Key> = decoded.transaction.inputs.iter().map(view_for).collect();
            if self.short_views.load(Ordering::SeqCst) {
                views.pop();
            }
            responses.push(VerifiedRequest {
                request_id: request.request_id,
                views,
            });
        }
        Ok(responses)
    }

    async fn send_transactions(
        &self,
        requests: &[TransactionRequest],
    ) -> Result<Vec<TransactionRecord>, EngineError> {
        let mut responses = vec![];
        for request in requests.iter() {
            self.record(Call::Send(request.request_id));
            if self.reject_send.load(Ordering::SeqCst) {
                return Err(rejected("transaction rejected"));
            }
            if let Some(record) = self.records.lock().unwrap().get(&request.request_id) {
                responses.push(record.clone());
                continue;
            }
            let signed = codec::decode(&request.raw).map_err(|_| rejected("invalid raw"))?;
            let verified_raw = self
                .verified
                .lock()
                .unwrap()
                .get(&request.request_id)
                .cloned()
                .ok_or_else(|| rejected("transaction was never verified"))?;
            let verified = codec::decode(&verified_raw).map_err(|_| rejected("invalid raw"))?;
            if verified.transaction != signed.transaction
                || signed.signatures.len() != signed.transaction.inputs.len()
            {
                return Err(rejected("signatures do not match verified transaction"));
            }

            let mut outputs = self.outputs.lock().unwrap();
            let mut spent = Vec::with_capacity(signed.transaction.inputs.len());
            for input in signed.transaction.inputs.iter() {
                let position = outputs
                    .iter()
                    .position(|o| o.transaction_hash == input.hash && o.output_index == input.index)
                    .ok_or_else(|| rejected("unknown input"))?;
                if outputs[position].state != OutputState::Unspent || spent.contains(&position) {
                    return Err(rejected("input already spent"));
                }
                spent.push(position);
            }
            for position in spent {
                outputs[position].state = OutputState::Spent;
            }

            let record = TransactionRecord {
                request_id: request.request_id,
                transaction_hash: signed
                    .transaction
                    .hash()
                    .map_err(|_| rejected("invalid raw"))?,
                asset: signed.transaction.asset,
                amount: signed
                    .transaction
                    .outputs
                    .first()
                    .map(|output| output.amount)
                    .unwrap_or_default(),
                state: TransactionState::Spent,
            };
            self.records
                .lock()
                .unwrap()
                .insert(request.request_id, record.clone());
            responses.push(record);
        }
        Ok(responses)
    }

    async fn get_transaction(
        &self,
        request_id: Uuid,
    ) -> Result<Option<TransactionRecord>, EngineError> {
        self.record(Call::GetTransaction(request_id));
        Ok(self.records.lock().unwrap().get(&request_id).cloned())
    }
}
