//! Verify, sign and send, as a typestate.
//!
//! A [`Spend`] starts out [`Built`] and can only move forward:
//! `Built -> Verified -> Signed -> Sent`. One request id is minted when the
//! spend is created and is reused for both the verify and the send call;
//! the sequencer uses it to deduplicate retried submissions. Transitions
//! borrow the current state, so a transport failure can be retried with the
//! same request id and the same bytes.

use crate::codec::UnsignedTransaction;
use crate::error::EngineError;
use crate::sequencer::SequencerApi;
use crate::signer::TransactionSigner;
use crate::types::{Key, TransactionRecord, TransactionRequest, UnspentOutput};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct Built;

#[derive(Clone, Debug)]
pub struct Verified {
    views: Vec<Key>,
}

#[derive(Clone, Debug)]
pub struct Signed {
    raw: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct Sent {
    records: Vec<TransactionRecord>,
}

#[derive(Clone, Debug)]
pub struct Spend<S> {
    request_id: Uuid,
    inputs: Vec<UnspentOutput>,
    transaction: UnsignedTransaction,
    state: S,
}

impl<S> Spend<S> {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn inputs(&self) -> &[UnspentOutput] {
        &self.inputs
    }

    pub fn transaction(&self) -> &UnsignedTransaction {
        &self.transaction
    }

    fn advance<T>(&self, state: T) -> Spend<T> {
        Spend {
            request_id: self.request_id,
            inputs: self.inputs.clone(),
            transaction: self.transaction.clone(),
            state,
        }
    }
}

impl Spend<Built> {
    pub fn new(inputs: Vec<UnspentOutput>, transaction: UnsignedTransaction) -> Self {
        Self::with_request_id(Uuid::new_v4(), inputs, transaction)
    }

    pub fn with_request_id(
        request_id: Uuid,
        inputs: Vec<UnspentOutput>,
        transaction: UnsignedTransaction,
    ) -> Self {
        Self {
            request_id,
            inputs,
            transaction,
            state: Built,
        }
    }

    /// Submits the unsigned transaction and collects one view signature per
    /// input. A response for another request, or with a different number of
    /// views, is fatal.
    pub async fn verify<A: SequencerApi + ?Sized>(
        &self,
        api: &A,
    ) -> Result<Spend<Verified>, EngineError> {
        let request = TransactionRequest {
            request_id: self.request_id,
            raw: self.transaction.encode()?,
        };
        let responses = api.verify_transactions(&[request]).await?;
        let response = match responses.as_slice() {
            [response] if response.request_id == self.request_id => response,
            _ => {
                return Err(EngineError::Consistency(format!(
                    "verification of {} answered with {} unexpected responses",
                    self.request_id,
                    responses.len()
                )))
            }
        };
        if response.views.len() != self.transaction.inputs.len() {
            return Err(EngineError::Consistency(format!(
                "verification of {} returned {} views for {} inputs",
                self.request_id,
                response.views.len(),
                self.transaction.inputs.len()
            )));
        }
        tracing::debug!("request {} verified", self.request_id);
        Ok(self.advance(Verified {
            views: response.views.clone(),
        }))
    }
}

impl Spend<Verified> {
    pub fn views(&self) -> &[Key] {
        &self.state.views
    }

    pub fn sign<S: TransactionSigner + ?Sized>(
        &self,
        signer: &S,
    ) -> Result<Spend<Signed>, EngineError> {
        let signed = signer.sign(&self.transaction, &self.inputs, &self.state.views)?;
        if signed.transaction != self.transaction {
            return Err(EngineError::Signing(
                "signer altered the verified transaction".to_string(),
            ));
        }
        let raw = signed.encode()?;
        tracing::debug!("request {} signed", self.request_id);
        Ok(self.advance(Signed { raw }))
    }
}

impl Spend<Signed> {
    pub fn raw(&self) -> &[u8] {
        &self.state.raw
    }

    /// Broadcasts the signed bytes under the request id used for
    /// verification. Sending the same spend again is answered with the
    /// record of the first acceptance.
    pub async fn send<A: SequencerApi + ?Sized>(&self, api: &A) -> Result<Spend<Sent>, EngineError> {
        let request = TransactionRequest {
            request_id: self.request_id,
            raw: self.state.raw.clone(),
        };
        let records = api.send_transactions(&[request]).await?;
        if records.is_empty() || records.iter().any(|r| r.request_id != self.request_id) {
            return Err(EngineError::Consistency(format!(
                "broadcast of {} answered with unexpected records",
                self.request_id
            )));
        }
        tracing::info!(
            "request {} sent, transaction: {}",
            self.request_id,
            records[0].transaction_hash
        );
        Ok(self.advance(Sent { records }))
    }

    /// Whether the sequencer already accepted this request id, for deciding
    /// if a failed send may be repeated.
    pub async fn lookup<A: SequencerApi + ?Sized>(
        &self,
        api: &A,
    ) -> Result<Option<TransactionRecord>, EngineError> {
        api.get_transaction(self.request_id).await
    }
}

impl Spend<Sent> {
    pub fn records(&self) -> &[TransactionRecord] {
        &self.state.records
    }

    pub fn into_records(self) -> Vec<TransactionRecord> {
        self.state.records
    }
}
