use crate::amount::Amount;
use crate::balance::{balances_by_asset, compute_balance};
use crate::builder::{build_recipients, build_transaction, ghost_key_requests, validate_ghost_keys};
use crate::config::EngineLimits;
use crate::error::EngineError;
use crate::outputs::fetch_outputs;
use crate::protocol::{Built, Sent, Spend};
use crate::selection::{select_outputs, SelectionResult};
use crate::sequencer::{OutputQuery, SequencerApi};
use crate::signer::TransactionSigner;
use crate::types::{
    validate_receivers, DepositEntry, DepositEntryRequest, Hash, OutputState,
    Recipient, RegisterUserRequest, TransactionRecord, UnspentOutput, UserRecord,
};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    pub asset: Hash,
    pub receivers: Vec<String>,
    pub threshold: u8,
    pub amount: Amount,
    pub extra: Vec<u8>,
    /// Reuse a request id only to resume the very same transfer.
    pub request_id: Option<Uuid>,
}

/// Spends the outputs of a single user through a sequencer.
pub struct TransferEngine<A, S> {
    api: A,
    signer: S,
    user_id: String,
    limits: EngineLimits,
}

impl<A: SequencerApi, S: TransactionSigner> TransferEngine<A, S> {
    pub fn new(api: A, signer: S, user_id: String, limits: EngineLimits) -> Self {
        Self {
            api,
            signer,
            user_id,
            limits,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn own_members(&self) -> Result<Vec<String>, EngineError> {
        if self.user_id.is_empty() {
            return Err(EngineError::InvalidState(
                "acting user id is empty".to_string(),
            ));
        }
        Ok(vec![self.user_id.clone()])
    }

    pub async fn balance(&self, asset: Hash) -> Result<Amount, EngineError> {
        compute_balance(
            &self.api,
            asset,
            self.own_members()?,
            1,
            self.limits.balance_page_size,
        )
        .await
    }

    pub async fn balances(&self) -> Result<BTreeMap<Hash, Amount>, EngineError> {
        balances_by_asset(&self.api, self.own_members()?, 1, self.limits.balance_page_size).await
    }

    pub async fn select(&self, asset: Hash, amount: Amount) -> Result<SelectionResult, EngineError> {
        select_outputs(&self.api, &self.user_id, asset, 1, amount, &self.limits).await
    }

    /// Selects inputs, fetches ghost keys and builds the unsigned
    /// transaction. Nothing has been submitted when this returns.
    pub async fn prepare_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<Spend<Built>, EngineError> {
        validate_receivers(&request.receivers, request.threshold)
            .map_err(EngineError::InvalidState)?;
        if request.extra.len() > self.limits.max_extra_size {
            return Err(EngineError::InvalidState(format!(
                "extra is {} bytes, limit is {}",
                request.extra.len(),
                self.limits.max_extra_size
            )));
        }

        let selection = self.select(request.asset, request.amount).await?;
        let first = selection.outputs.first().ok_or_else(|| {
            EngineError::Consistency("selection succeeded without outputs".to_string())
        })?;
        let recipients = build_recipients(
            request.receivers.clone(),
            request.threshold,
            request.amount,
            selection.change,
            &first.receivers,
            first.receivers_threshold,
        );
        self.assemble(
            request.asset,
            selection.outputs,
            &recipients,
            &request.extra,
            request.request_id,
        )
        .await
    }

    async fn assemble(
        &self,
        asset: Hash,
        inputs: Vec<UnspentOutput>,
        recipients: &[Recipient],
        extra: &[u8],
        request_id: Option<Uuid>,
    ) -> Result<Spend<Built>, EngineError> {
        let requests = ghost_key_requests(recipients);
        let ghost_keys = self.api.request_ghost_keys(&requests).await?;
        validate_ghost_keys(&requests, &ghost_keys)?;

        let transaction = build_transaction(
            asset,
            &inputs,
            recipients,
            &ghost_keys,
            extra,
            self.limits.max_extra_size,
        )?;
        let spend = match request_id {
            Some(id) => Spend::with_request_id(id, inputs, transaction),
            None => Spend::new(inputs, transaction),
        };
        tracing::debug!(
            "built request {} with {} inputs and {} outputs",
            spend.request_id(),
            spend.transaction().inputs.len(),
            spend.transaction().outputs.len()
        );
        Ok(spend)
    }

    /// Runs the whole transfer. Verify, sign and send happen strictly in
    /// that order under one request id.
    pub async fn transfer(&self, request: &TransferRequest) -> Result<Spend<Sent>, EngineError> {
        let built = self.prepare_transfer(request).await?;
        self.submit(built).await
    }

    pub async fn submit(&self, built: Spend<Built>) -> Result<Spend<Sent>, EngineError> {
        let verified = built.verify(&self.api).await?;
        let signed = verified.sign(&self.signer)?;
        signed.send(&self.api).await
    }

    /// Merges the oldest unspent outputs of `asset` into a single output
    /// back to the user, so that later spends fit under the input ceiling.
    /// `None` when there is nothing to merge.
    pub async fn consolidate(&self, asset: Hash) -> Result<Option<Spend<Sent>>, EngineError> {
        let members = self.own_members()?;
        let limit = self.limits.max_inputs.saturating_sub(1);
        if limit < 2 {
            return Ok(None);
        }
        let query = OutputQuery::new(members.clone(), 1, limit)
            .with_asset(asset)
            .with_state(OutputState::Unspent);
        let inputs = fetch_outputs(&self.api, &query).await?;
        if inputs.len() < 2 {
            return Ok(None);
        }

        let total = Amount::checked_sum(inputs.iter().map(|output| &output.amount)).ok_or_else(
            || EngineError::MalformedResponse(format!("outputs of asset {asset} overflow")),
        )?;
        let recipients = build_recipients(members, 1, total, Amount::zero(), &[], 1);
        tracing::info!(
            "consolidating {} outputs of asset {}, total: {}",
            inputs.len(),
            asset,
            total
        );
        let built = self.assemble(asset, inputs, &recipients, &[], None).await?;
        self.submit(built).await.map(Some)
    }

    pub async fn create_deposit_entry(
        &self,
        chain_id: String,
    ) -> Result<Vec<DepositEntry>, EngineError> {
        let request = DepositEntryRequest {
            chain_id,
            members: self.own_members()?,
            threshold: Some(1),
        };
        self.api.create_deposit_entry(&request).await
    }

    pub async fn register_user(
        &self,
        request: &RegisterUserRequest,
    ) -> Result<UserRecord, EngineError> {
        self.api.register_user(request).await
    }

    pub async fn get_transaction(
        &self,
        request_id: Uuid,
    ) -> Result<Option<TransactionRecord>, EngineError> {
        self.api.get_transaction(request_id).await
    }
}
