use crate::amount::Amount;
use crate::codec::{Input, Output, UnsignedTransaction, TX_VERSION};
use crate::error::EngineError;
use crate::types::{validate_receivers, GhostKey, GhostKeyRequest, Hash, Recipient, UnspentOutput};
use uuid::Uuid;

/// Payment recipient first, then change back to the sender when there is
/// any.
pub fn build_recipients(
    destination: Vec<String>,
    threshold: u8,
    amount: Amount,
    change: Amount,
    self_receivers: &[String],
    self_threshold: u8,
) -> Vec<Recipient> {
    let mut recipients = vec![Recipient {
        members: destination,
        threshold,
        amount,
    }];
    if change.is_positive() {
        recipients.push(Recipient {
            members: self_receivers.to_vec(),
            threshold: self_threshold,
            amount: change,
        });
    }
    recipients
}

pub fn ghost_key_requests(recipients: &[Recipient]) -> Vec<GhostKeyRequest> {
    recipients
        .iter()
        .enumerate()
        .map(|(index, recipient)| GhostKeyRequest {
            receivers: recipient.members.clone(),
            index: index as u32,
            hint: Uuid::new_v4().to_string(),
        })
        .collect()
}

/// Checks that `keys[i]` answers `requests[i]`. A response in any other
/// order is rejected, never rearranged.
pub fn validate_ghost_keys(
    requests: &[GhostKeyRequest],
    keys: &[GhostKey],
) -> Result<(), EngineError> {
    if requests.len() != keys.len() {
        return Err(EngineError::Consistency(format!(
            "requested {} ghost keys, received {}",
            requests.len(),
            keys.len()
        )));
    }
    for (position, (request, key)) in requests.iter().zip(keys.iter()).enumerate() {
        if request.index as usize != position || key.index != request.index {
            return Err(EngineError::Consistency(format!(
                "ghost key at position {} has index {}, expected {}",
                position, key.index, request.index
            )));
        }
        if key.keys.len() != request.receivers.len() {
            return Err(EngineError::Consistency(format!(
                "ghost key {} carries {} keys for {} receivers",
                key.index,
                key.keys.len(),
                request.receivers.len()
            )));
        }
    }
    Ok(())
}

/// Composes the unsigned transaction. No network, no randomness: the same
/// arguments always give the same transaction.
pub fn build_transaction(
    asset: Hash,
    inputs: &[UnspentOutput],
    recipients: &[Recipient],
    ghost_keys: &[GhostKey],
    extra: &[u8],
    max_extra_size: usize,
) -> Result<UnsignedTransaction, EngineError> {
    if inputs.is_empty() {
        return Err(EngineError::InvalidState(
            "transaction without inputs".to_string(),
        ));
    }
    if extra.len() > max_extra_size {
        return Err(EngineError::InvalidState(format!(
            "extra is {} bytes, limit is {}",
            extra.len(),
            max_extra_size
        )));
    }
    if recipients.len() != ghost_keys.len() {
        return Err(EngineError::Consistency(format!(
            "{} recipients but {} ghost keys",
            recipients.len(),
            ghost_keys.len()
        )));
    }
    if let Some(foreign) = inputs.iter().find(|input| input.asset != asset) {
        return Err(EngineError::InvalidState(format!(
            "input {} belongs to asset {}",
            foreign.output_id, foreign.asset
        )));
    }

    let mut outputs = Vec::with_capacity(recipients.len());
    for (recipient, ghost) in recipients.iter().zip(ghost_keys.iter()) {
        validate_receivers(&recipient.members, recipient.threshold)
            .map_err(EngineError::InvalidState)?;
        if ghost.keys.len() != recipient.members.len() {
            return Err(EngineError::Consistency(format!(
                "ghost key {} does not match its recipient",
                ghost.index
            )));
        }
        outputs.push(Output {
            amount: recipient.amount,
            keys: ghost.keys.clone(),
            mask: ghost.mask,
            threshold: recipient.threshold,
        });
    }

    Ok(UnsignedTransaction {
        version: TX_VERSION,
        asset,
        inputs: inputs
            .iter()
            .map(|input| Input {
                hash: input.transaction_hash,
                index: input.output_index,
            })
            .collect(),
        outputs,
        extra: extra.to_vec(),
    })
}
