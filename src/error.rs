use crate::amount::Amount;
use thiserror::Error;

/// Every failure the engine reports to its caller.
///
/// Variants are grouped the way callers need to react to them: local input
/// validation, funds problems, remote rejections, retryable transport
/// failures and consistency violations that must never be papered over.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("malformed amount {0:?}")]
    MalformedAmount(String),
    #[error("not enough outputs: available {available}, required {required}")]
    NotEnoughOutputs { available: Amount, required: Amount },
    #[error("selection needs {count} outputs, ceiling is {ceiling}; consolidate outputs first")]
    MaxCountNotEnoughUtxo { count: usize, ceiling: usize },
    #[error("sequencer rejected request: status {status}, code {code}: {description}")]
    Remote {
        status: u16,
        code: i64,
        description: String,
    },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("consistency violation: {0}")]
    Consistency(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("signing failed: {0}")]
    Signing(String),
}

impl EngineError {
    /// Whether repeating the same call (same request id, same bytes) is a
    /// sensible reaction.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Transport(_) => true,
            EngineError::Remote { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EngineError::MalformedResponse(err.to_string())
        } else {
            EngineError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::EngineError;

    #[test]
    fn only_transport_and_server_side_errors_are_retryable() {
        assert!(EngineError::Transport("timeout".into()).is_retryable());
        assert!(EngineError::Remote {
            status: 503,
            code: 503,
            description: "unavailable".into()
        }
        .is_retryable());
        assert!(EngineError::Remote {
            status: 429,
            code: 429,
            description: "slow down".into()
        }
        .is_retryable());
        assert!(!EngineError::Remote {
            status: 400,
            code: 10002,
            description: "invalid transaction".into()
        }
        .is_retryable());
        assert!(!EngineError::MaxCountNotEnoughUtxo {
            count: 256,
            ceiling: 256
        }
        .is_retryable());
        assert!(!EngineError::Consistency("duplicate".into()).is_retryable());
    }
}
