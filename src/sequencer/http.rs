use crate::config::SequencerConfig;
use crate::error::EngineError;
use crate::sequencer::{OutputQuery, SequencerApi};
use crate::types::{
    DepositEntry, DepositEntryRequest, GhostKey, GhostKeyRequest, RegisterUserRequest,
    TransactionRecord, TransactionRequest, UnspentOutput, UserRecord, VerifiedRequest,
};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<RemoteError>,
}

#[derive(Debug, Deserialize)]
struct RemoteError {
    status: u16,
    code: i64,
    #[serde(default)]
    description: String,
}

/// Sequencer client over HTTP/JSON.
#[derive(Clone)]
pub struct HttpSequencer {
    base: Url,
    client: Client,
}

impl HttpSequencer {
    pub fn new(config: &SequencerConfig) -> Result<Self, EngineError> {
        let base = Url::parse(&config.endpoint)
            .map_err(|err| EngineError::InvalidState(format!("sequencer endpoint: {err}")))?;

        let mut headers = HeaderMap::new();
        headers.append(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if let Some(token) = config.access_token.as_ref() {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                EngineError::InvalidState("access token is not a valid header value".to_string())
            })?;
            headers.append(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { base, client })
    }

    fn url(&self, path: &str) -> Result<Url, EngineError> {
        self.base
            .join(path)
            .map_err(|err| EngineError::InvalidState(format!("bad path {path}: {err}")))
    }

    async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<R, EngineError> {
        let response = self.client.get(self.url(path)?).query(query).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        decode_envelope(status, &body)
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, EngineError> {
        let response = self.client.post(self.url(path)?).json(body).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        decode_envelope(status, &body)
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Checks the response envelope and extracts `data`.
///
/// Errors reported by the sequencer are surfaced unchanged as
/// [`EngineError::Remote`]; bodies that cannot be read are retryable only
/// when the status says the failure was transient.
pub(crate) fn decode_envelope<R: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
) -> Result<R, EngineError> {
    let envelope: Envelope<R> = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(err) if is_transient(status) => {
            return Err(EngineError::Transport(format!(
                "sequencer returned {status}: {err}"
            )))
        }
        Err(err) => {
            return Err(EngineError::MalformedResponse(format!(
                "status {status}: {err}"
            )))
        }
    };

    if let Some(error) = envelope.error {
        tracing::warn!(
            "sequencer rejected request, status: {}, code: {}, description: {}",
            error.status,
            error.code,
            error.description
        );
        return Err(EngineError::Remote {
            status: error.status,
            code: error.code,
            description: error.description,
        });
    }

    if !status.is_success() {
        if is_transient(status) {
            return Err(EngineError::Transport(format!("sequencer returned {status}")));
        }
        return Err(EngineError::Remote {
            status: status.as_u16(),
            code: status.as_u16() as i64,
            description: status.to_string(),
        });
    }

    envelope
        .data
        .ok_or_else(|| EngineError::MalformedResponse("response without data".to_string()))
}

fn is_not_found(err: &EngineError) -> bool {
    matches!(err, EngineError::Remote { status, code, .. } if *status == 404 || *code == 404)
}

#[async_trait]
impl SequencerApi for HttpSequencer {
    async fn list_outputs(&self, query: &OutputQuery) -> Result<Vec<UnspentOutput>, EngineError> {
        let mut params = vec![
            ("members", query.members_hash()),
            ("threshold", query.threshold.to_string()),
            ("offset", query.offset.to_string()),
            ("limit", query.limit.to_string()),
            ("order", "ASC".to_string()),
        ];
        if let Some(state) = query.state {
            params.push(("state", state.as_str().to_string()));
        }
        if let Some(asset) = query.asset {
            params.push(("asset", asset.to_string()));
        }
        self.get("/safe/outputs", &params).await
    }

    async fn create_deposit_entry(
        &self,
        request: &DepositEntryRequest,
    ) -> Result<Vec<DepositEntry>, EngineError> {
        self.post("/safe/deposit/entries", request).await
    }

    async fn register_user(
        &self,
        request: &RegisterUserRequest,
    ) -> Result<UserRecord, EngineError> {
        self.post("/safe/users", request).await
    }

    async fn request_ghost_keys(
        &self,
        requests: &[GhostKeyRequest],
    ) -> Result<Vec<GhostKey>, EngineError> {
        self.post("/safe/keys", requests).await
    }

    async fn verify_transactions(
        &self,
        requests: &[TransactionRequest],
    ) -> Result<Vec<VerifiedRequest>, EngineError> {
        self.post("/safe/transaction/requests", requests).await
    }

    async fn send_transactions(
        &self,
        requests: &[TransactionRequest],
    ) -> Result<Vec<TransactionRecord>, EngineError> {
        self.post("/safe/transactions", requests).await
    }

    async fn get_transaction(
        &self,
        request_id: Uuid,
    ) -> Result<Option<TransactionRecord>, EngineError> {
        match self
            .get(&format!("/safe/transactions/{request_id}"), &[])
            .await
        {
            Ok(record) => Ok(Some(record)),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
