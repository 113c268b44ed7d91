//! HTTP client for the process mining backend.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let backend = HttpMiningBackend::new(&config.backend)?;
//! let session = Session::new(Arc::new(backend), &config)?;
//! ```
//!
//! Non-success statuses are classified by [`BackendError::from_response`];
//! connection problems and timeouts become [`BackendError::Transport`].

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::Response;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use spectrum_core::BackendError;
use spectrum_core::EventLogId;
use spectrum_core::FilterPayload;
use spectrum_core::MinedData;
use spectrum_core::MiningBackend;
use spectrum_core::config::BackendConfig;

/// reqwest-backed [`MiningBackend`].
#[derive(Debug, Clone)]
pub struct HttpMiningBackend {
    client: Client,
    base_url: String,
}

impl HttpMiningBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(transport)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get(&self, path: &str) -> Result<Response, BackendError> {
        tracing::debug!(path, "GET");
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(transport)?;
        check_status(response, path).await
    }

    async fn post(&self, path: &str, payload: &FilterPayload) -> Result<Response, BackendError> {
        tracing::debug!(path, spectra = payload.spectra.len(), "POST");
        let response = self
            .client
            .post(self.url(path))
            .json(payload)
            .send()
            .await
            .map_err(transport)?;
        check_status(response, path).await
    }
}

#[async_trait]
impl MiningBackend for HttpMiningBackend {
    async fn event_log_data(&self, event_log_id: EventLogId) -> Result<Value, BackendError> {
        let response = self.get(&format!("/api/event-log/{event_log_id}/data")).await?;
        decode(response).await
    }

    async fn mined_data(
        &self,
        event_log_id: EventLogId,
        payload: &FilterPayload,
    ) -> Result<MinedData, BackendError> {
        let response = self
            .post(&format!("/api/event-log/{event_log_id}/mined-data"), payload)
            .await?;
        decode(response).await
    }

    async fn export_mined_data(
        &self,
        event_log_id: EventLogId,
        payload: &FilterPayload,
    ) -> Result<String, BackendError> {
        let response = self
            .post(
                &format!("/api/event-log/{event_log_id}/mined-data/export"),
                payload,
            )
            .await?;
        decode(response).await
    }

    async fn download(&self, token: &str) -> Result<Bytes, BackendError> {
        let path = format!("/api/download/{}", urlencoding::encode(token));
        let response = self.get(&path).await?;

        // A missing export comes back as 200 with a JSON error body.
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));
        let bytes = response.bytes().await.map_err(transport)?;
        if is_json
            && serde_json::from_slice::<Value>(&bytes)
                .ok()
                .is_some_and(|body| body.get("error").is_some())
        {
            return Err(BackendError::NotFound { resource: path });
        }
        Ok(bytes)
    }
}

async fn check_status(response: Response, path: &str) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(path, status = status.as_u16(), "backend request failed");
    Err(BackendError::from_response(status.as_u16(), path, &body))
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let bytes = response.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|err| BackendError::Decode(err.to_string()))
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}
