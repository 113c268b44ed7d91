//! Seam between the engine and the mining backend.
//!
//! ## Architecture
//!
//! - `MiningBackend` trait defined here
//! - HTTP implementation in `spectrum-backend-client`
//! - In-memory fakes in tests
//!
//! The engine never interprets transport details; it only needs to know
//! whether a call failed. [`BackendError::from_response`] holds the status
//! classification so every implementation agrees on it.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use crate::event_log::EventLogId;
use crate::mined::MinedData;
use crate::notice::GENERIC_ERROR_TEXT;
use crate::payload::FilterPayload;

/// `detail.err` value the backend sends for logs lacking column metadata.
pub const NOT_CONFIGURED_ERROR: &str = "invalid_metadata";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    #[error("event log is not sufficiently configured (id: {event_log_id:?})")]
    NotConfigured { event_log_id: Option<Value> },

    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    #[error("backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Classify a non-success response.
    pub fn from_response(status: u16, resource: &str, body: &str) -> Self {
        match status {
            400 => {
                let detail = serde_json::from_str::<Value>(body)
                    .ok()
                    .and_then(|value| value.get("detail").cloned());
                let not_configured = detail
                    .as_ref()
                    .and_then(|detail| detail.get("err"))
                    .and_then(Value::as_str)
                    == Some(NOT_CONFIGURED_ERROR);
                if not_configured {
                    Self::NotConfigured {
                        event_log_id: detail.and_then(|detail| detail.get("id").cloned()),
                    }
                } else {
                    Self::Http {
                        status,
                        body: body.to_string(),
                    }
                }
            }
            404 => Self::NotFound {
                resource: resource.to_string(),
            },
            _ => Self::Http {
                status,
                body: body.to_string(),
            },
        }
    }

    /// Text for the user-facing error notice.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotConfigured { .. } => "Eventlog is not sufficiently configured",
            Self::NotFound { .. } => "The requested resource was not found",
            Self::Http { .. } | Self::Transport(_) | Self::Decode(_) => GENERIC_ERROR_TEXT,
        }
    }
}

/// The four backend endpoints the engine consumes.
#[async_trait]
pub trait MiningBackend: Send + Sync {
    /// `GET /api/event-log/{id}/data`
    async fn event_log_data(&self, event_log_id: EventLogId) -> Result<Value, BackendError>;

    /// `POST /api/event-log/{id}/mined-data`
    async fn mined_data(
        &self,
        event_log_id: EventLogId,
        payload: &FilterPayload,
    ) -> Result<MinedData, BackendError>;

    /// `POST /api/event-log/{id}/mined-data/export`; returns the export token.
    async fn export_mined_data(
        &self,
        event_log_id: EventLogId,
        payload: &FilterPayload,
    ) -> Result<String, BackendError>;

    /// `GET /api/download/{token}`
    async fn download(&self, token: &str) -> Result<Bytes, BackendError>;
}
