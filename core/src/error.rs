//! Error types for spectrum sessions.
//!
//! Fetch failures never surface here: they are absorbed into a
//! configuration's sticky error flag. What remains are caller mistakes
//! (unknown ids, invalid views), configuration-file problems, and failures of
//! operations the caller awaits directly (event-log bootstrap, export).

use thiserror::Error;

use crate::backend::BackendError;
use crate::configuration::ConfigurationId;
use crate::event_log::EventLogId;

/// Error category for structured logging and exit-code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Config file or env misconfigured
    ConfigError,
    /// Invalid operation on a configuration
    ConfigurationError,
    /// Invalid operation on an event log view
    EventLogError,
    /// The mining backend rejected or failed a request
    BackendError,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigError => "CONFIG_ERROR",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::EventLogError => "EVENT_LOG_ERROR",
            Self::BackendError => "BACKEND_ERROR",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("configuration {id} does not exist")]
    Unknown { id: ConfigurationId },

    #[error("configuration {id} has no mined data for its current filters; cannot capture the visible cases")]
    NotReady { id: ConfigurationId },

    #[error("configuration {id} is already exporting")]
    AlreadyExporting { id: ConfigurationId },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EventLogError {
    #[error("no event log is active")]
    NoActiveEventLog,

    #[error("event log {id} is not loaded")]
    NotLoaded { id: EventLogId },

    #[error("configuration {id} does not belong to the active event log")]
    ForeignConfiguration { id: ConfigurationId },

    #[error("configuration {id} is already shown side by side")]
    AlreadyShown { id: ConfigurationId },

    #[error("view slot {slot} is out of range")]
    InvalidSlot { slot: usize },

    #[error("cannot delete the last configuration of an event log")]
    LastConfiguration,
}

#[derive(Debug, Error)]
pub enum SpectrumError {
    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    EventLog(#[from] EventLogError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl SpectrumError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config { .. } => ErrorCategory::ConfigError,
            Self::Configuration(_) => ErrorCategory::ConfigurationError,
            Self::EventLog(_) => ErrorCategory::EventLogError,
            Self::Backend(_) => ErrorCategory::BackendError,
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for spectrum operations
pub type Result<T> = std::result::Result<T, SpectrumError>;
