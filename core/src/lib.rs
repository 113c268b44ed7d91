//! Filter history and configuration state for performance spectrum
//! exploration.
//!
//! A user explores one event log through several independently filtered
//! configurations. This crate holds:
//! - the closed set of case filter kinds and their exclusivity rules
//! - an undoable, scope-partitioned filter history per configuration
//! - derivation of the mining backend payload from a history snapshot
//! - per-configuration fetch state (loading, sticky error, stale responses)
//! - the event log cursor and side-by-side comparison views
//!
//! HTTP lives in `spectrum-backend-client` behind the [`MiningBackend`] trait.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod backend;
pub mod config;
pub mod configuration;
pub mod error;
pub mod event_log;
pub mod filters;
pub mod history;
pub mod mined;
pub mod notice;
pub mod payload;
pub mod session;

pub use backend::{BackendError, MiningBackend};
pub use config::SpectrumConfig;
pub use configuration::{
    ConfigurationId, ConfigurationRegistry, ConfigurationState, FetchOutcome, FetchTicket,
};
pub use error::{ConfigurationError, ErrorCategory, EventLogError, Result, SpectrumError};
pub use event_log::{EventLog, EventLogId, EventLogState};
pub use filters::{CaseFilter, CaseId, FilterKind};
pub use history::{FilterHistory, HistoryChange, Scope, Snapshot};
pub use mined::MinedData;
pub use notice::{Notice, NoticeBoard, NoticeLevel};
pub use payload::{FilterPayload, PayloadBuilder, build_full_payload};
pub use session::{ExportArtifact, Session};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
