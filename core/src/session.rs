//! Application root for one user session.
//!
//! The session owns every configuration, the loaded event logs and the notice
//! board, and drives the change pipeline explicitly: mutate the history,
//! post its notice, refresh the widget models, then refetch.
//!
//! State sits behind a single `tokio::sync::Mutex`. The lock is never held
//! across a backend call, so compared configurations fetch concurrently and
//! filters may change while a request is in flight. Stale responses are
//! detected through the configuration's generation and re-requested.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::backend::BackendError;
use crate::backend::MiningBackend;
use crate::config::SpectrumConfig;
use crate::configuration::ConfigurationId;
use crate::configuration::ConfigurationRegistry;
use crate::configuration::ConfigurationState;
use crate::configuration::FetchOutcome;
use crate::error::ConfigurationError;
use crate::error::EventLogError;
use crate::error::Result;
use crate::error::SpectrumError;
use crate::event_log::EventLog;
use crate::event_log::EventLogId;
use crate::event_log::EventLogState;
use crate::filters::CaseFilter;
use crate::filters::FilterKind;
use crate::history::HistoryChange;
use crate::history::Scope;
use crate::mined::MinedData;
use crate::notice::Notice;
use crate::notice::NoticeBoard;
use crate::payload::FilterPayload;
use crate::payload::PayloadBuilder;

/// A downloaded export, named after its download token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub bytes: Bytes,
}

struct SessionState {
    registry: ConfigurationRegistry,
    event_logs: EventLogState,
    notices: NoticeBoard,
}

pub struct Session<B: MiningBackend + ?Sized> {
    backend: Arc<B>,
    builder: PayloadBuilder,
    state: Mutex<SessionState>,
}

impl<B: MiningBackend + ?Sized> Session<B> {
    pub fn new(backend: Arc<B>, config: &SpectrumConfig) -> Result<Self> {
        let builder = PayloadBuilder::new(config.payload.offset()?);
        Ok(Self {
            backend,
            builder,
            state: Mutex::new(SessionState {
                registry: ConfigurationRegistry::new(config.filters.clone()),
                event_logs: EventLogState::new(),
                notices: NoticeBoard::new(config.notices.dismiss_after()),
            }),
        })
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn payload_builder(&self) -> &PayloadBuilder {
        &self.builder
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event logs
    // ─────────────────────────────────────────────────────────────────────────

    /// Make `event_log_id` the active log, fetching its bootstrap data the
    /// first time. Returns the log's current configuration.
    pub async fn load_event_log(&self, event_log_id: EventLogId) -> Result<ConfigurationId> {
        {
            let mut state = self.state.lock().await;
            if state.event_logs.is_loaded(event_log_id) {
                state.event_logs.activate(event_log_id)?;
                return current_of(&state.event_logs, event_log_id);
            }
        }

        tracing::info!(event_log_id, "loading event log");
        let fetched = self.backend.event_log_data(event_log_id).await;

        let mut state = self.state.lock().await;
        let data = match fetched {
            Ok(data) => data,
            Err(err) => {
                state.notices.post(Notice::error(err.user_message()));
                return Err(err.into());
            }
        };

        // A concurrent load may have won the race.
        if !state.event_logs.is_loaded(event_log_id) {
            let default_configuration = state.registry.create(event_log_id);
            state
                .event_logs
                .insert(EventLog::new(event_log_id, data, default_configuration));
        }
        state.event_logs.activate(event_log_id)?;
        current_of(&state.event_logs, event_log_id)
    }

    pub async fn active_event_log(&self) -> Option<EventLog> {
        self.state.lock().await.event_logs.active().cloned()
    }

    pub async fn event_logs(&self) -> Vec<EventLog> {
        self.state.lock().await.event_logs.logs().cloned().collect()
    }

    pub async fn event_log(&self, event_log_id: EventLogId) -> Option<EventLog> {
        self.state.lock().await.event_logs.get(event_log_id).cloned()
    }

    /// Configuration that filter actions of the active log apply to.
    pub async fn current_configuration(&self) -> Result<ConfigurationId> {
        let mut state = self.state.lock().await;
        Ok(state.event_logs.active_mut()?.current())
    }

    /// Create a configuration in the active log.
    pub async fn add_configuration(&self, name: impl Into<String>) -> Result<ConfigurationId> {
        let mut state = self.state.lock().await;
        let state = &mut *state;
        let log = state.event_logs.active_mut()?;
        let id = state.registry.create(log.id());
        log.add_configuration(name, id);
        Ok(id)
    }

    pub async fn delete_configuration(&self, id: ConfigurationId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.event_logs.active_mut()?.delete_configuration(id)?;
        Ok(())
    }

    pub async fn set_configuration_view(&self, slot: usize, id: ConfigurationId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.event_logs.active_mut()?.set_configuration_view(slot, id)?;
        Ok(())
    }

    pub async fn switch_view(&self) -> Result<ConfigurationId> {
        let mut state = self.state.lock().await;
        Ok(state.event_logs.active_mut()?.switch_view())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Configurations
    // ─────────────────────────────────────────────────────────────────────────

    /// Read a configuration under the session lock.
    pub async fn with_configuration<R>(
        &self,
        id: ConfigurationId,
        read: impl FnOnce(&ConfigurationState) -> R,
    ) -> Result<R> {
        let state = self.state.lock().await;
        Ok(read(state.registry.get(id)?))
    }

    /// Run a history mutation and the pipeline that follows it.
    pub async fn apply<F>(&self, id: ConfigurationId, mutate: F) -> Result<HistoryChange>
    where
        F: FnOnce(&mut ConfigurationState) -> std::result::Result<HistoryChange, ConfigurationError>,
    {
        let change = {
            let mut state = self.state.lock().await;
            let change = mutate(state.registry.get_mut(id)?)?;
            if let Some(notice) = change.notice.clone() {
                state.notices.post(notice);
            }
            change
        };
        self.fetch(id).await?;
        Ok(change)
    }

    pub async fn set_filter(
        &self,
        id: ConfigurationId,
        scope: Scope,
        filter: CaseFilter,
    ) -> Result<HistoryChange> {
        self.apply(id, |state| state.set_filter(scope, filter)).await
    }

    pub async fn remove_filter(
        &self,
        id: ConfigurationId,
        scope: Scope,
        kind: FilterKind,
    ) -> Result<HistoryChange> {
        self.apply(id, |state| Ok(state.remove_filter(scope, kind))).await
    }

    /// `Ok(None)` when the history was already empty.
    pub async fn undo(&self, id: ConfigurationId) -> Result<Option<HistoryChange>> {
        let change = {
            let mut state = self.state.lock().await;
            let Some(change) = state.registry.get_mut(id)?.undo() else {
                return Ok(None);
            };
            if let Some(notice) = change.notice.clone() {
                state.notices.post(notice);
            }
            change
        };
        self.fetch(id).await?;
        Ok(Some(change))
    }

    /// Move the active spectrum. The payload doesn't depend on it, so only
    /// the widget models are refreshed.
    pub async fn set_active_spectrum(&self, id: ConfigurationId, spectrum: usize) -> Result<bool> {
        let mut state = self.state.lock().await;
        Ok(state.registry.get_mut(id)?.set_active_spectrum(spectrum))
    }

    /// Reset a configuration's sticky error and fetch again.
    pub async fn retry(&self, id: ConfigurationId) -> Result<bool> {
        self.state.lock().await.registry.get_mut(id)?.clear_error();
        self.fetch(id).await
    }

    pub async fn payload(&self, id: ConfigurationId) -> Result<FilterPayload> {
        let state = self.state.lock().await;
        Ok(state.registry.get(id)?.payload(&self.builder))
    }

    /// Fetch mined data for `id`. Returns whether fresh data was stored.
    ///
    /// Nothing is sent while a fetch for the same configuration is in flight
    /// or the configuration has failed; the in-flight fetch re-requests on
    /// its own if the history moved meanwhile. Backend failures become the
    /// configuration's sticky error plus an error notice, never an `Err`.
    pub async fn fetch(&self, id: ConfigurationId) -> Result<bool> {
        loop {
            let ticket = {
                let mut state = self.state.lock().await;
                match state.registry.get_mut(id)?.begin_fetch(&self.builder) {
                    Some(ticket) => ticket,
                    None => return Ok(false),
                }
            };

            let result = self
                .backend
                .mined_data(ticket.event_log_id, &ticket.payload)
                .await;

            let mut state = self.state.lock().await;
            match state.registry.get_mut(id)?.complete_fetch(ticket, result) {
                FetchOutcome::Stored => return Ok(true),
                FetchOutcome::Stale => continue,
                FetchOutcome::Failed(err) => {
                    state.notices.post(Notice::error(err.user_message()));
                    return Ok(false);
                }
            }
        }
    }

    /// Cached mined data, fetched on first read.
    pub async fn configuration_data(&self, id: ConfigurationId) -> Result<Option<Arc<MinedData>>> {
        if let Some(data) = self.cached(id).await? {
            return Ok(Some(data));
        }
        self.fetch(id).await?;
        self.cached(id).await
    }

    async fn cached(&self, id: ConfigurationId) -> Result<Option<Arc<MinedData>>> {
        let state = self.state.lock().await;
        Ok(state.registry.get(id)?.cached().cloned())
    }

    /// Export the configuration's filtered log and download it.
    pub async fn export(&self, id: ConfigurationId) -> Result<ExportArtifact> {
        let (event_log_id, payload) = {
            let mut state = self.state.lock().await;
            let configuration = state.registry.get_mut(id)?;
            let payload = configuration.begin_export(&self.builder)?;
            (configuration.event_log_id(), payload)
        };

        tracing::info!(configuration_id = id, event_log_id, "exporting event log");
        let result = self.export_and_download(event_log_id, &payload).await;

        let mut state = self.state.lock().await;
        state.registry.get_mut(id)?.finish_export();
        match result {
            Ok(artifact) => Ok(artifact),
            Err(err) => {
                state.notices.post(Notice::error(err.user_message()));
                Err(SpectrumError::Backend(err))
            }
        }
    }

    async fn export_and_download(
        &self,
        event_log_id: EventLogId,
        payload: &FilterPayload,
    ) -> std::result::Result<ExportArtifact, BackendError> {
        let token = self.backend.export_mined_data(event_log_id, payload).await?;
        let bytes = self.backend.download(&token).await?;
        Ok(ExportArtifact {
            file_name: token,
            bytes,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Notices
    // ─────────────────────────────────────────────────────────────────────────

    /// The visible notice, if any.
    pub async fn notice(&self) -> Option<Notice> {
        self.state.lock().await.notices.current().cloned()
    }

    pub async fn dismiss_notice(&self) {
        self.state.lock().await.notices.dismiss();
    }
}

fn current_of(event_logs: &EventLogState, event_log_id: EventLogId) -> Result<ConfigurationId> {
    event_logs
        .get(event_log_id)
        .map(EventLog::current)
        .ok_or_else(|| EventLogError::NotLoaded { id: event_log_id }.into())
}
