//! Per-configuration state and the registry that owns it.
//!
//! A configuration is one independently filtered view of an event log. It
//! owns its filter history, the last mined data, fetch bookkeeping and the
//! widget models. All access goes through its id, so the state can move
//! inside the registry without invalidating anything callers hold.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::backend::BackendError;
use crate::config::FilterDefaults;
use crate::error::ConfigurationError;
use crate::event_log::EventLogId;
use crate::filters::BatchType;
use crate::filters::CaseFilter;
use crate::filters::CaseId;
use crate::filters::ClusteringParams;
use crate::filters::DateRange;
use crate::filters::FilterKind;
use crate::filters::FilterModels;
use crate::filters::QuartileSelection;
use crate::filters::RefreshContext;
use crate::filters::SegmentRange;
use crate::filters::refresh_all;
use crate::history::FilterHistory;
use crate::history::HistoryChange;
use crate::history::Scope;
use crate::history::Snapshot;
use crate::mined::MinedData;
use crate::payload::FilterPayload;
use crate::payload::PayloadBuilder;

pub type ConfigurationId = u32;

/// A fetch that has been started and must be handed back to
/// [`ConfigurationState::complete_fetch`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub configuration_id: ConfigurationId,
    pub event_log_id: EventLogId,
    pub payload: FilterPayload,
    generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The response was cached.
    Stored,
    /// The history moved while the request was in flight; the response was
    /// dropped and a new fetch is needed.
    Stale,
    /// The request failed; the configuration is now in its sticky error state.
    Failed(BackendError),
}

#[derive(Debug, Clone)]
pub struct ConfigurationState {
    id: ConfigurationId,
    event_log_id: EventLogId,
    history: FilterHistory,
    data: Option<Arc<MinedData>>,
    /// Generation the cached data was mined for.
    data_generation: Option<u64>,
    loading: bool,
    errored: bool,
    exporting: bool,
    generation: u64,
    defaults: FilterDefaults,
    models: FilterModels,
}

impl ConfigurationState {
    fn new(id: ConfigurationId, event_log_id: EventLogId, defaults: FilterDefaults) -> Self {
        let models = FilterModels::new(&defaults);
        Self {
            id,
            event_log_id,
            history: FilterHistory::new(),
            data: None,
            data_generation: None,
            loading: false,
            errored: false,
            exporting: false,
            generation: 0,
            defaults,
            models,
        }
    }

    pub fn id(&self) -> ConfigurationId {
        self.id
    }

    pub fn event_log_id(&self) -> EventLogId {
        self.event_log_id
    }

    pub fn history(&self) -> &FilterHistory {
        &self.history
    }

    pub fn current_snapshot(&self) -> &Snapshot {
        self.history.current()
    }

    pub fn filters_for(&self, scope: Scope) -> &[CaseFilter] {
        self.history.snapshot_for(scope)
    }

    pub fn filter_of_kind(&self, scope: Scope, kind: FilterKind) -> Option<&CaseFilter> {
        self.history.filter_of_kind(scope, kind)
    }

    pub fn active_spectrum(&self) -> usize {
        self.history.active_spectrum()
    }

    pub fn models(&self) -> &FilterModels {
        &self.models
    }

    /// Last mined data; `None` until the first fetch resolves.
    pub fn cached(&self) -> Option<&Arc<MinedData>> {
        self.data.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn has_error(&self) -> bool {
        self.errored
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting
    }

    /// Whether the cached data was mined for the current history.
    pub fn is_current(&self) -> bool {
        self.data.is_some() && self.data_generation == Some(self.generation)
    }

    /// Cases shown in the active spectrum of the cached data.
    pub fn visible_cases(&self) -> Option<Vec<CaseId>> {
        self.data
            .as_ref()
            .map(|data| data.cases_of_spectrum(self.history.active_spectrum()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // History mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply a filter. Exclusive kinds other than Manual need data mined for
    /// the current history to capture the visible cases.
    pub fn set_filter(
        &mut self,
        scope: Scope,
        filter: CaseFilter,
    ) -> Result<HistoryChange, ConfigurationError> {
        let kind = filter.kind();
        let needs_cases = kind.is_exclusive() && kind != FilterKind::Manual;
        let visible = if needs_cases {
            if !self.is_current() {
                return Err(ConfigurationError::NotReady { id: self.id });
            }
            self.visible_cases()
        } else {
            None
        };

        let change = self
            .history
            .set_filter(scope, filter, || visible.unwrap_or_default());
        self.after_mutation();
        Ok(change)
    }

    pub fn remove_filter(&mut self, scope: Scope, kind: FilterKind) -> HistoryChange {
        let change = self.history.remove_filter(scope, kind);
        self.after_mutation();
        change
    }

    pub fn undo(&mut self) -> Option<HistoryChange> {
        let change = self.history.undo()?;
        self.after_mutation();
        Some(change)
    }

    /// Move the active spectrum; widget models follow it.
    pub fn set_active_spectrum(&mut self, spectrum: usize) -> bool {
        let changed = self.history.set_active_spectrum(spectrum);
        if changed {
            self.refresh_models();
        }
        changed
    }

    pub fn set_filtered_cases(
        &mut self,
        cases: Vec<CaseId>,
    ) -> Result<HistoryChange, ConfigurationError> {
        self.set_filter(Scope::Global, CaseFilter::Manual(cases))
    }

    pub fn set_date_filter(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HistoryChange, ConfigurationError> {
        self.set_filter(Scope::Global, CaseFilter::DateRange(DateRange { start, end }))
    }

    pub fn set_segment_filter(
        &mut self,
        start_activity: impl Into<String>,
        end_activity: impl Into<String>,
    ) -> Result<HistoryChange, ConfigurationError> {
        self.set_filter(
            Scope::Global,
            CaseFilter::Segment(SegmentRange {
                start_activity: start_activity.into(),
                end_activity: end_activity.into(),
            }),
        )
    }

    /// Clustering applies to the active spectrum.
    pub fn set_clustering_filter(
        &mut self,
        batch_type: BatchType,
        epsilon: f64,
        min_samples: u32,
    ) -> Result<HistoryChange, ConfigurationError> {
        let scope = Scope::Spectrum(self.history.active_spectrum());
        self.set_filter(
            scope,
            CaseFilter::Clustering(ClusteringParams {
                batch_type,
                epsilon,
                min_samples,
            }),
        )
    }

    /// Quartile applies to the active spectrum.
    pub fn set_quartile_filter(
        &mut self,
        quartile: QuartileSelection,
    ) -> Result<HistoryChange, ConfigurationError> {
        let scope = Scope::Spectrum(self.history.active_spectrum());
        self.set_filter(scope, CaseFilter::Quartile(quartile))
    }

    pub fn set_variant_filter(
        &mut self,
        variant: Vec<String>,
    ) -> Result<HistoryChange, ConfigurationError> {
        self.set_filter(Scope::Global, CaseFilter::Variant(variant))
    }

    /// Sync the widget models with the current snapshot and active spectrum.
    pub fn refresh_models(&mut self) {
        let mut ctx = RefreshContext {
            snapshot: self.history.current(),
            active_spectrum: self.history.active_spectrum(),
            defaults: &self.defaults,
            models: &mut self.models,
        };
        refresh_all(&mut ctx);
    }

    fn after_mutation(&mut self) {
        self.generation += 1;
        self.refresh_models();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Fetch bookkeeping
    // ─────────────────────────────────────────────────────────────────────────

    pub fn payload(&self, builder: &PayloadBuilder) -> FilterPayload {
        builder.full_payload(self.history.current())
    }

    /// Start a fetch unless one is in flight or the configuration has failed.
    pub fn begin_fetch(&mut self, builder: &PayloadBuilder) -> Option<FetchTicket> {
        if self.loading || self.errored {
            tracing::debug!(
                configuration_id = self.id,
                loading = self.loading,
                errored = self.errored,
                "fetch skipped"
            );
            return None;
        }
        self.loading = true;
        Some(FetchTicket {
            configuration_id: self.id,
            event_log_id: self.event_log_id,
            payload: self.payload(builder),
            generation: self.generation,
        })
    }

    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<MinedData, BackendError>,
    ) -> FetchOutcome {
        self.loading = false;
        match result {
            Ok(_) if ticket.generation != self.generation => {
                tracing::debug!(
                    configuration_id = self.id,
                    requested = ticket.generation,
                    current = self.generation,
                    "dropping stale mined data"
                );
                FetchOutcome::Stale
            }
            Ok(data) => {
                tracing::debug!(
                    configuration_id = self.id,
                    spectra = data.spectra.len(),
                    "mined data cached"
                );
                self.data = Some(Arc::new(data));
                self.data_generation = Some(ticket.generation);
                FetchOutcome::Stored
            }
            Err(err) => {
                tracing::warn!(configuration_id = self.id, error = %err, "fetch failed");
                self.errored = true;
                FetchOutcome::Failed(err)
            }
        }
    }

    /// Clear the sticky error so fetches may start again.
    pub fn clear_error(&mut self) {
        self.errored = false;
    }

    pub fn begin_export(
        &mut self,
        builder: &PayloadBuilder,
    ) -> Result<FilterPayload, ConfigurationError> {
        if self.exporting {
            return Err(ConfigurationError::AlreadyExporting { id: self.id });
        }
        self.exporting = true;
        Ok(self.payload(builder))
    }

    pub fn finish_export(&mut self) {
        self.exporting = false;
    }
}

/// Owner of every configuration created during a session.
///
/// Ids are `max + 1` and states are never removed, so an id is never reused.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationRegistry {
    states: BTreeMap<ConfigurationId, ConfigurationState>,
    defaults: FilterDefaults,
}

impl ConfigurationRegistry {
    pub fn new(defaults: FilterDefaults) -> Self {
        Self {
            states: BTreeMap::new(),
            defaults,
        }
    }

    pub fn create(&mut self, event_log_id: EventLogId) -> ConfigurationId {
        let id = self
            .states
            .keys()
            .next_back()
            .map_or(1, |max| max + 1);
        self.states.insert(
            id,
            ConfigurationState::new(id, event_log_id, self.defaults.clone()),
        );
        tracing::debug!(configuration_id = id, event_log_id, "configuration created");
        id
    }

    pub fn get(&self, id: ConfigurationId) -> Result<&ConfigurationState, ConfigurationError> {
        self.states
            .get(&id)
            .ok_or(ConfigurationError::Unknown { id })
    }

    pub fn get_mut(
        &mut self,
        id: ConfigurationId,
    ) -> Result<&mut ConfigurationState, ConfigurationError> {
        self.states
            .get_mut(&id)
            .ok_or(ConfigurationError::Unknown { id })
    }

    pub fn contains(&self, id: ConfigurationId) -> bool {
        self.states.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ConfigurationId> + '_ {
        self.states.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
