//! Append-only history of scoped filter snapshots.
//!
//! Every accepted mutation commits a new [`Snapshot`] derived from the
//! current one by replacing exactly one scope's filter list. Scope lists are
//! shared between snapshots, so carrying a scope over costs a refcount bump.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::filters::CaseFilter;
use crate::filters::CaseId;
use crate::filters::FilterKind;
use crate::notice::Notice;

/// Message shown when an exclusive filter narrows the other filters.
pub const NARROWED_NOTICE: &str = "The filter that you selected invalidates other filters as they may \
conflict the logic of this filter. Therefore your filters were adjusted to select only cases \
selected before.";

/// Message shown after an undo.
pub const UNDO_NOTICE: &str =
    "You have undone some of the given filters. You will not be able to recover this configuration directly";

/// Where a filter applies: across all spectra, or to one spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Global,
    Spectrum(usize),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Spectrum(index) => write!(f, "spectrum {index}"),
        }
    }
}

/// Complete per-scope filter state at one point of the history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    scopes: BTreeMap<Scope, Arc<[CaseFilter]>>,
}

static EMPTY_SNAPSHOT: Snapshot = Snapshot::empty();

impl Snapshot {
    pub const fn empty() -> Self {
        Self {
            scopes: BTreeMap::new(),
        }
    }

    /// Filters of `scope` in application order; empty if the scope was never set.
    pub fn filters(&self, scope: Scope) -> &[CaseFilter] {
        match self.scopes.get(&scope) {
            Some(filters) => filters,
            None => &[],
        }
    }

    pub fn filter_of_kind(&self, scope: Scope, kind: FilterKind) -> Option<&CaseFilter> {
        self.filters(scope)
            .iter()
            .find(|filter| filter.kind() == kind)
    }

    /// Scopes that have an entry, Global first.
    pub fn scopes(&self) -> impl Iterator<Item = Scope> + '_ {
        self.scopes.keys().copied()
    }

    /// A new snapshot equal to this one except for `scope`.
    pub fn with_scope(&self, scope: Scope, filters: Vec<CaseFilter>) -> Snapshot {
        let mut scopes = self.scopes.clone();
        scopes.insert(scope, filters.into());
        Snapshot { scopes }
    }

    pub(crate) fn shares_scope_with(&self, other: &Snapshot, scope: Scope) -> bool {
        match (self.scopes.get(&scope), other.scopes.get(&scope)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// Signal returned by every accepted history mutation.
///
/// The history never fetches or refreshes anything itself; whoever mutated it
/// acts on this value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryChange {
    /// Notice to surface to the user.
    pub notice: Option<Notice>,
    /// Whether the active spectrum was reset to 0.
    pub spectrum_reset: bool,
    /// Snapshot removed by an undo.
    pub undone: Option<Snapshot>,
}

/// The filter history of one configuration plus its active-spectrum cursor.
#[derive(Debug, Clone, Default)]
pub struct FilterHistory {
    entries: Vec<Snapshot>,
    active_spectrum: usize,
}

impl FilterHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Snapshot] {
        &self.entries
    }

    /// Latest snapshot, or the implicit empty one.
    pub fn current(&self) -> &Snapshot {
        self.entries.last().unwrap_or(&EMPTY_SNAPSHOT)
    }

    pub fn snapshot_for(&self, scope: Scope) -> &[CaseFilter] {
        self.current().filters(scope)
    }

    pub fn filter_of_kind(&self, scope: Scope, kind: FilterKind) -> Option<&CaseFilter> {
        self.current().filter_of_kind(scope, kind)
    }

    pub fn active_spectrum(&self) -> usize {
        self.active_spectrum
    }

    /// Returns whether the cursor moved.
    pub fn set_active_spectrum(&mut self, spectrum: usize) -> bool {
        let changed = self.active_spectrum != spectrum;
        self.active_spectrum = spectrum;
        changed
    }

    /// Apply `filter` to `scope`.
    ///
    /// Exclusive kinds always land in [`Scope::Global`] and narrow it to the
    /// kind's keep-set. `visible_cases` is only invoked on that path, for
    /// kinds other than Manual, to capture the cases the user currently sees.
    pub fn set_filter<F>(&mut self, scope: Scope, filter: CaseFilter, visible_cases: F) -> HistoryChange
    where
        F: FnOnce() -> Vec<CaseId>,
    {
        let kind = filter.kind();
        if let Some(keep) = kind.keep_set() {
            let mut replacement = vec![filter];
            if kind != FilterKind::Manual {
                replacement.push(CaseFilter::Manual(visible_cases()));
            }
            self.overwrite_global(replacement, keep);
            self.active_spectrum = 0;
            tracing::debug!(kind = kind.id(), requested_scope = %scope, "exclusive filter narrowed global scope");
            return HistoryChange {
                notice: Some(Notice::info(NARROWED_NOTICE)),
                spectrum_reset: true,
                undone: None,
            };
        }

        let mut filters: Vec<CaseFilter> = self
            .snapshot_for(scope)
            .iter()
            .filter(|existing| existing.kind() != kind)
            .cloned()
            .collect();
        filters.push(filter);
        self.commit(scope, filters);
        tracing::debug!(kind = kind.id(), %scope, "filter set");
        HistoryChange::default()
    }

    /// Remove the filter of `kind` from `scope`.
    ///
    /// Removing an exclusive kind other than Manual re-derives Global from
    /// that kind's keep-set, exactly as applying it would minus the filter.
    pub fn remove_filter(&mut self, scope: Scope, kind: FilterKind) -> HistoryChange {
        match kind.keep_set() {
            Some(keep) if kind != FilterKind::Manual => {
                self.overwrite_global(Vec::new(), keep);
            }
            _ => {
                let filters: Vec<CaseFilter> = self
                    .snapshot_for(scope)
                    .iter()
                    .filter(|existing| existing.kind() != kind)
                    .cloned()
                    .collect();
                self.commit(scope, filters);
            }
        }
        self.active_spectrum = 0;
        tracing::debug!(kind = kind.id(), %scope, "filter removed");
        HistoryChange {
            notice: None,
            spectrum_reset: true,
            undone: None,
        }
    }

    /// Drop the latest snapshot. `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<HistoryChange> {
        let undone = self.entries.pop()?;
        // The restored snapshot may not contain the spectrum that was active.
        self.active_spectrum = 0;
        tracing::debug!(remaining = self.entries.len(), "filter history undone");
        Some(HistoryChange {
            notice: Some(Notice::info(UNDO_NOTICE)),
            spectrum_reset: true,
            undone: Some(undone),
        })
    }

    fn overwrite_global(&mut self, new_filters: Vec<CaseFilter>, keep: &[FilterKind]) {
        let mut filters: Vec<CaseFilter> = self
            .snapshot_for(Scope::Global)
            .iter()
            .filter(|existing| {
                keep.contains(&existing.kind())
                    && !new_filters.iter().any(|new| new.kind() == existing.kind())
            })
            .cloned()
            .collect();
        filters.extend(new_filters);
        self.commit(Scope::Global, filters);
    }

    fn commit(&mut self, scope: Scope, filters: Vec<CaseFilter>) {
        let next = self.current().with_scope(scope, filters);
        self.entries.push(next);
    }
}
