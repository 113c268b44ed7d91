//! Filter kinds and their per-kind behaviour.
//!
//! The catalog is closed: every kind is a variant of [`FilterKind`] and every
//! per-kind capability (display, exclusivity, UI-model refresh) is an
//! exhaustive `match`, so adding a kind fails to compile until all of its
//! behaviour is spelled out.

use chrono::Datelike;
use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;

use crate::config::FilterDefaults;
use crate::history::Scope;
use crate::history::Snapshot;

/// Identifier of a traced case as reported by the mining backend.
pub type CaseId = String;

/// The fixed set of filter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterKind {
    /// Explicit list of case ids.
    Manual,
    /// Calendar date range.
    DateRange,
    /// Activity-to-activity range.
    Segment,
    /// Batch clustering parameters.
    Clustering,
    /// Duration quartile.
    Quartile,
    /// Ordered labelled points partitioning a case into spectra.
    Variant,
}

const MANUAL_KEEPS: &[FilterKind] = &[
    FilterKind::DateRange,
    FilterKind::Segment,
    FilterKind::Variant,
];
const DATE_RANGE_ONLY: &[FilterKind] = &[FilterKind::DateRange];

impl FilterKind {
    pub const ALL: [FilterKind; 6] = [
        FilterKind::Manual,
        FilterKind::DateRange,
        FilterKind::Segment,
        FilterKind::Clustering,
        FilterKind::Quartile,
        FilterKind::Variant,
    ];

    /// Stable identifier, shared with the frontend vocabulary.
    pub fn id(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::DateRange => "dateRange",
            Self::Segment => "segment",
            Self::Clustering => "clustering",
            Self::Quartile => "quartile",
            Self::Variant => "variant",
        }
    }

    /// Human readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Manual => "Manual",
            Self::DateRange => "Date Range",
            Self::Segment => "Segment filter",
            Self::Clustering => "Batch Clustering",
            Self::Quartile => "Quartile filter",
            Self::Variant => "Variant filter",
        }
    }

    /// Kinds that survive when a filter of this kind is applied.
    ///
    /// `Some` marks the kind as exclusive: applying it drops every other
    /// global filter that is not listed here.
    pub fn keep_set(self) -> Option<&'static [FilterKind]> {
        match self {
            Self::Manual => Some(MANUAL_KEEPS),
            Self::Segment | Self::Variant => Some(DATE_RANGE_ONLY),
            Self::DateRange | Self::Clustering | Self::Quartile => None,
        }
    }

    pub fn is_exclusive(self) -> bool {
        self.keep_set().is_some()
    }

    /// UI-model refresh hook, if this kind mirrors its value into a model.
    pub fn refresher(self) -> Option<fn(&mut RefreshContext<'_>)> {
        match self {
            Self::DateRange => Some(refresh_date_model),
            Self::Segment => Some(refresh_segment_model),
            Self::Clustering => Some(refresh_clustering_model),
            Self::Quartile => Some(refresh_quartile_model),
            Self::Manual | Self::Variant => None,
        }
    }

    pub fn refresh(self, ctx: &mut RefreshContext<'_>) {
        if let Some(refresh) = self.refresher() {
            refresh(ctx);
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Range between two activities of a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRange {
    pub start_activity: String,
    pub end_activity: String,
}

/// Side of a segment on which batches are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchType {
    Start,
    End,
    Both,
}

impl BatchType {
    pub const ALL: [BatchType; 3] = [BatchType::Start, BatchType::End, BatchType::Both];

    pub fn key(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Both => "both",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Start => "Batching on start",
            Self::End => "Batching on end",
            Self::Both => "Batching on both ends",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|batch| batch.key() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusteringParams {
    pub batch_type: BatchType,
    pub epsilon: f64,
    pub min_samples: u32,
}

/// Selected duration quartile; `key` is the upper quantile bound.
#[derive(Debug, Clone, PartialEq)]
pub struct QuartileSelection {
    pub key: f64,
    pub label: String,
}

impl QuartileSelection {
    pub fn new(key: f64, label: impl Into<String>) -> Self {
        Self {
            key,
            label: label.into(),
        }
    }

    /// The four quartiles offered by the picker.
    pub fn presets() -> Vec<QuartileSelection> {
        vec![
            Self::new(0.25, "1st quartile"),
            Self::new(0.5, "2nd quartile"),
            Self::new(0.75, "3rd quartile"),
            Self::new(1.0, "4th quartile"),
        ]
    }
}

/// A filter together with its kind-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseFilter {
    Manual(Vec<CaseId>),
    DateRange(DateRange),
    Segment(SegmentRange),
    Clustering(ClusteringParams),
    Quartile(QuartileSelection),
    Variant(Vec<String>),
}

impl CaseFilter {
    pub fn kind(&self) -> FilterKind {
        match self {
            Self::Manual(_) => FilterKind::Manual,
            Self::DateRange(_) => FilterKind::DateRange,
            Self::Segment(_) => FilterKind::Segment,
            Self::Clustering(_) => FilterKind::Clustering,
            Self::Quartile(_) => FilterKind::Quartile,
            Self::Variant(_) => FilterKind::Variant,
        }
    }

    /// Text shown for the filter in the applied-filters list.
    pub fn display(&self) -> String {
        match self {
            Self::Manual(cases) => format!("{} cases selected", cases.len()),
            Self::DateRange(range) => format_date_range(range.start, range.end),
            Self::Segment(segment) => {
                format!("{} - {}", segment.start_activity, segment.end_activity)
            }
            Self::Clustering(params) => format!(
                "Batch type: {}, Epsilon: {}, Min samples: {}",
                params.batch_type.label(),
                params.epsilon,
                params.min_samples
            ),
            Self::Quartile(quartile) => quartile.label.clone(),
            Self::Variant(points) => points.join(" - "),
        }
    }
}

const GERMAN_MONTHS: [&str; 12] = [
    "Januar",
    "Februar",
    "März",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

/// `1. Januar 2024`
fn format_long_date(date: NaiveDate) -> String {
    format!("{}. {} {}", date.day(), german_month(date), date.year())
}

fn german_month(date: NaiveDate) -> &'static str {
    GERMAN_MONTHS[date.month0() as usize]
}

/// German long-date range that names shared fields once:
/// `1.–31. Januar 2024`, `1. Januar – 31. März 2024`.
fn format_date_range(start: NaiveDate, end: NaiveDate) -> String {
    if start == end {
        format_long_date(start)
    } else if start.year() != end.year() {
        format!("{} – {}", format_long_date(start), format_long_date(end))
    } else if start.month() != end.month() {
        format!(
            "{}. {} – {}",
            start.day(),
            german_month(start),
            format_long_date(end)
        )
    } else {
        format!("{}.–{}", start.day(), format_long_date(end))
    }
}

/// One spectrum of a variant, as offered by the spectrum picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantSegment {
    pub key: usize,
    pub label: String,
}

/// Consecutive pairs of variant points; N points yield N-1 segments.
pub fn variant_segments(variant: &[String]) -> Vec<VariantSegment> {
    variant
        .windows(2)
        .enumerate()
        .map(|(key, pair)| VariantSegment {
            key,
            label: format!("{} - {}", pair[0], pair[1]),
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// UI mirror models
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateModel {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentModel {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringModel {
    pub enabled: bool,
    pub batch_type: Option<BatchType>,
    pub epsilon: f64,
    pub min_samples: u32,
}

impl ClusteringModel {
    pub fn disabled(defaults: &FilterDefaults) -> Self {
        Self {
            enabled: false,
            batch_type: None,
            epsilon: defaults.clustering_epsilon,
            min_samples: defaults.clustering_min_samples,
        }
    }
}

/// Values the filter widgets display, kept in sync with the current snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterModels {
    pub date: DateModel,
    pub segment: SegmentModel,
    pub clustering: ClusteringModel,
    pub quartile: Option<QuartileSelection>,
}

impl FilterModels {
    pub fn new(defaults: &FilterDefaults) -> Self {
        Self {
            date: DateModel::default(),
            segment: SegmentModel::default(),
            clustering: ClusteringModel::disabled(defaults),
            quartile: None,
        }
    }
}

/// Everything a refresh hook may read or write.
pub struct RefreshContext<'a> {
    pub snapshot: &'a Snapshot,
    pub active_spectrum: usize,
    pub defaults: &'a FilterDefaults,
    pub models: &'a mut FilterModels,
}

/// Run the refresh hook of every kind that has one.
pub fn refresh_all(ctx: &mut RefreshContext<'_>) {
    for kind in FilterKind::ALL {
        kind.refresh(ctx);
    }
}

fn refresh_date_model(ctx: &mut RefreshContext<'_>) {
    ctx.models.date = match ctx.snapshot.filter_of_kind(Scope::Global, FilterKind::DateRange) {
        Some(CaseFilter::DateRange(range)) => DateModel {
            start: Some(range.start),
            end: Some(range.end),
        },
        _ => DateModel::default(),
    };
}

fn refresh_segment_model(ctx: &mut RefreshContext<'_>) {
    ctx.models.segment = match ctx.snapshot.filter_of_kind(Scope::Global, FilterKind::Segment) {
        Some(CaseFilter::Segment(segment)) => SegmentModel {
            start: Some(segment.start_activity.clone()),
            end: Some(segment.end_activity.clone()),
        },
        _ => SegmentModel::default(),
    };
}

fn refresh_clustering_model(ctx: &mut RefreshContext<'_>) {
    let scope = Scope::Spectrum(ctx.active_spectrum);
    ctx.models.clustering = match ctx.snapshot.filter_of_kind(scope, FilterKind::Clustering) {
        Some(CaseFilter::Clustering(params)) => ClusteringModel {
            enabled: true,
            batch_type: Some(params.batch_type),
            epsilon: params.epsilon,
            min_samples: params.min_samples,
        },
        _ => ClusteringModel::disabled(ctx.defaults),
    };
}

fn refresh_quartile_model(ctx: &mut RefreshContext<'_>) {
    let scope = Scope::Spectrum(ctx.active_spectrum);
    ctx.models.quartile = match ctx.snapshot.filter_of_kind(scope, FilterKind::Quartile) {
        Some(CaseFilter::Quartile(quartile)) => Some(quartile.clone()),
        _ => None,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn ids_round_trip_through_from_id() {
        for kind in FilterKind::ALL {
            assert_eq!(FilterKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(FilterKind::from_id("unknown"), None);
    }

    #[test]
    fn exclusive_kinds_and_keep_sets() {
        assert_eq!(
            FilterKind::Manual.keep_set(),
            Some(&[FilterKind::DateRange, FilterKind::Segment, FilterKind::Variant][..])
        );
        assert_eq!(
            FilterKind::Segment.keep_set(),
            Some(&[FilterKind::DateRange][..])
        );
        assert_eq!(
            FilterKind::Variant.keep_set(),
            Some(&[FilterKind::DateRange][..])
        );
        assert!(!FilterKind::DateRange.is_exclusive());
        assert!(!FilterKind::Clustering.is_exclusive());
        assert!(!FilterKind::Quartile.is_exclusive());
    }

    #[test]
    fn only_model_backed_kinds_refresh() {
        let with_refresh: Vec<FilterKind> = FilterKind::ALL
            .into_iter()
            .filter(|kind| kind.refresher().is_some())
            .collect();
        assert_eq!(
            with_refresh,
            vec![
                FilterKind::DateRange,
                FilterKind::Segment,
                FilterKind::Clustering,
                FilterKind::Quartile
            ]
        );
    }

    #[test]
    fn date_range_display_names_shared_fields_once() {
        let display = |start, end| CaseFilter::DateRange(DateRange { start, end }).display();

        assert_eq!(
            display(date(2024, 1, 1), date(2024, 1, 31)),
            "1.–31. Januar 2024"
        );
        assert_eq!(
            display(date(2024, 2, 10), date(2024, 5, 3)),
            "10. Februar – 3. Mai 2024"
        );
        assert_eq!(
            display(date(2023, 12, 24), date(2024, 1, 6)),
            "24. Dezember 2023 – 6. Januar 2024"
        );
        assert_eq!(display(date(2024, 3, 1), date(2024, 3, 1)), "1. März 2024");
    }

    #[test]
    fn display_formats() {
        let manual = CaseFilter::Manual(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(manual.display(), "3 cases selected");

        let range = CaseFilter::DateRange(DateRange {
            start: date(2024, 1, 1),
            end: date(2024, 3, 31),
        });
        assert_eq!(range.display(), "1. Januar – 31. März 2024");

        let segment = CaseFilter::Segment(SegmentRange {
            start_activity: "Register".into(),
            end_activity: "Ship".into(),
        });
        assert_eq!(segment.display(), "Register - Ship");

        let clustering = CaseFilter::Clustering(ClusteringParams {
            batch_type: BatchType::Both,
            epsilon: 10.0,
            min_samples: 20,
        });
        assert_eq!(
            clustering.display(),
            "Batch type: Batching on both ends, Epsilon: 10, Min samples: 20"
        );

        let quartile = CaseFilter::Quartile(QuartileSelection::new(0.5, "2nd quartile"));
        assert_eq!(quartile.display(), "2nd quartile");

        let variant = CaseFilter::Variant(vec!["A".into(), "B".into(), "C".into()]);
        assert_eq!(variant.display(), "A - B - C");
    }

    #[test]
    fn variant_segments_pairs_consecutive_points() {
        let variant = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        assert_eq!(
            variant_segments(&variant),
            vec![
                VariantSegment {
                    key: 0,
                    label: "A - B".into()
                },
                VariantSegment {
                    key: 1,
                    label: "B - C".into()
                },
            ]
        );
        assert!(variant_segments(&variant[..1]).is_empty());
    }

    #[test]
    fn batch_type_keys_round_trip() {
        for batch in BatchType::ALL {
            assert_eq!(BatchType::from_key(batch.key()), Some(batch));
        }
        assert_eq!(
            serde_json::to_value(BatchType::Start).expect("serialize"),
            serde_json::json!("start")
        );
    }

    #[test]
    fn refresh_reads_global_and_active_spectrum() {
        let defaults = FilterDefaults::default();
        let snapshot = Snapshot::default()
            .with_scope(
                Scope::Global,
                vec![CaseFilter::DateRange(DateRange {
                    start: date(2024, 1, 1),
                    end: date(2024, 1, 2),
                })],
            )
            .with_scope(
                Scope::Spectrum(1),
                vec![CaseFilter::Quartile(QuartileSelection::new(0.75, "3rd quartile"))],
            );
        let mut models = FilterModels::new(&defaults);

        let mut ctx = RefreshContext {
            snapshot: &snapshot,
            active_spectrum: 0,
            defaults: &defaults,
            models: &mut models,
        };
        refresh_all(&mut ctx);
        assert_eq!(models.date.start, Some(date(2024, 1, 1)));
        assert_eq!(models.quartile, None);
        assert_eq!(models.clustering, ClusteringModel::disabled(&defaults));

        let mut ctx = RefreshContext {
            snapshot: &snapshot,
            active_spectrum: 1,
            defaults: &defaults,
            models: &mut models,
        };
        refresh_all(&mut ctx);
        assert_eq!(
            models.quartile,
            Some(QuartileSelection::new(0.75, "3rd quartile"))
        );
    }
}
