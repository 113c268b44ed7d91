//! Derivation of the mining backend query from a filter snapshot.
//!
//! The same payload drives both the mined-data request and the export. All
//! functions here are pure; absent filters become absent JSON fields.

use chrono::DateTime;
use chrono::FixedOffset;
use chrono::NaiveDate;
use chrono::NaiveTime;
use chrono::Offset;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::filters::BatchType;
use crate::filters::CaseFilter;
use crate::filters::CaseId;
use crate::filters::FilterKind;
use crate::history::Scope;
use crate::history::Snapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPayload {
    pub spectra: Vec<SpectrumPayload>,
    pub global_filters: GlobalFilters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumPayload {
    pub on: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quartile: Option<f64>,
    pub batches: BatchPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchPayload {
    #[serde(rename = "batchType", default, skip_serializing_if = "Option::is_none")]
    pub batch_type: Option<BatchType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsilon: Option<f64>,
    #[serde(rename = "minSamples", default, skip_serializing_if = "Option::is_none")]
    pub min_samples: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cases: Option<Vec<CaseId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<Vec<String>>,
    #[serde(default)]
    pub activities: ActivityPayload,
    #[serde(default)]
    pub time: TimePayload,
}

/// `{}` unless a segment filter is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_activity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_activity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_start: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_end: Option<DateTime<FixedOffset>>,
}

/// Builds payloads; calendar dates are pinned to midnight at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadBuilder {
    offset: FixedOffset,
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new(Utc.fix())
    }
}

impl PayloadBuilder {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn global_filters(&self, snapshot: &Snapshot) -> GlobalFilters {
        let cases = match snapshot.filter_of_kind(Scope::Global, FilterKind::Manual) {
            Some(CaseFilter::Manual(cases)) => Some(cases.clone()),
            _ => None,
        };
        let variant = match snapshot.filter_of_kind(Scope::Global, FilterKind::Variant) {
            Some(CaseFilter::Variant(points)) => Some(points.clone()),
            _ => None,
        };
        let time = match snapshot.filter_of_kind(Scope::Global, FilterKind::DateRange) {
            Some(CaseFilter::DateRange(range)) => TimePayload {
                time_start: self.midnight(range.start),
                time_end: self.midnight(range.end),
            },
            _ => TimePayload::default(),
        };
        let activities = match snapshot.filter_of_kind(Scope::Global, FilterKind::Segment) {
            Some(CaseFilter::Segment(segment)) => ActivityPayload {
                start_activity: Some(segment.start_activity.clone()),
                end_activity: Some(segment.end_activity.clone()),
            },
            _ => ActivityPayload::default(),
        };

        GlobalFilters {
            cases,
            variant,
            activities,
            time,
        }
    }

    pub fn spectrum_payload(&self, snapshot: &Snapshot, spectrum: usize) -> SpectrumPayload {
        let scope = Scope::Spectrum(spectrum);
        let quartile = match snapshot.filter_of_kind(scope, FilterKind::Quartile) {
            Some(CaseFilter::Quartile(quartile)) => Some(quartile.key),
            _ => None,
        };
        let batches = match snapshot.filter_of_kind(scope, FilterKind::Clustering) {
            Some(CaseFilter::Clustering(params)) => BatchPayload {
                batch_type: Some(params.batch_type),
                epsilon: Some(params.epsilon),
                min_samples: Some(params.min_samples),
            },
            _ => BatchPayload::default(),
        };

        SpectrumPayload {
            on: spectrum,
            quartile,
            batches,
        }
    }

    /// One spectrum without a variant; N variant points give N-1 spectra.
    pub fn full_payload(&self, snapshot: &Snapshot) -> FilterPayload {
        let spectra = (0..spectrum_count(snapshot))
            .map(|spectrum| self.spectrum_payload(snapshot, spectrum))
            .collect();

        FilterPayload {
            spectra,
            global_filters: self.global_filters(snapshot),
        }
    }

    fn midnight(&self, date: NaiveDate) -> Option<DateTime<FixedOffset>> {
        date.and_time(NaiveTime::MIN)
            .and_local_timezone(self.offset)
            .single()
    }
}

/// Number of spectra the snapshot partitions a case into.
pub fn spectrum_count(snapshot: &Snapshot) -> usize {
    match snapshot.filter_of_kind(Scope::Global, FilterKind::Variant) {
        Some(CaseFilter::Variant(points)) => points.len().saturating_sub(1),
        _ => 1,
    }
}

/// Payload for `snapshot` with dates pinned to UTC.
pub fn build_full_payload(snapshot: &Snapshot) -> FilterPayload {
    PayloadBuilder::default().full_payload(snapshot)
}
