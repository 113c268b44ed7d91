//! Filter flags shared by every subcommand.

use chrono::NaiveDate;
use clap::Args;
use spectrum_core::CaseFilter;
use spectrum_core::Scope;
use spectrum_core::Snapshot;
use spectrum_core::filters::BatchType;
use spectrum_core::filters::ClusteringParams;
use spectrum_core::filters::DateRange;
use spectrum_core::filters::QuartileSelection;
use spectrum_core::filters::SegmentRange;

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Restrict to these case ids (comma separated)
    #[arg(long, value_delimiter = ',', value_name = "CASE_ID")]
    pub cases: Vec<String>,

    /// First day of the date range (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date, requires = "to")]
    pub from: Option<NaiveDate>,

    /// Last day of the date range (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date, requires = "from")]
    pub to: Option<NaiveDate>,

    /// Activity segment as START:END
    #[arg(long, value_parser = parse_segment, value_name = "START:END", conflicts_with = "variant")]
    pub segment: Option<SegmentRange>,

    /// Variant points (comma separated); N points give N-1 spectra
    #[arg(long, value_delimiter = ',', value_name = "ACTIVITY")]
    pub variant: Vec<String>,

    /// Duration quartile for the selected spectrum (0.25, 0.5, 0.75 or 1)
    #[arg(long, value_parser = parse_quartile)]
    pub quartile: Option<QuartileSelection>,

    /// Batch clustering for the selected spectrum as TYPE:EPSILON:MIN_SAMPLES
    #[arg(long, value_parser = parse_clustering, value_name = "TYPE:EPS:MIN")]
    pub cluster: Option<ClusteringParams>,

    /// Spectrum that --quartile and --cluster apply to
    #[arg(long, default_value_t = 0)]
    pub spectrum: usize,
}

impl FilterArgs {
    /// Exclusive filter given on the command line, if any.
    pub fn exclusive(&self) -> Option<CaseFilter> {
        if let Some(segment) = &self.segment {
            return Some(CaseFilter::Segment(segment.clone()));
        }
        (!self.variant.is_empty()).then(|| CaseFilter::Variant(self.variant.clone()))
    }

    pub fn manual(&self) -> Option<CaseFilter> {
        (!self.cases.is_empty()).then(|| CaseFilter::Manual(self.cases.clone()))
    }

    pub fn date_range(&self) -> Option<CaseFilter> {
        match (self.from, self.to) {
            (Some(start), Some(end)) => Some(CaseFilter::DateRange(DateRange { start, end })),
            _ => None,
        }
    }

    pub fn spectrum_filters(&self) -> Vec<CaseFilter> {
        let mut filters = Vec::new();
        if let Some(quartile) = &self.quartile {
            filters.push(CaseFilter::Quartile(quartile.clone()));
        }
        if let Some(params) = &self.cluster {
            filters.push(CaseFilter::Clustering(*params));
        }
        filters
    }

    /// Snapshot holding exactly the given filters, without history rules.
    pub fn snapshot(&self) -> Snapshot {
        let global: Vec<CaseFilter> = [self.exclusive(), self.manual(), self.date_range()]
            .into_iter()
            .flatten()
            .collect();
        let spectrum = self.spectrum_filters();

        let snapshot = Snapshot::default().with_scope(Scope::Global, global);
        if spectrum.is_empty() {
            snapshot
        } else {
            snapshot.with_scope(Scope::Spectrum(self.spectrum), spectrum)
        }
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| format!("invalid date '{value}': {err}"))
}

fn parse_segment(value: &str) -> Result<SegmentRange, String> {
    match value.split_once(':') {
        Some((start, end)) if !start.is_empty() && !end.is_empty() => Ok(SegmentRange {
            start_activity: start.to_string(),
            end_activity: end.to_string(),
        }),
        _ => Err(format!("expected START:END, got '{value}'")),
    }
}

fn parse_quartile(value: &str) -> Result<QuartileSelection, String> {
    let key: f64 = value
        .parse()
        .map_err(|_| format!("invalid quartile '{value}'"))?;
    QuartileSelection::presets()
        .into_iter()
        .find(|preset| preset.key == key)
        .ok_or_else(|| format!("quartile must be one of 0.25, 0.5, 0.75, 1 (got {value})"))
}

fn parse_clustering(value: &str) -> Result<ClusteringParams, String> {
    let mut parts = value.splitn(3, ':');
    let (Some(batch_type), Some(epsilon), Some(min_samples)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected TYPE:EPSILON:MIN_SAMPLES, got '{value}'"));
    };

    let batch_type = BatchType::from_key(batch_type)
        .ok_or_else(|| format!("batch type must be start, end or both (got '{batch_type}')"))?;
    let epsilon: f64 = epsilon
        .parse()
        .map_err(|_| format!("invalid epsilon '{epsilon}'"))?;
    let min_samples: u32 = min_samples
        .parse()
        .map_err(|_| format!("invalid min samples '{min_samples}'"))?;

    Ok(ClusteringParams {
        batch_type,
        epsilon,
        min_samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use spectrum_core::FilterKind;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        filters: FilterArgs,
    }

    fn parse(args: &[&str]) -> Result<FilterArgs, clap::Error> {
        Harness::try_parse_from(std::iter::once("test").chain(args.iter().copied()))
            .map(|h| h.filters)
    }

    #[test]
    fn parses_every_filter_flag() {
        let args = parse(&[
            "--cases",
            "a,b",
            "--from",
            "2024-01-01",
            "--to",
            "2024-02-01",
            "--variant",
            "A,B,C",
            "--quartile",
            "0.75",
            "--cluster",
            "both:2.5:4",
            "--spectrum",
            "1",
        ])
        .expect("parse");

        assert_eq!(args.cases, vec!["a", "b"]);
        assert_eq!(args.variant, vec!["A", "B", "C"]);
        assert_eq!(args.quartile.as_ref().map(|q| q.key), Some(0.75));
        assert_eq!(
            args.cluster,
            Some(ClusteringParams {
                batch_type: BatchType::Both,
                epsilon: 2.5,
                min_samples: 4,
            })
        );

        let snapshot = args.snapshot();
        let kinds: Vec<FilterKind> = snapshot
            .filters(Scope::Global)
            .iter()
            .map(CaseFilter::kind)
            .collect();
        assert_eq!(
            kinds,
            vec![FilterKind::Variant, FilterKind::Manual, FilterKind::DateRange]
        );
        assert_eq!(snapshot.filters(Scope::Spectrum(1)).len(), 2);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(parse(&["--segment", "A"]).is_err());
        assert!(parse(&["--cluster", "sideways:1:1"]).is_err());
        assert!(parse(&["--cluster", "start:1"]).is_err());
        assert!(parse(&["--quartile", "0.3"]).is_err());
        assert!(parse(&["--from", "01.01.2024", "--to", "2024-01-02"]).is_err());
        // A date range needs both ends.
        assert!(parse(&["--from", "2024-01-01"]).is_err());
    }

    #[test]
    fn segment_and_variant_are_mutually_exclusive() {
        assert!(parse(&["--segment", "A:B", "--variant", "A,B"]).is_err());
        let args = parse(&["--segment", "Create:Close"]).expect("parse");
        assert_eq!(
            args.exclusive(),
            Some(CaseFilter::Segment(SegmentRange {
                start_activity: "Create".into(),
                end_activity: "Close".into(),
            }))
        );
    }

    #[test]
    fn no_flags_give_empty_snapshot() {
        let args = parse(&[]).expect("parse");
        assert!(args.snapshot().filters(Scope::Global).is_empty());
        assert!(args.spectrum_filters().is_empty());
    }
}
