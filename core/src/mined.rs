//! Mined configuration data as returned by the backend.
//!
//! Only the parts the engine reads are typed; statistics, metadata and the
//! per-record columns are carried through untouched.

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::de::Error as _;
use serde_json::Map;
use serde_json::Value;

use crate::filters::CaseId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinedData {
    #[serde(default)]
    pub spectra: Vec<MinedSpectrum>,
    #[serde(default)]
    pub event_log: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinedSpectrum {
    #[serde(default)]
    pub records: Vec<SpectrumRecord>,
    #[serde(default)]
    pub empty: bool,
    #[serde(default)]
    pub statistics: Value,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumRecord {
    #[serde(rename = "case_ID", deserialize_with = "case_id_from_json")]
    pub case_id: CaseId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Case ids arrive as strings or numbers depending on the source log.
fn case_id_from_json<'de, D>(deserializer: D) -> Result<CaseId, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(D::Error::custom(format!("unsupported case id: {other}"))),
    }
}

impl MinedData {
    /// Distinct case ids of one spectrum, in record order.
    ///
    /// Every spectrum of a variant covers the same cases, so any index gives
    /// the cases currently visible to the user.
    pub fn cases_of_spectrum(&self, spectrum: usize) -> Vec<CaseId> {
        let Some(spectrum) = self.spectra.get(spectrum) else {
            return Vec::new();
        };
        let mut seen = std::collections::HashSet::new();
        spectrum
            .records
            .iter()
            .filter(|record| seen.insert(record.case_id.as_str()))
            .map(|record| record.case_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_backend_response_and_dedups_cases() {
        let data: MinedData = serde_json::from_value(json!({
            "spectra": [{
                "records": [
                    {"case_ID": "c1", "duration": 3},
                    {"case_ID": 2, "duration": 4},
                    {"case_ID": "c1", "duration": 5}
                ],
                "empty": false,
                "statistics": {"count": 3},
                "metadata": {}
            }],
            "event_log": {"id": 1}
        }))
        .expect("deserialize");

        assert_eq!(data.cases_of_spectrum(0), vec!["c1".to_string(), "2".to_string()]);
        assert_eq!(data.spectra[0].records[0].fields["duration"], json!(3));
        assert!(data.cases_of_spectrum(4).is_empty());
    }

    #[test]
    fn rejects_non_scalar_case_ids() {
        let result: Result<MinedData, _> = serde_json::from_value(json!({
            "spectra": [{"records": [{"case_ID": [1]}]}]
        }));
        assert!(result.is_err());
    }
}
