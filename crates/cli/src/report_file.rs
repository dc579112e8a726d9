//! JSON report files accepted by `spotcheck ingest`.
//!
//! ```json
//! {
//!   "reference_type": "LBDC_DAYBREAK",
//!   "report_date_time": "2025-03-01T10:00:00",
//!   "reference_date_time": "2025-03-01T08:00:00",
//!   "observations": [
//!     { "key": { "print_no": "S1234", "session_year": 2025 },
//!       "observed_date_time": "2025-03-01T09:30:00",
//!       "mismatches": [
//!         { "mismatch_type": "BILL_TITLE", "reference_data": "...", "observed_data": "..." }
//!       ] }
//!   ]
//! }
//! ```
//!
//! A missing or null `observations` means the comparison never ran; an empty
//! list means it ran and found nothing wrong.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Deserialize;

use spotcheck_recon::{
    ContentKey, KeyMap, ReconError, SpotCheckMismatch, SpotCheckObservation, SpotCheckRefType,
    SpotCheckReferenceId, SpotCheckReport,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportFile {
    /// Set when re-running a report that was already recorded.
    #[serde(default)]
    pub id: Option<i64>,
    pub reference_type: SpotCheckRefType,
    pub report_date_time: NaiveDateTime,
    pub reference_date_time: NaiveDateTime,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub observations: Option<Vec<ObservationFile>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObservationFile {
    pub key: BTreeMap<String, serde_json::Value>,
    /// Defaults to the report's own reference.
    #[serde(default)]
    pub reference_id: Option<SpotCheckReferenceId>,
    /// Defaults to the report time.
    #[serde(default)]
    pub observed_date_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub mismatches: Vec<SpotCheckMismatch>,
}

impl ReportFile {
    pub fn parse(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Builds a report over key type `K`. Every key must decode, every
    /// mismatch type must apply to the report's content type, and no key may
    /// appear twice.
    pub fn into_report<K: ContentKey>(self) -> Result<SpotCheckReport<K>, ReconError> {
        let mut report = SpotCheckReport::new(self.reference_type, self.report_date_time, self.reference_date_time);
        report.id = self.id;
        report.notes = self.notes;

        let Some(observations) = self.observations else {
            return Ok(report);
        };
        report.mark_checked();

        let content_type = report.content_type();
        for ob in observations {
            let key = K::from_map(&key_map(&ob.key)?)?;
            if report.observations.as_ref().is_some_and(|obs| obs.contains_key(&key)) {
                return Err(ReconError::InvalidReport(format!("duplicate observation for key {key:?}")));
            }

            let mut observation = SpotCheckObservation::new(
                key,
                ob.reference_id.unwrap_or_else(|| report.reference_id()),
                ob.observed_date_time.unwrap_or(report.report_date_time),
            );
            for mismatch in ob.mismatches {
                if !mismatch.mismatch_type.applies_to(content_type) {
                    return Err(ReconError::InvalidReport(format!(
                        "{} does not apply to {content_type} reports",
                        mismatch.mismatch_type
                    )));
                }
                observation.add_mismatch(mismatch);
            }
            report.add_observation(observation);
        }
        report.check_observed_times()?;
        Ok(report)
    }
}

/// Key maps are string-valued; numbers and booleans are accepted as written.
fn key_map(raw: &BTreeMap<String, serde_json::Value>) -> Result<KeyMap, ReconError> {
    raw.iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(field, value)| {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => {
                    return Err(ReconError::InvalidKey {
                        field: field.clone(),
                        reason: "expected a string or number".into(),
                    })
                }
            };
            Ok((field.clone(), text))
        })
        .collect()
}
