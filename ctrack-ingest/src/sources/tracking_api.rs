//! Structured daily case API
//!
//! The API returns a JSON list of per-date records. The state endpoint tags each record with
//! a two-letter `state` code; the country endpoint has no location field and every record is
//! tagged with the country location.

use ctrack_common::{time, Location, UnifiedRecord};
use serde::Deserialize;
use tracing::debug;

use super::{AdapterOutput, FetchError, Scope};

/// One record as published by the API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRecord {
    /// `YYYYMMDD` as an integer
    pub date: i64,
    pub state: Option<String>,
    pub positive_increase: Option<i64>,
    pub positive: Option<i64>,
    pub hospitalized_currently: Option<i64>,
    pub total_test_results_increase: Option<i64>,
}

impl TrackingRecord {
    /// Map onto a unified record; `None` if the date or location cannot be resolved
    pub fn to_unified(&self, scope: Scope) -> Option<UnifiedRecord> {
        let date = time::parse_compact_date(&self.date.to_string())?;
        let location = match scope {
            Scope::Country => Location::COUNTRY,
            Scope::Regional => Location::from_code(self.state.as_deref()?)?,
        };

        let mut record = UnifiedRecord::new(date, location);
        record.new_positive_tests = self.positive_increase;
        record.total_positive_tests = self.positive;
        record.current_hospitalizations = self.hospitalized_currently;
        record.positive_test_rate =
            positive_test_rate(self.positive_increase, self.total_test_results_increase);
        Some(record)
    }
}

/// New positives over new test results, when that is a valid share
pub fn positive_test_rate(new_positive: Option<i64>, new_tests: Option<i64>) -> Option<f64> {
    match (new_positive, new_tests) {
        (Some(positive), Some(tests)) if tests > 0 => {
            let rate = positive as f64 / tests as f64;
            (0.0..=1.0).contains(&rate).then_some(rate)
        }
        _ => None,
    }
}

/// Adapt a structured API payload
///
/// The payload must be a JSON list. Individual entries that do not decode, or whose date or
/// location cannot be resolved, are dropped.
pub fn adapt_structured(payload: &str, scope: Scope) -> Result<AdapterOutput, FetchError> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(payload).map_err(|e| FetchError::Parse(e.to_string()))?;

    let mut output = AdapterOutput::default();
    output.records.reserve(entries.len());

    for entry in entries {
        let unified = serde_json::from_value::<TrackingRecord>(entry)
            .ok()
            .and_then(|raw| raw.to_unified(scope));

        match unified {
            Some(record) => output.records.push(record),
            None => output.dropped += 1,
        }
    }

    if output.dropped > 0 {
        debug!(dropped = output.dropped, "Dropped unreadable API records");
    }

    Ok(output)
}
