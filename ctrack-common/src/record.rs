//! Unified per-location, per-day records
//!
//! A `UnifiedRecord` is built fresh on every reconciliation cycle. Each stage of the pipeline
//! takes records by value and hands back new ones with more fields populated; the derived
//! averages are always computed from the raw fields.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::location::Location;

/// One observation for one location on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedRecord {
    pub date: NaiveDate,
    pub location: Location,
    pub new_positive_tests: Option<i64>,
    pub total_positive_tests: Option<i64>,
    pub current_hospitalizations: Option<i64>,
    /// Share of tests that came back positive (0.0-1.0)
    pub positive_test_rate: Option<f64>,
    /// Cumulative people with at least one dose
    pub total_people_vaccinated: Option<i64>,
    /// Day-over-day change in `total_people_vaccinated`
    pub new_people_vaccinated: Option<i64>,
    /// 7-day trailing mean of `positive_test_rate`
    pub positive_test_rate_trailing_avg: Option<f64>,
    /// Trailing mean of `new_people_vaccinated` (window shortened near campaign start)
    pub new_vaccinations_trailing_avg: Option<f64>,
}

impl UnifiedRecord {
    /// Create an empty record for a location and date
    pub fn new(date: NaiveDate, location: Location) -> Self {
        Self {
            date,
            location,
            new_positive_tests: None,
            total_positive_tests: None,
            current_hospitalizations: None,
            positive_test_rate: None,
            total_people_vaccinated: None,
            new_people_vaccinated: None,
            positive_test_rate_trailing_avg: None,
            new_vaccinations_trailing_avg: None,
        }
    }

    /// Copy of this record with vaccination counts taken from a feed point
    pub fn with_vaccinations(self, point: &VaccinationPoint) -> Self {
        Self {
            total_people_vaccinated: point.total_people_vaccinated,
            new_people_vaccinated: Some(point.new_people_vaccinated),
            ..self
        }
    }

    /// Copy of this record with both trailing averages set
    pub fn with_trailing_averages(
        self,
        positive_test_rate_trailing_avg: Option<f64>,
        new_vaccinations_trailing_avg: Option<f64>,
    ) -> Self {
        Self {
            positive_test_rate_trailing_avg,
            new_vaccinations_trailing_avg,
            ..self
        }
    }

    /// Join key
    pub fn key(&self) -> (NaiveDate, Location) {
        (self.date, self.location)
    }
}

/// Cumulative vaccination count read from a raw vaccination feed
///
/// Lives only for the duration of a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct VaccinationPoint {
    pub date: NaiveDate,
    pub location: Location,
    pub total_people_vaccinated: Option<i64>,
    /// Delta against the previous point for the same location; 0 when the total is absent
    pub new_people_vaccinated: i64,
}
