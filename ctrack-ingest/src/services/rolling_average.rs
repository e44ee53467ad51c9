//! Rolling Average Engine
//!
//! Annotates unified records with two trailing averages, computed per location over the
//! location's records sorted by date (stable, so equal dates keep their input order):
//!
//! - **Positive test rate:** fixed 7-record window `[i-6, i]`. Absent rates are dropped and
//!   the mean is taken over the rates that are present. Absent for `i < 6` or when the whole
//!   window is absent.
//! - **New vaccinations:** window of `min(days_since_start, 6) + 1` records, where day 0 is
//!   the first day of the vaccination campaign. Absent before the campaign or when the series
//!   is shorter than the window. The country series counts an absent value as 0 (its feed
//!   reports real zeros); state series drop absent values from both sum and count (their
//!   early data is genuinely sparse), and the mean is absent if nothing is left.
//!
//! Output has the same order as the input.

use chrono::NaiveDate;
use ctrack_common::{time, Location, UnifiedRecord};
use std::collections::HashMap;
use tracing::debug;

/// Records in the positive test rate window (current one included)
pub const POSITIVE_RATE_WINDOW: usize = 7;

/// Longest vaccination look-back in records (window is one longer)
pub const MAX_VACCINATION_LOOKBACK: i64 = 6;

/// Annotate records using the standard vaccination campaign start date
pub fn calculate_trailing_averages(records: Vec<UnifiedRecord>) -> Vec<UnifiedRecord> {
    calculate_trailing_averages_from(records, time::vaccination_campaign_start())
}

/// Annotate records, anchoring the vaccination window at `campaign_start`
pub fn calculate_trailing_averages_from(
    records: Vec<UnifiedRecord>,
    campaign_start: NaiveDate,
) -> Vec<UnifiedRecord> {
    let mut groups: HashMap<Location, Vec<usize>> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        groups.entry(record.location).or_default().push(index);
    }

    let mut averages: Vec<(Option<f64>, Option<f64>)> = vec![(None, None); records.len()];

    for (location, mut indices) in groups {
        indices.sort_by_key(|&i| records[i].date);
        let series: Vec<&UnifiedRecord> = indices.iter().map(|&i| &records[i]).collect();

        for (position, &original_index) in indices.iter().enumerate() {
            averages[original_index] = (
                positive_rate_average(&series, position),
                vaccination_average(&series, position, campaign_start),
            );
        }

        debug!(location = %location, records = series.len(), "Computed trailing averages");
    }

    records
        .into_iter()
        .zip(averages)
        .map(|(record, (rate_avg, vaccination_avg))| {
            record.with_trailing_averages(rate_avg, vaccination_avg)
        })
        .collect()
}

/// Mean of present positive test rates over `[i-6, i]`
fn positive_rate_average(series: &[&UnifiedRecord], i: usize) -> Option<f64> {
    let lookback = POSITIVE_RATE_WINDOW - 1;
    if i < lookback {
        return None;
    }

    mean(series[i - lookback..=i].iter().filter_map(|r| r.positive_test_rate))
}

/// Mean of new vaccinations over the campaign-clamped window ending at `i`
fn vaccination_average(
    series: &[&UnifiedRecord],
    i: usize,
    campaign_start: NaiveDate,
) -> Option<f64> {
    let days_since_start = time::days_between(campaign_start, series[i].date);
    if days_since_start < 0 {
        return None;
    }

    let lookback = days_since_start.min(MAX_VACCINATION_LOOKBACK) as usize;
    if i < lookback {
        return None;
    }

    let window = &series[i - lookback..=i];

    if series[i].location.is_country() {
        mean(
            window
                .iter()
                .map(|r| r.new_people_vaccinated.unwrap_or(0) as f64),
        )
    } else {
        mean(
            window
                .iter()
                .filter_map(|r| r.new_people_vaccinated)
                .map(|v| v as f64),
        )
    }
}

/// Arithmetic mean; `None` for an empty sequence
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
