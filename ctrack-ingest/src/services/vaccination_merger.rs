//! Vaccination Merger
//!
//! Reads a raw vaccination time series (delimited text with `date`, `location` and
//! `people_vaccinated` columns), derives daily deltas from the cumulative counts and left-joins
//! them onto unified records by exact (date, location).
//!
//! **Delta rule:** `new = current_total - previous_total`, where the previous total is that
//! of the last point emitted for the same location (0 when there is none, or when that point
//! had no total). A point without a total gets `new = 0`. The feed is assumed sorted by date
//! within each location; unsorted input produces negative deltas and is not corrected.
//!
//! **Malformed lines:** a line with an unparsable date, an unresolvable location, a count that
//! is not a finite number within `i64` range, or a delta that would overflow is skipped and
//! does not affect the deltas of later lines. An empty count is not malformed; it reads as an
//! absent total.

use chrono::NaiveDate;
use ctrack_common::{time, Location, UnifiedRecord, VaccinationPoint};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::sources::delimited::{field, parse_count, DelimitedTable};
use crate::sources::Scope;

pub const DATE_HEADER: &str = "date";
pub const PEOPLE_VACCINATED_HEADER: &str = "people_vaccinated";
pub const LOCATION_HEADER: &str = "location";

/// Result of one merge
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Same length and order as the input records
    pub records: Vec<UnifiedRecord>,
    /// Vaccination points read from the feed
    pub points: usize,
    /// Feed lines skipped as malformed
    pub skipped_lines: usize,
    /// Input records that received vaccination counts
    pub matched: usize,
}

/// Parse the vaccination series of a feed
///
/// Returns `None` when the header has no `date` column.
pub fn parse_vaccination_points(
    payload: &str,
    scope: Scope,
) -> Option<(Vec<VaccinationPoint>, usize)> {
    let table = DelimitedTable::open(payload);

    let date_idx = table.column(DATE_HEADER)?;
    let vaccinated_idx = table.column(PEOPLE_VACCINATED_HEADER);
    let location_idx = table.column(LOCATION_HEADER);

    let mut previous_totals: HashMap<Location, Option<i64>> = HashMap::new();
    let mut points = Vec::new();
    let mut skipped = 0usize;

    for row in table.rows() {
        let Some(row) = row else {
            skipped += 1;
            continue;
        };

        let date = field(&row, Some(date_idx)).and_then(time::parse_feed_date);
        let location = match scope {
            Scope::Country => Some(Location::COUNTRY),
            Scope::Regional => field(&row, location_idx).and_then(Location::from_feed_name),
        };
        let total = parse_count(field(&row, vaccinated_idx));

        let (Some(date), Some(location), Ok(total)) = (date, location, total) else {
            skipped += 1;
            continue;
        };

        let previous = previous_totals.get(&location).copied().flatten().unwrap_or(0);
        let new_people_vaccinated = match total {
            Some(t) => match t.checked_sub(previous) {
                Some(delta) => delta,
                None => {
                    skipped += 1;
                    continue;
                }
            },
            None => 0,
        };
        previous_totals.insert(location, total);

        points.push(VaccinationPoint {
            date,
            location,
            total_people_vaccinated: total,
            new_people_vaccinated,
        });
    }

    Some((points, skipped))
}

/// Left-join a vaccination feed onto unified records
pub fn merge_vaccinations(
    payload: &str,
    records: Vec<UnifiedRecord>,
    scope: Scope,
) -> MergeOutcome {
    let Some((points, skipped_lines)) = parse_vaccination_points(payload, scope) else {
        debug!(?scope, "Vaccination feed has no date column; records left unchanged");
        return MergeOutcome {
            records,
            points: 0,
            skipped_lines: 0,
            matched: 0,
        };
    };

    // First point wins when the feed repeats a (date, location)
    let mut by_key: HashMap<(NaiveDate, Location), &VaccinationPoint> =
        HashMap::with_capacity(points.len());
    for point in &points {
        by_key.entry((point.date, point.location)).or_insert(point);
    }

    let mut matched = 0usize;
    let records: Vec<UnifiedRecord> = records
        .into_iter()
        .map(|record| match by_key.get(&record.key()) {
            Some(point) => {
                matched += 1;
                record.with_vaccinations(point)
            }
            None => record,
        })
        .collect();

    info!(
        ?scope,
        points = points.len(),
        skipped_lines,
        matched,
        "Merged vaccination feed"
    );

    MergeOutcome {
        records,
        points: points.len(),
        skipped_lines,
        matched,
    }
}

/// Left-join a vaccination feed onto unified records, discarding the merge statistics
pub fn add_vaccinations(payload: &str, records: Vec<UnifiedRecord>, scope: Scope) -> Vec<UnifiedRecord> {
    merge_vaccinations(payload, records, scope).records
}
