//! Raw delimited-text feeds
//!
//! Header-first, comma separated, double quotes around fields that contain commas. Parsing is
//! done with the `csv` crate so a quoted comma is never treated as a delimiter. Rows are read
//! one at a time; a row that cannot be decoded is skipped and counted, never fatal.

use csv::{ReaderBuilder, StringRecord};
use thiserror::Error;
use ctrack_common::{time, Location, UnifiedRecord};
use tracing::debug;

use super::tracking_api::positive_test_rate;
use super::{AdapterOutput, Scope};

/// Split one delimited line into fields, honouring double quotes
///
/// `"2021-01-01","New York, Inc.",1000` yields three fields. Quotes are removed from the
/// returned values.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(Ok(record)) => record.iter().map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

/// Header-indexed reader over a delimited payload
pub struct DelimitedTable<'a> {
    headers: StringRecord,
    reader: csv::Reader<&'a [u8]>,
}

impl<'a> DelimitedTable<'a> {
    /// Read the header line of a payload
    pub fn open(payload: &'a str) -> Self {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(payload.as_bytes());
        let headers = reader.headers().cloned().unwrap_or_default();
        Self { headers, reader }
    }

    /// Index of a column by exact header name
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Remaining rows; `None` marks a row that could not be decoded
    pub fn rows(self) -> impl Iterator<Item = Option<StringRecord>> + 'a {
        self.reader.into_records().map(|row| match row {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(error = %e, "Undecodable delimited row");
                None
            }
        })
    }
}

/// Optional field of a row: missing column, missing cell and empty cell all read as `None`
pub fn field<'r>(row: &'r StringRecord, index: Option<usize>) -> Option<&'r str> {
    index
        .and_then(|i| row.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// A present field that is not a usable number
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid number: {0}")]
pub struct InvalidNumber(pub String);

/// Parse an optional numeric field
///
/// Absent stays absent. A present value that is non-numeric, `NaN` or infinite is an error
/// so the caller can drop the row.
pub fn parse_number(value: Option<&str>) -> Result<Option<f64>, InvalidNumber> {
    value
        .map(|v| match v.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(n),
            _ => Err(InvalidNumber(v.to_string())),
        })
        .transpose()
}

/// Parse an optional count, rounding to the nearest integer
///
/// Values outside the `i64` range are errors.
pub fn parse_count(value: Option<&str>) -> Result<Option<i64>, InvalidNumber> {
    let Some(n) = parse_number(value)? else {
        return Ok(None);
    };

    let rounded = n.round();
    // 2^63 is exactly representable; i64::MAX is not
    if rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
        Ok(Some(rounded as i64))
    } else {
        Err(InvalidNumber(value.unwrap_or_default().to_string()))
    }
}

/// Fallback adapter for daily case feeds published as delimited text
///
/// Expected columns (by header name): `date`, `state`, `positiveIncrease`, `positive`,
/// `hospitalizedCurrently`, `totalTestResultsIncrease`. Columns other than `date` may be
/// missing; their values are then absent.
pub fn adapt_delimited(payload: &str, scope: Scope) -> AdapterOutput {
    let table = DelimitedTable::open(payload);

    let Some(date_idx) = table.column("date") else {
        debug!("Delimited feed has no date column; nothing to adapt");
        return AdapterOutput::default();
    };
    let state_idx = table.column("state");
    let new_positive_idx = table.column("positiveIncrease");
    let total_positive_idx = table.column("positive");
    let hospitalized_idx = table.column("hospitalizedCurrently");
    let tests_idx = table.column("totalTestResultsIncrease");

    let mut output = AdapterOutput::default();

    for row in table.rows() {
        let Some(row) = row else {
            output.dropped += 1;
            continue;
        };

        let date = field(&row, Some(date_idx)).and_then(time::parse_compact_date);
        let location = match scope {
            Scope::Country => Some(Location::COUNTRY),
            Scope::Regional => field(&row, state_idx).and_then(Location::from_code),
        };

        let (Some(date), Some(location)) = (date, location) else {
            output.dropped += 1;
            continue;
        };

        let counts = (|| {
            Ok::<_, InvalidNumber>((
                parse_count(field(&row, new_positive_idx))?,
                parse_count(field(&row, total_positive_idx))?,
                parse_count(field(&row, hospitalized_idx))?,
                parse_count(field(&row, tests_idx))?,
            ))
        })();

        let Ok((new_positive, total_positive, hospitalized, tests)) = counts else {
            output.dropped += 1;
            continue;
        };

        let mut record = UnifiedRecord::new(date, location);
        record.new_positive_tests = new_positive;
        record.total_positive_tests = total_positive;
        record.current_hospitalizations = hospitalized;
        record.positive_test_rate = positive_test_rate(new_positive, tests);
        output.records.push(record);
    }

    output
}
