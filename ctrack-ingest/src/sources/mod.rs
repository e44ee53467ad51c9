//! Source feeds and adapters
//!
//! Four feeds make up one reconciliation cycle: daily case data for the states and for the
//! country (structured API, or delimited text as a fallback) and cumulative vaccination
//! counts for the country and for the states (always delimited text).
//!
//! Adapters turn a fetched payload into `UnifiedRecord`s with the raw fields populated. They
//! never aggregate and never look across records; a record that cannot be read is dropped and
//! counted.

pub mod delimited;
pub mod http;
pub mod tracking_api;

use async_trait::async_trait;
use ctrack_common::config::BaseFeedFormat;
use ctrack_common::UnifiedRecord;
use std::fmt;
use thiserror::Error;

pub use delimited::{adapt_delimited, split_fields};
pub use http::HttpFeedSource;
pub use tracking_api::adapt_structured;

/// Whether a feed covers the country aggregate or individual states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Country,
    Regional,
}

/// The feeds fetched by every cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    StateDaily,
    CountryDaily,
    CountryVaccinations,
    StateVaccinations,
}

impl Feed {
    pub const ALL: [Feed; 4] = [
        Feed::StateDaily,
        Feed::CountryDaily,
        Feed::CountryVaccinations,
        Feed::StateVaccinations,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feed::StateDaily => "state_daily",
            Feed::CountryDaily => "country_daily",
            Feed::CountryVaccinations => "country_vaccinations",
            Feed::StateVaccinations => "state_vaccinations",
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Feed::CountryDaily | Feed::CountryVaccinations => Scope::Country,
            Feed::StateDaily | Feed::StateVaccinations => Scope::Regional,
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Feed fetch errors
///
/// Any of these aborts the whole cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Feed not configured: {0}")]
    Unconfigured(String),
}

/// Source of raw feed payloads
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the full body of a feed
    async fn fetch(&self, feed: Feed) -> Result<String, FetchError>;
}

/// Raw bodies of all four feeds of one cycle
#[derive(Debug, Clone)]
pub struct FeedPayloads {
    pub state_daily: String,
    pub country_daily: String,
    pub country_vaccinations: String,
    pub state_vaccinations: String,
}

/// Records produced by an adapter plus the number of inputs it had to drop
#[derive(Debug, Default)]
pub struct AdapterOutput {
    pub records: Vec<UnifiedRecord>,
    pub dropped: usize,
}

/// Adapt a daily case payload in the configured format
///
/// A structured payload that is not a JSON list at all is a fetch-level failure.
pub fn adapt_base(
    payload: &str,
    format: BaseFeedFormat,
    scope: Scope,
) -> Result<AdapterOutput, FetchError> {
    match format {
        BaseFeedFormat::Json => adapt_structured(payload, scope),
        BaseFeedFormat::Csv => Ok(adapt_delimited(payload, scope)),
    }
}
