//! HTTP API handlers for ctrack-ingest
//!
//! Read access to the stored dataset plus a manual refresh trigger.

pub mod health;
pub mod records;
pub mod refresh;

pub use health::health_routes;
pub use records::record_routes;
pub use refresh::refresh_routes;
