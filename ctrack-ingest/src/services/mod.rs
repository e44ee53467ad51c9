//! Core services for ctrack-ingest

pub mod reconciliation;
pub mod rolling_average;
pub mod vaccination_merger;

pub use reconciliation::{build_dataset, ReconcileError, Reconciler, RefreshReport};
pub use rolling_average::calculate_trailing_averages;
pub use vaccination_merger::{add_vaccinations, merge_vaccinations, MergeOutcome};
