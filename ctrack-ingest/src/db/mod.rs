//! Database access for ctrack-ingest

pub mod records;
pub mod settings;

pub use records::{RecordStore, SqliteRecordStore};
