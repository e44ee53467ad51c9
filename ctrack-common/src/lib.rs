//! # ctrack Common Library
//!
//! Shared code for the ctrack services:
//! - Location enumeration and unified record model
//! - Database initialization
//! - Configuration loading
//! - Calendar helpers

pub mod config;
pub mod db;
pub mod error;
pub mod location;
pub mod record;
pub mod time;

pub use error::{Error, Result};
pub use location::Location;
pub use record::{UnifiedRecord, VaccinationPoint};
