//! Tracing setup for the ctrack-ingest binary
//!
//! The subscriber is installed before the config file is read so that config loading can log.
//! The `[logging] level` from the config is applied afterwards through a reload handle, unless
//! `RUST_LOG` is set, in which case it wins.

use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Level used until the config has been loaded
pub const BOOTSTRAP_LEVEL: &str = "info";

pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Filter directives for a configured level
pub fn directives(level: &str) -> String {
    format!("ctrack_ingest={0},ctrack_common={0},tower_http=info", level)
}

pub fn filter_for_level(level: &str) -> EnvFilter {
    EnvFilter::new(directives(level))
}

/// Install the global subscriber
///
/// Returns a handle for applying the configured level, or `None` when `RUST_LOG` governs.
pub fn init() -> Option<FilterHandle> {
    let from_env = EnvFilter::try_from_default_env().ok();
    let governed_by_env = from_env.is_some();

    let (filter, handle) =
        reload::Layer::new(from_env.unwrap_or_else(|| filter_for_level(BOOTSTRAP_LEVEL)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    (!governed_by_env).then_some(handle)
}

/// Switch the active filter to the configured level
pub fn apply_level(handle: &FilterHandle, level: &str) -> Result<(), reload::Error> {
    handle.reload(filter_for_level(level))
}
