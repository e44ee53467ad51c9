//! Configuration loading and root folder resolution
//!
//! Missing or unreadable configuration never stops startup: the TOML file is optional and
//! every field has a compiled default.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "CTRACK_ROOT_FOLDER";

/// Environment variable pointing at an explicit TOML config file
pub const CONFIG_FILE_ENV: &str = "CTRACK_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "ctrack.db";

const DEFAULT_STATE_DAILY_URL: &str = "https://api.covidtracking.com/v1/states/daily.json";
const DEFAULT_COUNTRY_DAILY_URL: &str = "https://api.covidtracking.com/v1/us/daily.json";
const DEFAULT_COUNTRY_VACCINATIONS_URL: &str = "https://raw.githubusercontent.com/owid/covid-19-data/master/public/data/vaccinations/country_data/United%20States.csv";
const DEFAULT_STATE_VACCINATIONS_URL: &str = "https://raw.githubusercontent.com/owid/covid-19-data/master/public/data/vaccinations/us_state_vaccinations.csv";

/// Contents of `ctrack.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub refresh: RefreshConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5780".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Refresh at startup when the last successful refresh is older than this
    pub on_startup_if_older_than_hours: u64,
    /// Periodic refresh; no background refresh when absent
    pub interval_minutes: Option<u64>,
    pub http_timeout_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            on_startup_if_older_than_hours: 24,
            interval_minutes: None,
            http_timeout_secs: 30,
        }
    }
}

/// Payload shape of the daily case feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseFeedFormat {
    /// Structured JSON API (list of typed records)
    Json,
    /// Raw delimited text, used when no structured API is available
    Csv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub state_daily_url: String,
    pub country_daily_url: String,
    pub country_vaccinations_url: String,
    pub state_vaccinations_url: String,
    pub base_format: BaseFeedFormat,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            state_daily_url: DEFAULT_STATE_DAILY_URL.to_string(),
            country_daily_url: DEFAULT_COUNTRY_DAILY_URL.to_string(),
            country_vaccinations_url: DEFAULT_COUNTRY_VACCINATIONS_URL.to_string(),
            state_vaccinations_url: DEFAULT_STATE_VACCINATIONS_URL.to_string(),
            base_format: BaseFeedFormat::Json,
        }
    }
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Read and parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }
}

/// Load configuration following this priority:
/// 1. Explicit path (command line)
/// 2. `CTRACK_CONFIG` environment variable
/// 3. Platform config file (`~/.config/ctrack/ctrack.toml`, `/etc/ctrack/ctrack.toml`)
///
/// Falls back to defaults with a warning when nothing usable is found.
pub fn load_config(explicit_path: Option<&Path>) -> TomlConfig {
    let candidate = explicit_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from))
        .or_else(find_config_file);

    match candidate {
        Some(path) => match TomlConfig::from_file(&path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{}; using default configuration", e);
                TomlConfig::default()
            }
        },
        None => {
            warn!("No config file found; using default configuration");
            TomlConfig::default()
        }
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Database path inside a root folder, creating the folder when missing
pub fn prepare_root_folder(root_folder: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root_folder)?;
    Ok(root_folder.join(DATABASE_FILE_NAME))
}

fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("ctrack").join("ctrack.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/ctrack/ctrack.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ctrack"))
        .unwrap_or_else(|| PathBuf::from("./ctrack_data"))
}
