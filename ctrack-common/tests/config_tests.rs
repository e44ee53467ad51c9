//! Configuration loading and root folder resolution
//!
//! Tests that touch CTRACK_* environment variables are marked #[serial] so they never run
//! in parallel with each other.

use ctrack_common::config::{
    load_config, prepare_root_folder, resolve_root_folder, BaseFeedFormat, TomlConfig,
    CONFIG_FILE_ENV, DATABASE_FILE_NAME, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
#[serial]
fn test_env_root_folder_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };
    let resolved = resolve_root_folder(None, &config);

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_toml_root_folder_used_without_env() {
    env::remove_var(ROOT_FOLDER_ENV);

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };
    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_default_root_folder_is_not_empty() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolved = resolve_root_folder(None, &TomlConfig::default());
    assert!(!resolved.as_os_str().is_empty());
    assert!(resolved.to_string_lossy().contains("ctrack"));
}

#[test]
#[serial]
fn test_load_config_from_explicit_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ctrack.toml");
    std::fs::write(
        &path,
        r#"
        root_folder = "/data/ctrack"

        [server]
        bind = "0.0.0.0:9000"

        [sources]
        base_format = "csv"
        "#,
    )
    .unwrap();

    let config = load_config(Some(&path));
    assert_eq!(config.root_folder, Some(PathBuf::from("/data/ctrack")));
    assert_eq!(config.server.bind, "0.0.0.0:9000");
    assert_eq!(config.sources.base_format, BaseFeedFormat::Csv);
}

#[test]
#[serial]
fn test_load_config_from_env_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("other.toml");
    std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

    env::set_var(CONFIG_FILE_ENV, &path);
    let config = load_config(None);
    env::remove_var(CONFIG_FILE_ENV);

    assert_eq!(config.logging.level, "debug");
}

#[test]
#[serial]
fn test_unreadable_config_falls_back_to_defaults() {
    let config = load_config(Some(Path::new("/definitely/not/here/ctrack.toml")));
    assert_eq!(config.server.bind, "127.0.0.1:5780");
    assert_eq!(config.refresh.http_timeout_secs, 30);
}

#[test]
#[serial]
fn test_malformed_config_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[server\nbind = ").unwrap();

    let config = load_config(Some(&path));
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_prepare_root_folder_creates_directory() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("nested").join("root");

    let db_path = prepare_root_folder(&root).unwrap();
    assert!(root.is_dir());
    assert_eq!(db_path, root.join(DATABASE_FILE_NAME));
}

#[tokio::test]
async fn test_init_database_creates_file() {
    let dir = TempDir::new().unwrap();
    let db_path = prepare_root_folder(dir.path()).unwrap();

    let pool = ctrack_common::db::init_database(&db_path).await.unwrap();
    assert!(db_path.exists());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM unified_records")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}
