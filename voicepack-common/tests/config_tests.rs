//! Configuration loading and root folder resolution
//!
//! Tests touching VOICEPACK_ROOT_FOLDER are marked #[serial] so they never
//! race on the process environment.

use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use voicepack_common::config::{default_root_folder, resolve_root_folder, TomlConfig, ROOT_FOLDER_ENV};
use voicepack_common::db::init_database_pool;

#[test]
#[serial]
fn test_cli_argument_wins_over_everything() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/voicepack-env");

    let root = resolve_root_folder(Some(Path::new("/tmp/voicepack-cli")), Some(Path::new("/tmp/voicepack-toml")));
    assert_eq!(root, PathBuf::from("/tmp/voicepack-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_var_wins_over_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/voicepack-env");

    let root = resolve_root_folder(None, Some(Path::new("/tmp/voicepack-toml")));
    assert_eq!(root, PathBuf::from("/tmp/voicepack-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_then_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root = resolve_root_folder(None, Some(Path::new("/tmp/voicepack-toml")));
    assert_eq!(root, PathBuf::from("/tmp/voicepack-toml"));

    let root = resolve_root_folder(None, None);
    assert_eq!(root, default_root_folder());
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = TomlConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.port, 5780);
}

#[test]
fn test_malformed_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("voicepack.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    assert!(TomlConfig::load(&path).is_err());
}

#[tokio::test]
async fn test_database_pool_creates_file_and_tables() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("voicepack.db");

    let pool = init_database_pool(&db_path).await.unwrap();
    assert!(db_path.exists());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audio_components")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}
