//! Configuration resolution tests
//!
//! Covers:
//! - Missing TOML files fall back to defaults
//! - Malformed TOML files are configuration errors
//! - Data directory priority CLI > ENV > TOML > default
//! - Catalog credentials priority ENV > TOML
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.

use serial_test::serial;
use songpedia_common::config::{
    load_toml_config, resolve_catalog_credentials, resolve_data_dir, write_toml_config,
    CatalogCredentials, TomlConfig, CATALOG_CLIENT_ID_ENV_VAR, CATALOG_CLIENT_SECRET_ENV_VAR,
    DATA_DIR_ENV_VAR,
};
use songpedia_common::Error;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn clear_env() {
    env::remove_var(DATA_DIR_ENV_VAR);
    env::remove_var(CATALOG_CLIENT_ID_ENV_VAR);
    env::remove_var(CATALOG_CLIENT_SECRET_ENV_VAR);
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.toml");

    let config = load_toml_config(Some(&missing)).unwrap();
    assert_eq!(config.crawl.shard_size, 100);
    assert!(config.data_dir.is_none());
}

#[test]
fn test_malformed_config_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[crawl\nshard_size = ").unwrap();

    let result = load_toml_config(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_write_then_load_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("songpedia.toml");

    let mut config = TomlConfig::default();
    config.data_dir = Some(PathBuf::from("/srv/songpedia"));
    config.crawl.shard_size = 25;
    write_toml_config(&config, &path).unwrap();

    let loaded = load_toml_config(Some(&path)).unwrap();
    assert_eq!(loaded.data_dir, Some(PathBuf::from("/srv/songpedia")));
    assert_eq!(loaded.crawl.shard_size, 25);
}

#[test]
#[serial]
fn test_data_dir_cli_wins() {
    clear_env();
    env::set_var(DATA_DIR_ENV_VAR, "/from/env");
    let mut config = TomlConfig::default();
    config.data_dir = Some(PathBuf::from("/from/toml"));

    let resolved = resolve_data_dir(Some(Path::new("/from/cli")), &config);
    assert_eq!(resolved, PathBuf::from("/from/cli"));
    clear_env();
}

#[test]
#[serial]
fn test_data_dir_env_beats_toml() {
    clear_env();
    env::set_var(DATA_DIR_ENV_VAR, "/from/env");
    let mut config = TomlConfig::default();
    config.data_dir = Some(PathBuf::from("/from/toml"));

    assert_eq!(resolve_data_dir(None, &config), PathBuf::from("/from/env"));
    clear_env();
}

#[test]
#[serial]
fn test_data_dir_toml_then_default() {
    clear_env();
    let mut config = TomlConfig::default();
    config.data_dir = Some(PathBuf::from("/from/toml"));
    assert_eq!(resolve_data_dir(None, &config), PathBuf::from("/from/toml"));

    let default = resolve_data_dir(None, &TomlConfig::default());
    assert!(default.to_string_lossy().contains("songpedia"));
}

#[test]
#[serial]
fn test_credentials_env_priority() {
    clear_env();
    env::set_var(CATALOG_CLIENT_ID_ENV_VAR, "env-id");
    env::set_var(CATALOG_CLIENT_SECRET_ENV_VAR, "env-secret");
    let mut config = TomlConfig::default();
    config.catalog.client_id = Some("toml-id".to_string());
    config.catalog.client_secret = Some("toml-secret".to_string());

    let creds = resolve_catalog_credentials(&config).unwrap();
    assert_eq!(
        creds,
        CatalogCredentials {
            client_id: "env-id".to_string(),
            client_secret: "env-secret".to_string(),
        }
    );
    clear_env();
}

#[test]
#[serial]
fn test_credentials_half_env_falls_back_to_toml() {
    clear_env();
    env::set_var(CATALOG_CLIENT_ID_ENV_VAR, "env-id");
    let mut config = TomlConfig::default();
    config.catalog.client_id = Some("toml-id".to_string());
    config.catalog.client_secret = Some("toml-secret".to_string());

    let creds = resolve_catalog_credentials(&config).unwrap();
    assert_eq!(creds.client_id, "toml-id");
    clear_env();
}

#[test]
#[serial]
fn test_missing_credentials_is_config_error() {
    clear_env();
    let mut config = TomlConfig::default();
    config.catalog.client_id = Some("   ".to_string());
    config.catalog.client_secret = Some("secret".to_string());

    let result = resolve_catalog_credentials(&config);
    assert!(matches!(result, Err(Error::Config(_))));
}
