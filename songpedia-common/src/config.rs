//! Configuration loading and data directory resolution
//!
//! Priority order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit TOML config file
pub const CONFIG_ENV_VAR: &str = "SONGPEDIA_CONFIG";
/// Environment variable overriding the data directory
pub const DATA_DIR_ENV_VAR: &str = "SONGPEDIA_DATA_DIR";
/// Environment variable holding the catalog client id
pub const CATALOG_CLIENT_ID_ENV_VAR: &str = "SONGPEDIA_CATALOG_CLIENT_ID";
/// Environment variable holding the catalog client secret
pub const CATALOG_CLIENT_SECRET_ENV_VAR: &str = "SONGPEDIA_CATALOG_CLIENT_SECRET";

/// Top-level TOML configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Directory holding shards, checkpoints and the article database
    pub data_dir: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub catalog: CatalogConfig,
    pub encyclopedia: EncyclopediaConfig,
    pub crawl: CrawlConfig,
}

/// Logging section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing level when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Music catalog service section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub base_url: String,
    pub token_url: String,
    pub requests_per_second: u32,
    /// Retries of a transient failure before the crawl is aborted
    pub max_retries: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            base_url: "https://api.spotify.com/v1".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            requests_per_second: 5,
            max_retries: 3,
        }
    }
}

/// Encyclopedia service section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncyclopediaConfig {
    pub base_url: String,
    pub user_agent: String,
    pub requests_per_second: u32,
    /// Fall back to the top search hit when the exact title has no page
    pub auto_suggest: bool,
}

impl Default for EncyclopediaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://en.wikipedia.org/w/api.php".to_string(),
            user_agent: get_user_agent(),
            requests_per_second: 10,
            auto_suggest: true,
        }
    }
}

/// Crawl section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Queries per shard before the crawler rotates to the next shard
    pub shard_size: usize,
    /// Tracks requested per catalog page
    pub page_limit: usize,
    /// Highest offset the catalog service accepts
    pub max_offset: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            shard_size: 100,
            page_limit: 50,
            max_offset: 1000,
        }
    }
}

/// Catalog client credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Standard User-Agent for outgoing HTTP requests
pub fn get_user_agent() -> String {
    format!(
        "songpedia/{} (https://github.com/songpedia/songpedia)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Load the TOML configuration
///
/// `cli_path` wins over `$SONGPEDIA_CONFIG`, which wins over the platform
/// default. A missing file yields defaults with a warning; a file that exists
/// but does not parse is a configuration error.
pub fn load_toml_config(cli_path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = resolve_config_path(cli_path) else {
        warn!("Could not determine config directory, using defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!("Config file {} not found, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Write a TOML configuration atomically
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    crate::fs::write_atomic(path, content.as_bytes())
}

/// Config file location: CLI > `$SONGPEDIA_CONFIG` > platform default
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) if is_valid_value(&path) => Some(PathBuf::from(path)),
        _ => default_config_path(),
    }
}

/// Platform default config file path (`<config_dir>/songpedia/songpedia.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("songpedia").join("songpedia.toml"))
}

/// Resolve the data directory: CLI > ENV > TOML > platform default
pub fn resolve_data_dir(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_DIR_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.data_dir {
        return path.clone();
    }

    default_data_dir()
}

/// OS-dependent default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("songpedia"))
        .unwrap_or_else(|| PathBuf::from("./songpedia_data"))
}

/// Create the data directory if missing
pub fn ensure_data_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        info!("Created data directory: {}", path.display());
    }
    Ok(())
}

/// Resolve catalog credentials
///
/// **Priority:** ENV → TOML. Both halves must come from the same tier.
pub fn resolve_catalog_credentials(toml_config: &TomlConfig) -> Result<CatalogCredentials> {
    let env_id = std::env::var(CATALOG_CLIENT_ID_ENV_VAR).ok();
    let env_secret = std::env::var(CATALOG_CLIENT_SECRET_ENV_VAR).ok();
    let env_creds = pair(env_id.as_deref(), env_secret.as_deref());

    let toml_creds = pair(
        toml_config.catalog.client_id.as_deref(),
        toml_config.catalog.client_secret.as_deref(),
    );

    if env_creds.is_some() && toml_creds.is_some() {
        warn!("Catalog credentials found in environment and TOML. Using environment.");
    }

    if let Some(creds) = env_creds {
        info!("Catalog credentials loaded from environment");
        return Ok(creds);
    }

    if let Some(creds) = toml_creds {
        info!("Catalog credentials loaded from TOML config");
        return Ok(creds);
    }

    Err(Error::Config(format!(
        "Catalog credentials not configured. Set {} and {}, \
         or client_id / client_secret under [catalog] in the TOML config",
        CATALOG_CLIENT_ID_ENV_VAR, CATALOG_CLIENT_SECRET_ENV_VAR
    )))
}

fn pair(id: Option<&str>, secret: Option<&str>) -> Option<CatalogCredentials> {
    match (id, secret) {
        (Some(id), Some(secret)) if is_valid_value(id) && is_valid_value(secret) => {
            Some(CatalogCredentials {
                client_id: id.trim().to_string(),
                client_secret: secret.trim().to_string(),
            })
        }
        _ => None,
    }
}

/// Non-empty, non-whitespace
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}
