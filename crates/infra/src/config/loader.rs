//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `SHELFSYNC_DB_PATH` is missing, falls back to loading from file
//! 3. Searches multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! The result is always validated with [`AppConfig::validate`].
//!
//! ## Environment Variables
//! - `SHELFSYNC_DB_PATH` (required): SQLite file path
//! - `SHELFSYNC_DB_POOL_SIZE`: Connection pool size
//! - `SHELFSYNC_TAKEALOT_BASE_URL`, `SHELFSYNC_TAKEALOT_TIMEOUT_SECS`,
//!   `SHELFSYNC_TAKEALOT_PAGE_SIZE`
//! - `SHELFSYNC_PROXY_ENDPOINTS`: Comma-separated proxy URLs
//! - `SHELFSYNC_PROXY_ALLOW_DIRECT`, `SHELFSYNC_PROXY_FAILURE_THRESHOLD`,
//!   `SHELFSYNC_PROXY_COOLDOWN_SECS`, `SHELFSYNC_PROXY_MAX_ATTEMPTS`
//! - `SHELFSYNC_WEBSHARE_API_KEY`, `SHELFSYNC_WEBSHARE_BASE_URL`
//! - `SHELFSYNC_SYNC_DEFAULT_LIMIT`, `SHELFSYNC_SYNC_MAX_LIMIT`,
//!   `SHELFSYNC_SYNC_MAX_CONCURRENT_PAGES`, `SHELFSYNC_SYNC_RUN_DEADLINE_SECS`,
//!   `SHELFSYNC_SYNC_RUN_HISTORY_LIMIT`
//! - `SHELFSYNC_SCHEDULER_ENABLED`, `SHELFSYNC_SYNC_CRON`,
//!   `SHELFSYNC_JOB_TIMEOUT_SECS`
//! - `SHELFSYNC_SERVER_ADDR`, `SHELFSYNC_CRON_SECRET`
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./shelfsync.json` or `./shelfsync.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use shelfsync_domain::{AppConfig, Result, ShelfSyncError, WebshareConfig};

use crate::proxies::parse_proxy_list;

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `ShelfSyncError::Config` if configuration cannot be loaded from
/// either source, the file format is invalid, or validation fails.
pub fn load() -> Result<AppConfig> {
    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)?
        }
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from environment variables
///
/// Only `SHELFSYNC_DB_PATH` is required; every other setting keeps its
/// default when unset.
///
/// # Errors
/// Returns `ShelfSyncError::Config` if the required variable is missing or
/// a set variable has an invalid value.
pub fn load_from_env() -> Result<AppConfig> {
    let mut config = AppConfig::default();

    config.database.path = env_var("SHELFSYNC_DB_PATH")?;
    if let Some(size) = env_parse("SHELFSYNC_DB_POOL_SIZE")? {
        config.database.pool_size = size;
    }

    if let Some(url) = env_opt("SHELFSYNC_TAKEALOT_BASE_URL") {
        config.takealot.base_url = url;
    }
    if let Some(secs) = env_parse("SHELFSYNC_TAKEALOT_TIMEOUT_SECS")? {
        config.takealot.request_timeout_secs = secs;
    }
    if let Some(size) = env_parse("SHELFSYNC_TAKEALOT_PAGE_SIZE")? {
        config.takealot.page_size = size;
    }

    if let Some(list) = env_opt("SHELFSYNC_PROXY_ENDPOINTS") {
        config.proxy.endpoints = parse_proxy_list(&list)?;
    }
    config.proxy.allow_direct = env_bool("SHELFSYNC_PROXY_ALLOW_DIRECT", config.proxy.allow_direct);
    if let Some(threshold) = env_parse("SHELFSYNC_PROXY_FAILURE_THRESHOLD")? {
        config.proxy.failure_threshold = threshold;
    }
    if let Some(secs) = env_parse("SHELFSYNC_PROXY_COOLDOWN_SECS")? {
        config.proxy.cooldown_secs = secs;
    }
    if let Some(attempts) = env_parse("SHELFSYNC_PROXY_MAX_ATTEMPTS")? {
        config.proxy.max_attempts = attempts;
    }
    if let Some(api_key) = env_opt("SHELFSYNC_WEBSHARE_API_KEY") {
        let mut webshare = WebshareConfig { api_key, ..WebshareConfig::default() };
        if let Some(url) = env_opt("SHELFSYNC_WEBSHARE_BASE_URL") {
            webshare.base_url = url;
        }
        config.proxy.webshare = Some(webshare);
    }

    if let Some(limit) = env_parse("SHELFSYNC_SYNC_DEFAULT_LIMIT")? {
        config.sync.default_limit = limit;
    }
    if let Some(limit) = env_parse("SHELFSYNC_SYNC_MAX_LIMIT")? {
        config.sync.max_limit = limit;
    }
    if let Some(pages) = env_parse("SHELFSYNC_SYNC_MAX_CONCURRENT_PAGES")? {
        config.sync.max_concurrent_pages = pages;
    }
    if let Some(secs) = env_parse("SHELFSYNC_SYNC_RUN_DEADLINE_SECS")? {
        config.sync.run_deadline_secs = secs;
    }
    if let Some(keep) = env_parse("SHELFSYNC_SYNC_RUN_HISTORY_LIMIT")? {
        config.sync.run_history_limit = keep;
    }

    config.scheduler.enabled = env_bool("SHELFSYNC_SCHEDULER_ENABLED", config.scheduler.enabled);
    if let Some(cron) = env_opt("SHELFSYNC_SYNC_CRON") {
        config.scheduler.cron_expression = cron;
    }
    if let Some(secs) = env_parse("SHELFSYNC_JOB_TIMEOUT_SECS")? {
        config.scheduler.job_timeout_secs = secs;
    }

    if let Some(addr) = env_opt("SHELFSYNC_SERVER_ADDR") {
        config.server.addr = addr;
    }
    config.server.cron_secret = env_opt("SHELFSYNC_CRON_SECRET");

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `ShelfSyncError::Config` if the file is missing, no file is
/// found, or the format is invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ShelfSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => discover_config_path().ok_or_else(|| {
            ShelfSyncError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ShelfSyncError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content; format follows the extension.
fn parse_config(contents: &str, path: &Path) -> Result<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ShelfSyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ShelfSyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(ShelfSyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Search multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn discover_config_path() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["config.json", "config.toml", "shelfsync.json", "shelfsync.toml"];

    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd.clone());
        roots.push(cwd.join(".."));
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        ShelfSyncError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Non-blank value of an environment variable.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| ShelfSyncError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key)
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
