//! Application configuration structures.
//!
//! Loaded by the infra config loader from `SHELFSYNC_*` environment variables
//! or a `config.{json,toml}` file. Every section has serde defaults so partial
//! files are valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DB_POOL_SIZE, DEFAULT_JOB_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENT_PAGES,
    DEFAULT_PAGE_SIZE, DEFAULT_PROXY_COOLDOWN_SECS, DEFAULT_PROXY_FAILURE_THRESHOLD,
    DEFAULT_PROXY_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RUN_DEADLINE_SECS,
    DEFAULT_SERVER_ADDR, DEFAULT_STORAGE_RETRY_ATTEMPTS, DEFAULT_SYNC_CRON, DEFAULT_SYNC_LIMIT,
    DEFAULT_RUN_HISTORY_LIMIT, DEFAULT_TAKEALOT_BASE_URL, DEFAULT_WEBSHARE_BASE_URL,
    DEFAULT_WEBSHARE_PAGE_SIZE, MAX_PAGE_SIZE, MAX_SYNC_LIMIT,
};
use crate::errors::{Result, ShelfSyncError};
use crate::types::ProxyEndpoint;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub takealot: TakealotConfig,
    pub proxy: ProxyConfig,
    pub sync: SyncConfig,
    pub scheduler: SchedulerConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(ShelfSyncError::Config("database.path is required".into()));
        }
        if self.database.pool_size == 0 {
            return Err(ShelfSyncError::Config("database.pool_size must be > 0".into()));
        }
        if self.takealot.page_size == 0 || self.takealot.page_size > MAX_PAGE_SIZE {
            return Err(ShelfSyncError::Config(format!(
                "takealot.page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.sync.max_limit == 0 || self.sync.default_limit == 0 {
            return Err(ShelfSyncError::Config("sync limits must be > 0".into()));
        }
        if self.sync.run_history_limit == 0 {
            return Err(ShelfSyncError::Config("sync.run_history_limit must be > 0".into()));
        }
        if self.sync.max_concurrent_pages == 0 {
            return Err(ShelfSyncError::Config("sync.max_concurrent_pages must be > 0".into()));
        }
        if self.proxy.max_attempts == 0 || self.proxy.failure_threshold == 0 {
            return Err(ShelfSyncError::Config(
                "proxy.max_attempts and proxy.failure_threshold must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path.
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: String::new(), pool_size: DEFAULT_DB_POOL_SIZE }
    }
}

/// Takealot Seller API client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TakealotConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub page_size: u32,
}

impl Default for TakealotConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TAKEALOT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TakealotConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Proxy pool and rotation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Static endpoints; merged with Webshare results when configured.
    pub endpoints: Vec<ProxyEndpoint>,
    /// Allow direct egress once every proxy is cooling down.
    pub allow_direct: bool,
    /// Consecutive failures before an endpoint cools down.
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
    /// Attempts per request across endpoints.
    pub max_attempts: u32,
    pub webshare: Option<WebshareConfig>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            allow_direct: false,
            failure_threshold: DEFAULT_PROXY_FAILURE_THRESHOLD,
            cooldown_secs: DEFAULT_PROXY_COOLDOWN_SECS,
            max_attempts: DEFAULT_PROXY_MAX_ATTEMPTS,
            webshare: None,
        }
    }
}

impl ProxyConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Webshare proxy-list API settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebshareConfig {
    pub api_key: String,
    pub base_url: String,
    pub page_size: u32,
}

impl Default for WebshareConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_WEBSHARE_BASE_URL.to_string(),
            page_size: DEFAULT_WEBSHARE_PAGE_SIZE,
        }
    }
}

impl std::fmt::Debug for WebshareConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebshareConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// Sync orchestrator limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub default_limit: u32,
    pub max_limit: u32,
    pub max_concurrent_pages: usize,
    pub run_deadline_secs: u64,
    pub storage_retry_attempts: u32,
    /// Sync runs kept per integration; older ones are pruned after each run.
    pub run_history_limit: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_SYNC_LIMIT,
            max_limit: MAX_SYNC_LIMIT,
            max_concurrent_pages: DEFAULT_MAX_CONCURRENT_PAGES,
            run_deadline_secs: DEFAULT_RUN_DEADLINE_SECS,
            storage_retry_attempts: DEFAULT_STORAGE_RETRY_ATTEMPTS,
            run_history_limit: DEFAULT_RUN_HISTORY_LIMIT,
        }
    }
}

impl SyncConfig {
    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs)
    }
}

/// Cron scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Six-field cron expression (seconds first).
    pub cron_expression: String,
    pub job_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron_expression: DEFAULT_SYNC_CRON.to_string(),
            job_timeout_secs: DEFAULT_JOB_TIMEOUT_SECS,
        }
    }
}

impl SchedulerConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

/// HTTP server settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    /// Bearer secret required by the cron trigger endpoint. Cron triggers
    /// are refused when unset.
    pub cron_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: DEFAULT_SERVER_ADDR.to_string(), cron_secret: None }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("addr", &self.addr)
            .field("cron_secret", &self.cron_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
