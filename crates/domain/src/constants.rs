//! Application constants
//!
//! Centralized location for domain-level defaults used throughout the
//! application.

// Marketplace
pub const MARKETPLACE_TAKEALOT: &str = "takealot";
pub const DEFAULT_TAKEALOT_BASE_URL: &str = "https://seller-api.takealot.com";
pub const DEFAULT_CURRENCY: &str = "ZAR";
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;

// Sync runs
pub const DEFAULT_SYNC_LIMIT: u32 = 500;
pub const MAX_SYNC_LIMIT: u32 = 10_000;
pub const DEFAULT_MAX_CONCURRENT_PAGES: usize = 4;
pub const DEFAULT_RUN_DEADLINE_SECS: u64 = 300;
pub const DEFAULT_STORAGE_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RUN_HISTORY_LIMIT: u32 = 50;
pub const SYNC_IN_PROGRESS_MESSAGE: &str = "sync in progress";

// Proxy pool
pub const DEFAULT_PROXY_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_PROXY_COOLDOWN_SECS: u64 = 60;
pub const DEFAULT_PROXY_MAX_ATTEMPTS: u32 = 3;
pub const PROXY_POOL_EXHAUSTED_MESSAGE: &str = "proxy pool exhausted";
pub const DEFAULT_WEBSHARE_BASE_URL: &str = "https://proxy.webshare.io";
pub const DEFAULT_WEBSHARE_PAGE_SIZE: u32 = 100;

// Scheduler
pub const DEFAULT_SYNC_CRON: &str = "0 0 */6 * * *";
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 600;

// Storage
pub const DEFAULT_DB_POOL_SIZE: u32 = 8;

// HTTP server
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8080";
pub const USER_ID_HEADER: &str = "x-user-id";

// API keys
pub const KEY_FINGERPRINT_LEN: usize = 12;
