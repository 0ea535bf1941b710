//! # ShelfSync Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite document store, integration and sync-run repositories
//! - Takealot Seller API client with one HTTP client per egress
//! - Webshare proxy-list source
//! - Configuration loading
//! - Cron scheduling for unattended sync runs
//!
//! ## Architecture
//! - Implements traits defined in `shelfsync-core`
//! - Contains all "impure" code (I/O, network, clocks on the wall)

pub mod config;
pub mod database;
pub mod errors;
pub mod proxies;
pub mod scheduling;
pub mod takealot;

pub use database::{
    DbManager, SqliteIntegrationRepository, SqliteLegacyKeyRepository, SqliteProductStore,
    SqliteSyncRunRepository,
};
pub use errors::InfraError;
pub use proxies::WebshareProxySource;
pub use scheduling::{
    run_scheduled_syncs, SchedulerError, SchedulerResult, SyncScheduler, SyncSchedulerConfig,
    TickReport,
};
pub use takealot::TakealotClient;
