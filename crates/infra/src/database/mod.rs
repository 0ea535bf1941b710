//! Database implementations

pub mod integration_repository;
pub mod legacy_key_repository;
pub mod manager;
pub mod product_store;
pub mod sync_run_repository;

pub use integration_repository::SqliteIntegrationRepository;
pub use legacy_key_repository::SqliteLegacyKeyRepository;
pub use manager::{DbManager, SqliteConnection};
pub use product_store::SqliteProductStore;
pub use sync_run_repository::SqliteSyncRunRepository;
