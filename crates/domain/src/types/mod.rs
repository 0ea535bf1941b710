//! Domain types and models

pub mod integration;
pub mod proxy;
pub mod sync;
pub mod takealot;

pub use integration::{ApiKey, Integration, IntegrationSummary, Marketplace};
pub use proxy::{ProxyEndpoint, ProxyHealthState, ProxyStatus};
pub use sync::{SyncRunRecord, SyncRunStatus};
pub use takealot::{
    SyncSummary, SyncType, TakealotApiResponse, TakealotProduct, TakealotSyncOptions,
};
