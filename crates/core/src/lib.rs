//! # ShelfSync Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for storage, the marketplace API and
//!   proxy sources
//! - The credential store, proxy rotation layer, sync orchestrator and result
//!   reporter
//!
//! ## Architecture Principles
//! - Only depends on `shelfsync-common` and `shelfsync-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod catalog;
pub mod credentials;
pub mod proxy;
pub mod report;
pub mod sync;

pub use catalog::ports::{CatalogScope, ProductStore, UpsertOutcome};
pub use credentials::ports::{IntegrationRepository, LegacyKeyRepository};
pub use credentials::{CredentialStore, ResolvedCredential};
pub use proxy::ports::ProxySource;
pub use proxy::{Egress, ProxyPool, ProxyPoolConfig, ProxyRotator, RotationPolicy};
pub use report::{guard, report, SyncOutcome};
pub use sync::ports::{MarketplaceClient, OfferPage, PageRequest, RawOffer, SyncRunRepository};
pub use sync::{IntegrationRemoval, SyncLockGuard, SyncLocks, SyncOrchestrator, SyncSettings};
