//! Marketplace sync engine.

mod lock;
pub mod normalize;
pub mod ports;
mod service;

pub use lock::{SyncLockGuard, SyncLocks};
pub use service::{IntegrationRemoval, SyncOrchestrator, SyncSettings};
