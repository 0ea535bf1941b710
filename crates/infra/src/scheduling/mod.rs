//! Cron-driven scheduled syncs.
//!
//! The scheduler follows an explicit lifecycle: `start` spawns a monitor
//! task tied to a cancellation token, `stop` shuts the cron runtime down and
//! joins it, and every async step runs under a timeout.

pub mod error;
pub mod sync_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use sync_scheduler::{run_scheduled_syncs, SyncScheduler, SyncSchedulerConfig, TickReport};
