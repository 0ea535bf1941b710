//! Cron scheduler for periodic Takealot syncs.
//!
//! Each tick lists the active integrations and runs a `cron` sync for every
//! one of them, one after another, each bounded by the job timeout. A run the
//! orchestrator rejects because another run holds the integration's lock is
//! logged and skipped.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use shelfsync_core::{CredentialStore, SyncOrchestrator};
//! use shelfsync_infra::scheduling::{SyncScheduler, SyncSchedulerConfig};
//!
//! # async fn example(
//! #     credentials: Arc<CredentialStore>,
//! #     orchestrator: Arc<SyncOrchestrator>,
//! # ) -> shelfsync_infra::scheduling::SchedulerResult<()> {
//! let mut scheduler = SyncScheduler::new(
//!     credentials,
//!     orchestrator,
//!     SyncSchedulerConfig {
//!         cron_expression: "0 0 */6 * * *".into(), // every 6 hours
//!         ..Default::default()
//!     },
//! );
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use shelfsync_core::{CredentialStore, SyncOrchestrator};
use shelfsync_domain::constants::{DEFAULT_JOB_TIMEOUT_SECS, DEFAULT_SYNC_CRON};
use shelfsync_domain::{Result, SchedulerConfig, ShelfSyncError, TakealotSyncOptions};
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the sync scheduler.
#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    /// Six-field cron expression (seconds first).
    pub cron_expression: String,
    /// Timeout applied to each integration's run.
    pub job_timeout: Duration,
    pub start_timeout: Duration,
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: DEFAULT_SYNC_CRON.into(),
            job_timeout: Duration::from_secs(DEFAULT_JOB_TIMEOUT_SECS),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&SchedulerConfig> for SyncSchedulerConfig {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            cron_expression: config.cron_expression.clone(),
            job_timeout: config.job_timeout(),
            ..Self::default()
        }
    }
}

/// Outcome counts of one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub succeeded: usize,
    pub skipped_in_progress: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl TickReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped_in_progress + self.failed + self.timed_out
    }
}

/// Run one cron sync per active integration.
///
/// Fails only when the active integrations cannot be listed; individual run
/// failures are counted in the report.
#[instrument(skip_all, fields(job_timeout_secs = job_timeout.as_secs()))]
pub async fn run_scheduled_syncs(
    credentials: &CredentialStore,
    orchestrator: &SyncOrchestrator,
    job_timeout: Duration,
) -> Result<TickReport> {
    let integrations = credentials.list_active_integrations().await?;
    let in_progress_code = ShelfSyncError::SyncInProgress(String::new()).code();
    let mut report = TickReport::default();

    for integration in integrations {
        let options = TakealotSyncOptions::cron(&integration.user_id, &integration.id);

        match tokio::time::timeout(job_timeout, orchestrator.run_sync(options)).await {
            Ok(response) if response.success => {
                report.succeeded += 1;
                let summary = response.data.unwrap_or_default();
                info!(
                    integration_id = %integration.id,
                    imported = summary.imported,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    "Scheduled sync finished"
                );
            }
            Ok(response) if response.code.as_deref() == Some(in_progress_code) => {
                report.skipped_in_progress += 1;
                info!(integration_id = %integration.id, "Sync already running, skipping");
            }
            Ok(response) => {
                report.failed += 1;
                warn!(
                    integration_id = %integration.id,
                    code = ?response.code,
                    error = ?response.error,
                    "Scheduled sync failed"
                );
            }
            Err(_) => {
                report.timed_out += 1;
                warn!(
                    integration_id = %integration.id,
                    timeout_secs = job_timeout.as_secs(),
                    "Scheduled sync timed out"
                );
            }
        }
    }

    Ok(report)
}

/// Sync scheduler with explicit lifecycle management.
pub struct SyncScheduler {
    credentials: Arc<CredentialStore>,
    orchestrator: Arc<SyncOrchestrator>,
    config: SyncSchedulerConfig,
    scheduler: Option<JobScheduler>,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    ticks: Arc<AtomicU64>,
}

impl SyncScheduler {
    pub fn new(
        credentials: Arc<CredentialStore>,
        orchestrator: Arc<SyncOrchestrator>,
        config: SyncSchedulerConfig,
    ) -> Self {
        Self {
            credentials,
            orchestrator,
            config,
            scheduler: None,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register the cron job and start the scheduler.
    ///
    /// A fresh cron runtime is created on every start so the scheduler can be
    /// restarted after [`stop`](Self::stop).
    #[instrument(skip(self), fields(cron = %self.config.cron_expression))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let job = self.build_job()?;
        let scheduler =
            JobScheduler::new().await.map_err(|source| SchedulerError::CreationFailed { source })?;
        let job_id = scheduler
            .add(job)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        let start_timeout = self.config.start_timeout;
        tokio::time::timeout(start_timeout, scheduler.start())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?
            .map_err(|source| SchedulerError::StartFailed { source })?;

        self.cancellation = CancellationToken::new();
        let cancel = self.cancellation.clone();
        self.monitor_handle = Some(tokio::spawn(async move {
            cancel.cancelled().await;
            debug!("Sync scheduler monitor cancelled");
        }));
        self.scheduler = Some(scheduler);

        info!(job_id = %job_id, "Sync scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        if let Some(mut scheduler) = self.scheduler.take() {
            let stop_timeout = self.config.stop_timeout;
            tokio::time::timeout(stop_timeout, scheduler.shutdown())
                .await
                .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?
                .map_err(|source| SchedulerError::StopFailed { source })?;
        }

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;
        }

        info!("Sync scheduler stopped");
        Ok(())
    }

    /// Returns true when the monitor task is active.
    pub fn is_running(&self) -> bool {
        self.monitor_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Ticks fired since construction.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    fn build_job(&self) -> SchedulerResult<Job> {
        let credentials = Arc::clone(&self.credentials);
        let orchestrator = Arc::clone(&self.orchestrator);
        let ticks = Arc::clone(&self.ticks);
        let job_timeout = self.config.job_timeout;

        Job::new_async(self.config.cron_expression.as_str(), move |_id, _lock| {
            let credentials = Arc::clone(&credentials);
            let orchestrator = Arc::clone(&orchestrator);
            let ticks = Arc::clone(&ticks);

            Box::pin(async move {
                let tick = ticks.fetch_add(1, Ordering::SeqCst) + 1;
                let started = Instant::now();

                match run_scheduled_syncs(&credentials, &orchestrator, job_timeout).await {
                    Ok(report) => info!(
                        tick,
                        integrations = report.total(),
                        succeeded = report.succeeded,
                        skipped = report.skipped_in_progress,
                        failed = report.failed,
                        timed_out = report.timed_out,
                        elapsed_ms = started.elapsed().as_millis(),
                        "Scheduled sync tick finished"
                    ),
                    Err(err) => error!(tick, error = %err, "Scheduled sync tick failed"),
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { source })
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("SyncScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
