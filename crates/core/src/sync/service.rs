//! Sync orchestrator - drives one fetch, normalize, upsert run

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use shelfsync_common::resilience::{
    BackoffStrategy, Jitter, RetryConfig, RetryDecision, RetryExecutor,
};
use shelfsync_common::Clock;
use shelfsync_domain::constants::{
    DEFAULT_CURRENCY, DEFAULT_MAX_CONCURRENT_PAGES, DEFAULT_PAGE_SIZE, DEFAULT_RUN_DEADLINE_SECS,
    DEFAULT_RUN_HISTORY_LIMIT, DEFAULT_STORAGE_RETRY_ATTEMPTS, DEFAULT_SYNC_LIMIT, MAX_SYNC_LIMIT,
    SYNC_IN_PROGRESS_MESSAGE,
};
use shelfsync_domain::{
    ApiKey, Result, ShelfSyncError, SyncConfig, SyncRunRecord, SyncSummary, TakealotApiResponse,
    TakealotConfig, TakealotProduct, TakealotSyncOptions,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::lock::SyncLocks;
use super::normalize::normalize_offer;
use super::ports::{MarketplaceClient, OfferPage, PageRequest, SyncRunRepository};
use crate::catalog::ports::{CatalogScope, ProductStore, UpsertOutcome};
use crate::credentials::{CredentialStore, ResolvedCredential};
use crate::proxy::ProxyRotator;
use crate::report::{guard, SyncOutcome};

/// Limits and tuning for sync runs.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub default_limit: u32,
    pub max_limit: u32,
    pub page_size: u32,
    pub max_concurrent_pages: usize,
    pub run_deadline: Duration,
    pub storage_retry: RetryConfig,
    pub currency: String,
    /// Runs kept per integration after each sync.
    pub run_history_limit: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_SYNC_LIMIT,
            max_limit: MAX_SYNC_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
            max_concurrent_pages: DEFAULT_MAX_CONCURRENT_PAGES,
            run_deadline: Duration::from_secs(DEFAULT_RUN_DEADLINE_SECS),
            storage_retry: storage_retry_config(DEFAULT_STORAGE_RETRY_ATTEMPTS),
            currency: DEFAULT_CURRENCY.to_string(),
            run_history_limit: DEFAULT_RUN_HISTORY_LIMIT,
        }
    }
}

impl SyncSettings {
    pub fn from_config(sync: &SyncConfig, takealot: &TakealotConfig) -> Self {
        Self {
            default_limit: sync.default_limit,
            max_limit: sync.max_limit,
            page_size: takealot.page_size.max(1),
            max_concurrent_pages: sync.max_concurrent_pages.max(1),
            run_deadline: sync.run_deadline(),
            storage_retry: storage_retry_config(sync.storage_retry_attempts),
            currency: DEFAULT_CURRENCY.to_string(),
            run_history_limit: sync.run_history_limit.max(1),
        }
    }

    /// Requested limit, or the default, clamped to `1..=max_limit`.
    pub fn effective_limit(&self, requested: Option<u32>) -> u32 {
        requested.unwrap_or(self.default_limit).clamp(1, self.max_limit.max(1))
    }
}

fn storage_retry_config(attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts: attempts.max(1),
        backoff: BackoffStrategy::Exponential {
            initial_delay: Duration::from_millis(50),
            base: 2.0,
            max_delay: Duration::from_secs(2),
        },
        jitter: Jitter::Equal,
    }
}

fn storage_retry_policy(error: &ShelfSyncError, _attempt: u32) -> RetryDecision {
    if matches!(error, ShelfSyncError::StorageFailure(_)) {
        RetryDecision::Retry
    } else {
        RetryDecision::Stop
    }
}

/// What [`SyncOrchestrator::remove_integration`] deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegrationRemoval {
    pub products_removed: u64,
    pub runs_removed: u64,
}

/// Mutable state of one run.
struct RunState {
    outcome: SyncOutcome,
    seen: HashSet<String>,
    limit: usize,
    synced_at: i64,
    deadline: Instant,
    deadline_secs: u64,
}

impl RunState {
    fn limit_reached(&self) -> bool {
        self.seen.len() >= self.limit
    }

    /// Records the expiry once the deadline has passed.
    fn deadline_passed(&mut self) -> bool {
        if Instant::now() < self.deadline {
            return false;
        }
        if !matches!(self.outcome.error, Some(ShelfSyncError::DeadlineExceeded(_))) {
            warn!(
                deadline_secs = self.deadline_secs,
                "sync run deadline exceeded, returning partial result"
            );
        }
        self.outcome.expire(ShelfSyncError::DeadlineExceeded(format!(
            "sync run exceeded {}s deadline",
            self.deadline_secs
        )));
        true
    }

    fn page_failed(&mut self, page_number: u32, error: ShelfSyncError) {
        warn!(page = page_number, %error, "page fetch failed");
        // A request timeout before the run deadline is an ordinary page error.
        if !(matches!(error, ShelfSyncError::DeadlineExceeded(_)) && self.deadline_passed()) {
            self.outcome.fail(error);
        }
    }
}

/// Sync orchestrator.
///
/// One run per `(user_id, integration_id)` at a time. Pages are fetched
/// through the proxy rotator with bounded concurrency and handed over a
/// channel to a single consumer that upserts products one at a time, so
/// writes for the same id never race and slow storage never stalls fetches.
pub struct SyncOrchestrator {
    credentials: Arc<CredentialStore>,
    marketplace: Arc<dyn MarketplaceClient>,
    rotator: Arc<ProxyRotator>,
    products: Arc<dyn ProductStore>,
    runs: Arc<dyn SyncRunRepository>,
    clock: Arc<dyn Clock>,
    locks: SyncLocks,
    settings: SyncSettings,
}

impl SyncOrchestrator {
    pub fn new(
        credentials: Arc<CredentialStore>,
        marketplace: Arc<dyn MarketplaceClient>,
        rotator: Arc<ProxyRotator>,
        products: Arc<dyn ProductStore>,
        runs: Arc<dyn SyncRunRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials,
            marketplace,
            rotator,
            products,
            runs,
            clock,
            locks: SyncLocks::new(),
            settings: SyncSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn is_running(&self, user_id: &str, integration_id: &str) -> bool {
        self.locks.is_locked(user_id, integration_id)
    }

    /// Delete an integration together with its catalogue and run history.
    ///
    /// Takes the integration's sync lock for the whole cascade, so a delete
    /// while a run is writing is refused with `SyncInProgress`.
    #[instrument(skip(self))]
    pub async fn remove_integration(
        &self,
        user_id: Option<&str>,
        integration_id: &str,
    ) -> Result<IntegrationRemoval> {
        let user_id = match user_id.map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => return Err(ShelfSyncError::Unauthenticated("no user context".into())),
        };
        let Some(_lock) = self.locks.try_acquire(user_id, integration_id) else {
            warn!(integration_id, "delete refused while sync is running");
            return Err(ShelfSyncError::SyncInProgress(SYNC_IN_PROGRESS_MESSAGE.to_string()));
        };

        self.credentials.delete_integration(Some(user_id), integration_id).await?;
        let products_removed =
            self.products.delete_scope(&CatalogScope::new(user_id, integration_id)).await?;
        let runs_removed = self.runs.delete_for_integration(integration_id).await?;

        info!(integration_id, products_removed, runs_removed, "integration removed");
        Ok(IntegrationRemoval { products_removed, runs_removed })
    }

    /// Last recorded run per integration.
    pub async fn latest_runs(&self) -> Result<Vec<SyncRunRecord>> {
        self.runs.latest_runs().await
    }

    /// Execute one sync run. Never fails or panics past this call; every
    /// outcome is reported through the envelope.
    #[instrument(
        skip(self, options),
        fields(user_id = ?options.user_id, sync_type = %options.sync_type, limit = ?options.limit)
    )]
    pub async fn run_sync(&self, options: TakealotSyncOptions) -> TakealotApiResponse<SyncSummary> {
        guard(self.execute(options)).await
    }

    async fn execute(&self, options: TakealotSyncOptions) -> TakealotApiResponse<SyncSummary> {
        let credential = match self.authorize(&options).await {
            Ok(credential) => credential,
            Err(error) => {
                warn!(%error, "sync rejected");
                return TakealotApiResponse::err(&error);
            }
        };

        let Some(_lock) = self.locks.try_acquire(&credential.user_id, &credential.integration_id)
        else {
            warn!(integration_id = %credential.integration_id, "sync already running");
            return TakealotApiResponse::err(&ShelfSyncError::SyncInProgress(
                SYNC_IN_PROGRESS_MESSAGE.to_string(),
            ));
        };

        let started_at = self.clock.unix_seconds();
        let limit = self.settings.effective_limit(options.limit);
        info!(integration_id = %credential.integration_id, limit, "sync run started");

        let outcome = self.run_locked(&credential, limit, started_at).await;
        let response = outcome.into_response();

        let record = SyncRunRecord::from_response(
            &credential.user_id,
            &credential.integration_id,
            options.sync_type,
            &response,
            started_at,
            self.clock.unix_seconds(),
        );
        if let Err(error) = self.runs.record_run(&record).await {
            warn!(%error, "failed to record sync run");
        } else {
            match self
                .runs
                .prune_history(&credential.integration_id, self.settings.run_history_limit)
                .await
            {
                Ok(0) => {}
                Ok(pruned) => debug!(pruned, "pruned sync run history"),
                Err(error) => warn!(%error, "failed to prune sync run history"),
            }
        }

        info!(
            integration_id = %credential.integration_id,
            status = %record.status,
            imported = record.imported,
            updated = record.updated,
            skipped = record.skipped,
            "sync run finished"
        );
        response
    }

    /// A missing or foreign integration is reported as `Unauthorized`.
    async fn authorize(&self, options: &TakealotSyncOptions) -> Result<ResolvedCredential> {
        self.credentials
            .resolve_key(options.user_id.as_deref(), options.integration_id.as_deref())
            .await
            .map_err(|error| match error {
                ShelfSyncError::NotFound(message) => ShelfSyncError::Unauthorized(message),
                other => other,
            })
    }

    async fn run_locked(
        &self,
        credential: &ResolvedCredential,
        limit: u32,
        synced_at: i64,
    ) -> SyncOutcome {
        let scope = CatalogScope::new(&credential.user_id, &credential.integration_id);
        let mut run = RunState {
            outcome: SyncOutcome::default(),
            seen: HashSet::new(),
            limit: usize::try_from(limit).unwrap_or(usize::MAX),
            synced_at,
            deadline: Instant::now() + self.settings.run_deadline,
            deadline_secs: self.settings.run_deadline.as_secs(),
        };

        self.fetch_and_store(&credential.api_key, &scope, limit, &mut run).await;
        run.outcome
    }

    async fn fetch_and_store(
        &self,
        api_key: &ApiKey,
        scope: &CatalogScope,
        limit: u32,
        run: &mut RunState,
    ) {
        let page_size = self.settings.page_size.min(limit).max(1);
        let full_page = usize::try_from(page_size).unwrap_or(usize::MAX);
        let deadline = run.deadline;

        let first = match self.fetch_page(api_key, 1, page_size, deadline).await {
            Ok(page) => page,
            Err(error) => {
                run.page_failed(1, error);
                return;
            }
        };
        let total = first.total;
        let first_len = first.offers.len();
        if self.store_page(scope, first, run).await {
            return;
        }

        if let Some(total) = total {
            let wanted = total.min(u64::from(limit));
            let last_page = u32::try_from(wanted.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX);
            if last_page < 2 {
                return;
            }
            debug!(total, last_page, "fetching remaining pages concurrently");
            self.fetch_remaining(api_key, scope, page_size, last_page, run).await;
            return;
        }

        if first_len < full_page {
            return;
        }
        let mut page_number = 2;
        loop {
            match self.fetch_page(api_key, page_number, page_size, deadline).await {
                Ok(page) => {
                    let len = page.offers.len();
                    if self.store_page(scope, page, run).await || len < full_page {
                        break;
                    }
                }
                Err(error) => {
                    run.page_failed(page_number, error);
                    break;
                }
            }
            page_number += 1;
        }
    }

    /// Pages `2..=last_page`. The fetch side keeps polling its in-flight
    /// requests while the consumer is busy upserting; dropping the receiver
    /// cancels whatever is still in flight.
    async fn fetch_remaining(
        &self,
        api_key: &ApiKey,
        scope: &CatalogScope,
        page_size: u32,
        last_page: u32,
        run: &mut RunState,
    ) {
        let deadline = run.deadline;
        // Sized to the remaining pages so a send never holds up the fetches.
        let pending = usize::try_from(last_page - 1).unwrap_or(usize::MAX);
        let (tx, mut rx) = mpsc::channel(pending.max(1));

        let producer = async move {
            let mut pages = stream::iter(2..=last_page)
                .map(move |page_number| async move {
                    (page_number, self.fetch_page(api_key, page_number, page_size, deadline).await)
                })
                .buffered(self.settings.max_concurrent_pages.max(1));

            loop {
                tokio::select! {
                    biased;
                    () = tx.closed() => break,
                    next = pages.next() => {
                        let Some(fetched) = next else { break };
                        if tx.send(fetched).await.is_err() {
                            break;
                        }
                    }
                }
            }
        };

        let consumer = async move {
            while let Some((page_number, result)) = rx.recv().await {
                match result {
                    Ok(page) => {
                        if self.store_page(scope, page, run).await {
                            break;
                        }
                    }
                    Err(error) => run.page_failed(page_number, error),
                }
            }
            drop(rx);
        };

        tokio::join!(producer, consumer);
    }

    async fn fetch_page(
        &self,
        api_key: &ApiKey,
        page_number: u32,
        page_size: u32,
        deadline: Instant,
    ) -> Result<OfferPage> {
        let fetch = self.rotator.with_proxy(move |egress| {
            let request = PageRequest {
                page_number,
                page_size,
                timeout: deadline.saturating_duration_since(Instant::now()),
            };
            async move {
                debug!(page_number, egress = egress.label(), "fetching offers page");
                self.marketplace.fetch_offers(api_key, &request, &egress).await
            }
        });

        match tokio::time::timeout_at(deadline, fetch).await {
            Ok(result) => result,
            Err(_) => Err(ShelfSyncError::DeadlineExceeded(format!(
                "page {page_number} not fetched before the run deadline"
            ))),
        }
    }

    /// Normalize and upsert one page. Returns `true` once the run should
    /// stop: the limit is reached or the deadline has passed. The deadline is
    /// only checked between records, so every committed write is counted.
    async fn store_page(&self, scope: &CatalogScope, page: OfferPage, run: &mut RunState) -> bool {
        for raw in &page.offers {
            if run.limit_reached() {
                return true;
            }
            if run.deadline_passed() {
                return true;
            }

            let Some(product) = normalize_offer(raw, &self.settings.currency) else {
                warn!(sku = raw.sku.as_deref().unwrap_or_default(), "offer without id skipped");
                continue;
            };
            if !run.seen.insert(product.id.clone()) {
                debug!(product_id = %product.id, "duplicate offer ignored");
                continue;
            }

            match self.upsert_with_retry(scope, &product, run.synced_at).await {
                Ok(UpsertOutcome::Inserted) => run.outcome.summary.imported += 1,
                Ok(UpsertOutcome::Updated) => run.outcome.summary.updated += 1,
                Ok(UpsertOutcome::Stale) => {
                    debug!(product_id = %product.id, "stored snapshot is newer, kept");
                }
                Err(err) => {
                    error!(product_id = %product.id, error = %err, "upsert failed, record skipped");
                    run.outcome.summary.skipped += 1;
                    run.outcome.fail(err);
                }
            }
        }
        run.limit_reached()
    }

    async fn upsert_with_retry(
        &self,
        scope: &CatalogScope,
        product: &TakealotProduct,
        synced_at: i64,
    ) -> Result<UpsertOutcome> {
        let executor = RetryExecutor::new(self.settings.storage_retry.clone(), storage_retry_policy);
        executor
            .execute(|| self.products.upsert_product(scope, product, synced_at))
            .await
            .map_err(|retry_error| {
                retry_error.into_inner().unwrap_or_else(|| {
                    ShelfSyncError::Internal("invalid storage retry configuration".into())
                })
            })
    }
}
