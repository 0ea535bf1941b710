//! Shared test helpers for `shelfsync-core` integration tests.
//!
//! In-memory implementations of every core port plus a scriptable
//! marketplace, so orchestrator tests can focus on behaviour.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use shelfsync_common::resilience::{BackoffStrategy, Jitter, RetryConfig};
use shelfsync_common::MockClock;
use shelfsync_core::{
    CatalogScope, CredentialStore, Egress, IntegrationRepository, LegacyKeyRepository,
    MarketplaceClient, OfferPage, PageRequest, ProductStore, ProxyPool, ProxyPoolConfig,
    ProxyRotator, RawOffer, RotationPolicy, SyncOrchestrator, SyncRunRepository, SyncSettings,
    UpsertOutcome,
};
use shelfsync_domain::{
    ApiKey, Integration, Marketplace, ProxyEndpoint, Result, ShelfSyncError, SyncRunRecord,
    TakealotProduct,
};

pub const USER: &str = "u1";
pub const INTEGRATION: &str = "int-1";

pub fn integration(id: &str, user_id: &str, key: &str) -> Integration {
    Integration {
        id: id.to_string(),
        user_id: user_id.to_string(),
        marketplace: Marketplace::Takealot,
        name: "Store".to_string(),
        api_key: ApiKey::parse(key).unwrap(),
        active: true,
        created_at: 0,
        updated_at: 0,
    }
}

pub fn offers(ids: impl IntoIterator<Item = u32>) -> Vec<RawOffer> {
    ids.into_iter()
        .map(|id| RawOffer {
            offer_id: Some(id.to_string()),
            tsin_id: Some(format!("{}", 90_000 + id)),
            sku: Some(format!("SKU-{id}")),
            title: Some(format!("Product {id}")),
            selling_price: Some(f64::from(id) * 10.0),
            status: Some("Buyable".to_string()),
            offer_url: Some(format!("https://www.takealot.com/p/{id}")),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Integrations
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryIntegrations {
    rows: Mutex<Vec<Integration>>,
}

impl InMemoryIntegrations {
    pub fn with(rows: Vec<Integration>) -> Self {
        Self { rows: Mutex::new(rows) }
    }

    pub fn all(&self) -> Vec<Integration> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl IntegrationRepository for InMemoryIntegrations {
    async fn find_by_id(&self, id: &str) -> Result<Option<Integration>> {
        Ok(self.rows.lock().iter().find(|i| i.id == id).cloned())
    }

    async fn find_by_user(
        &self,
        user_id: &str,
        marketplace: Marketplace,
    ) -> Result<Option<Integration>> {
        Ok(self
            .rows
            .lock()
            .iter()
            .find(|i| i.user_id == user_id && i.marketplace == marketplace)
            .cloned())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Integration>> {
        Ok(self.rows.lock().iter().filter(|i| i.user_id == user_id).cloned().collect())
    }

    async fn list_active(&self) -> Result<Vec<Integration>> {
        Ok(self.rows.lock().iter().filter(|i| i.active).cloned().collect())
    }

    async fn insert(&self, integration: &Integration) -> Result<()> {
        let mut rows = self.rows.lock();
        if rows
            .iter()
            .any(|i| i.user_id == integration.user_id && i.marketplace == integration.marketplace)
        {
            return Err(ShelfSyncError::InvalidInput("duplicate integration".into()));
        }
        rows.push(integration.clone());
        Ok(())
    }

    async fn update_api_key(&self, id: &str, api_key: &ApiKey, updated_at: i64) -> Result<bool> {
        let mut rows = self.rows.lock();
        Ok(rows.iter_mut().find(|i| i.id == id).map_or(false, |i| {
            i.api_key = api_key.clone();
            i.updated_at = updated_at;
            true
        }))
    }

    async fn set_active(&self, id: &str, active: bool, updated_at: i64) -> Result<bool> {
        let mut rows = self.rows.lock();
        Ok(rows.iter_mut().find(|i| i.id == id).map_or(false, |i| {
            i.active = active;
            i.updated_at = updated_at;
            true
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|i| i.id != id);
        Ok(rows.len() != before)
    }
}

#[derive(Default)]
pub struct InMemoryLegacyKeys {
    keys: HashMap<String, String>,
}

impl InMemoryLegacyKeys {
    pub fn with(user_id: &str, key: &str) -> Self {
        Self { keys: HashMap::from([(user_id.to_string(), key.to_string())]) }
    }
}

#[async_trait]
impl LegacyKeyRepository for InMemoryLegacyKeys {
    async fn find_legacy_key(&self, user_id: &str) -> Result<Option<ApiKey>> {
        self.keys.get(user_id).map(ApiKey::parse).transpose()
    }
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

type DocKey = (String, String, String);

/// Product store with optional failure injection per product id.
#[derive(Default)]
pub struct InMemoryProductStore {
    docs: Mutex<HashMap<DocKey, (TakealotProduct, i64)>>,
    transient_failures: Mutex<HashMap<String, u32>>,
    permanent_failures: Mutex<HashSet<String>>,
    upsert_calls: AtomicU32,
    write_delay: Mutex<Duration>,
}

impl InMemoryProductStore {
    /// Fail the next `times` upserts of `product_id`.
    pub fn fail_times(&self, product_id: &str, times: u32) {
        self.transient_failures.lock().insert(product_id.to_string(), times);
    }

    pub fn fail_always(&self, product_id: &str) {
        self.permanent_failures.lock().insert(product_id.to_string());
    }

    /// Every successful write commits first, then takes `delay` to return.
    pub fn slow_writes(&self, delay: Duration) {
        *self.write_delay.lock() = delay;
    }

    pub fn len(&self) -> usize {
        self.docs.lock().len()
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.docs.lock().keys().any(|(_, _, id)| id == product_id)
    }

    pub fn upsert_calls(&self) -> u32 {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn upsert_product(
        &self,
        scope: &CatalogScope,
        product: &TakealotProduct,
        synced_at: i64,
    ) -> Result<UpsertOutcome> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);

        if self.permanent_failures.lock().contains(&product.id) {
            return Err(ShelfSyncError::StorageFailure(format!("disk full writing {}", product.id)));
        }
        {
            let mut transient = self.transient_failures.lock();
            if let Some(remaining) = transient.get_mut(&product.id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(ShelfSyncError::StorageFailure("database is locked".into()));
                }
            }
        }

        let key = (scope.user_id.clone(), scope.integration_id.clone(), product.id.clone());
        let outcome = {
            let mut docs = self.docs.lock();
            match docs.get(&key) {
                Some((_, stored_at)) if *stored_at > synced_at => UpsertOutcome::Stale,
                Some(_) => {
                    docs.insert(key, (product.clone(), synced_at));
                    UpsertOutcome::Updated
                }
                None => {
                    docs.insert(key, (product.clone(), synced_at));
                    UpsertOutcome::Inserted
                }
            }
        };

        let delay = *self.write_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(outcome)
    }

    async fn list_products(
        &self,
        scope: &CatalogScope,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<TakealotProduct>> {
        let docs = self.docs.lock();
        let mut products: Vec<TakealotProduct> = docs
            .iter()
            .filter(|((user, integration, _), _)| {
                *user == scope.user_id && *integration == scope.integration_id
            })
            .map(|(_, (product, _))| product.clone())
            .collect();
        products.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(products.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn count_products(&self, scope: &CatalogScope) -> Result<u64> {
        Ok(self.list_products(scope, u32::MAX, 0).await?.len() as u64)
    }

    async fn delete_scope(&self, scope: &CatalogScope) -> Result<u64> {
        let mut docs = self.docs.lock();
        let before = docs.len();
        docs.retain(|(user, integration, _), _| {
            !(*user == scope.user_id && *integration == scope.integration_id)
        });
        Ok((before - docs.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Sync runs
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemorySyncRuns {
    records: Mutex<Vec<SyncRunRecord>>,
}

impl InMemorySyncRuns {
    pub fn all(&self) -> Vec<SyncRunRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl SyncRunRepository for InMemorySyncRuns {
    async fn record_run(&self, record: &SyncRunRecord) -> Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    async fn latest_runs(&self) -> Result<Vec<SyncRunRecord>> {
        let records = self.records.lock();
        let mut latest: HashMap<String, SyncRunRecord> = HashMap::new();
        for record in records.iter() {
            latest.insert(record.integration_id.clone(), record.clone());
        }
        Ok(latest.into_values().collect())
    }

    async fn latest_for_integration(&self, integration_id: &str) -> Result<Option<SyncRunRecord>> {
        Ok(self.records.lock().iter().rev().find(|r| r.integration_id == integration_id).cloned())
    }

    async fn prune_history(&self, integration_id: &str, keep: u32) -> Result<u64> {
        let mut records = self.records.lock();
        let total = records.iter().filter(|r| r.integration_id == integration_id).count();
        let mut excess = total.saturating_sub(keep as usize);
        let before = records.len();
        records.retain(|r| {
            if excess > 0 && r.integration_id == integration_id {
                excess -= 1;
                false
            } else {
                true
            }
        });
        Ok((before - records.len()) as u64)
    }

    async fn delete_for_integration(&self, integration_id: &str) -> Result<u64> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|r| r.integration_id != integration_id);
        Ok((before - records.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Marketplace
// ---------------------------------------------------------------------------

/// Scriptable marketplace serving a fixed offer list in pages.
pub struct MockMarketplace {
    offers: Vec<RawOffer>,
    report_total: bool,
    delay: Duration,
    slow_pages: HashMap<u32, Duration>,
    failing_pages: HashMap<u32, ShelfSyncError>,
    panic_on_page: Option<u32>,
    calls: AtomicU32,
    egresses: Mutex<Vec<String>>,
    keys: Mutex<Vec<String>>,
    fetch_times: Mutex<Vec<(u32, Duration)>>,
}

impl MockMarketplace {
    pub fn new(offers: Vec<RawOffer>) -> Self {
        Self {
            offers,
            report_total: true,
            delay: Duration::ZERO,
            slow_pages: HashMap::new(),
            failing_pages: HashMap::new(),
            panic_on_page: None,
            calls: AtomicU32::new(0),
            egresses: Mutex::new(Vec::new()),
            keys: Mutex::new(Vec::new()),
            fetch_times: Mutex::new(Vec::new()),
        }
    }

    pub fn without_total(mut self) -> Self {
        self.report_total = false;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_slow_page(mut self, page: u32, delay: Duration) -> Self {
        self.slow_pages.insert(page, delay);
        self
    }

    pub fn failing_page(mut self, page: u32, error: ShelfSyncError) -> Self {
        self.failing_pages.insert(page, error);
        self
    }

    pub fn panicking_page(mut self, page: u32) -> Self {
        self.panic_on_page = Some(page);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn egresses(&self) -> Vec<String> {
        self.egresses.lock().clone()
    }

    pub fn keys_seen(&self) -> Vec<String> {
        self.keys.lock().clone()
    }

    /// Wall time from request start until the caller observed the page.
    pub fn fetch_time(&self, page: u32) -> Option<Duration> {
        self.fetch_times.lock().iter().find(|(p, _)| *p == page).map(|(_, took)| *took)
    }
}

#[async_trait]
impl MarketplaceClient for MockMarketplace {
    async fn fetch_offers(
        &self,
        api_key: &ApiKey,
        request: &PageRequest,
        egress: &Egress,
    ) -> Result<OfferPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        self.egresses.lock().push(egress.label().to_string());
        self.keys.lock().push(api_key.expose().to_string());

        let delay = self.slow_pages.get(&request.page_number).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.panic_on_page == Some(request.page_number) {
            panic!("marketplace exploded on page {}", request.page_number);
        }
        if let Some(error) = self.failing_pages.get(&request.page_number) {
            return Err(error.clone());
        }

        let size = request.page_size as usize;
        let start = (request.page_number as usize - 1) * size;
        let page: Vec<RawOffer> = self.offers.iter().skip(start).take(size).cloned().collect();
        self.fetch_times.lock().push((request.page_number, started.elapsed()));

        Ok(OfferPage {
            offers: page,
            total: self.report_total.then_some(self.offers.len() as u64),
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub fn fast_settings() -> SyncSettings {
    SyncSettings {
        page_size: 10,
        max_concurrent_pages: 2,
        run_deadline: Duration::from_secs(10),
        storage_retry: RetryConfig {
            max_attempts: 3,
            backoff: BackoffStrategy::Fixed(Duration::from_millis(1)),
            jitter: Jitter::None,
        },
        ..SyncSettings::default()
    }
}

pub struct Harness {
    pub orchestrator: Arc<SyncOrchestrator>,
    pub credentials: Arc<CredentialStore>,
    pub integrations: Arc<InMemoryIntegrations>,
    pub products: Arc<InMemoryProductStore>,
    pub runs: Arc<InMemorySyncRuns>,
    pub marketplace: Arc<MockMarketplace>,
    pub pool: Arc<ProxyPool>,
    pub clock: MockClock,
}

pub struct HarnessBuilder {
    marketplace: MockMarketplace,
    proxies: Vec<String>,
    failure_threshold: u32,
    policy: RotationPolicy,
    settings: SyncSettings,
    integrations: Vec<Integration>,
}

impl HarnessBuilder {
    pub fn new(marketplace: MockMarketplace) -> Self {
        Self {
            marketplace,
            proxies: vec!["p1".to_string(), "p2".to_string()],
            failure_threshold: 1,
            policy: RotationPolicy { max_attempts: 3, allow_direct: false },
            settings: fast_settings(),
            integrations: vec![integration(INTEGRATION, USER, "key-u1")],
        }
    }

    pub fn proxies(mut self, ids: &[&str]) -> Self {
        self.proxies = ids.iter().map(|id| (*id).to_string()).collect();
        self
    }

    pub fn policy(mut self, policy: RotationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn integration(mut self, integration: Integration) -> Self {
        self.integrations.push(integration);
        self
    }

    pub fn build(self) -> Harness {
        let clock = MockClock::at_unix_seconds(1_700_000_000);
        let shared_clock: Arc<dyn shelfsync_common::Clock> = Arc::new(clock.clone());

        let integrations = Arc::new(InMemoryIntegrations::with(self.integrations));
        let credentials =
            Arc::new(CredentialStore::new(integrations.clone(), shared_clock.clone()));
        let products = Arc::new(InMemoryProductStore::default());
        let runs = Arc::new(InMemorySyncRuns::default());
        let marketplace = Arc::new(self.marketplace);

        let endpoints = self
            .proxies
            .iter()
            .map(|id| ProxyEndpoint::new(id.clone(), format!("http://{id}.proxy:3128")))
            .collect();
        let pool = Arc::new(ProxyPool::new(
            endpoints,
            ProxyPoolConfig {
                failure_threshold: self.failure_threshold,
                cooldown: Duration::from_secs(60),
            },
            shared_clock.clone(),
        ));
        let rotator = Arc::new(ProxyRotator::new(pool.clone(), self.policy));

        let orchestrator = Arc::new(
            SyncOrchestrator::new(
                credentials.clone(),
                marketplace.clone(),
                rotator,
                products.clone(),
                runs.clone(),
                shared_clock,
            )
            .with_settings(self.settings),
        );

        Harness { orchestrator, credentials, integrations, products, runs, marketplace, pool, clock }
    }
}
