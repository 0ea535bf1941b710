//! Shared fixtures for `shelfsync-infra` integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use shelfsync_common::SystemClock;
use shelfsync_core::{
    CredentialStore, ProxyPool, ProxyPoolConfig, ProxyRotator, RotationPolicy, SyncOrchestrator,
    SyncSettings,
};
use shelfsync_domain::{ApiKey, Integration, ProxyEndpoint, TakealotConfig};
use shelfsync_infra::{
    DbManager, SqliteIntegrationRepository, SqliteProductStore, SqliteSyncRunRepository,
    TakealotClient,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const OFFERS_PATH: &str = "/v2/offers";

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a migrated database in a fresh temp directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let manager =
            DbManager::new(temp_dir.path().join("test.db"), 4).expect("db manager should be created");
        manager.run_migrations().expect("migrations should apply");
        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    /// Execute a batch of SQL statements against the database.
    pub fn execute_batch(&self, sql: &str) {
        let conn = self
            .manager
            .get_connection()
            .expect("connection should be available for execute_batch");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Offer documents `first..first + count` in the `/v2/offers` wire format.
pub fn offers_json(first: u32, count: u32) -> Vec<Value> {
    (first..first + count)
        .map(|id| {
            json!({
                "offer_id": id,
                "tsin_id": 90_000 + id,
                "sku": format!("SKU-{id}"),
                "title": format!("Product {id}"),
                "selling_price": f64::from(id) * 10.0,
                "status": "Buyable",
                "offer_url": format!("https://www.takealot.com/p/{id}"),
            })
        })
        .collect()
}

/// Serve `total` offers in pages of `page_size`, reporting the total.
pub async fn mount_offer_pages(server: &MockServer, total: u32, page_size: u32) {
    let pages = total.div_ceil(page_size).max(1);
    for page in 1..=pages {
        let first = (page - 1) * page_size + 1;
        let count = page_size.min(total.saturating_sub(first - 1));
        Mock::given(method("GET"))
            .and(path(OFFERS_PATH))
            .and(query_param("page_number", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "offers": offers_json(first, count),
                "page_summary": { "total": total },
            })))
            .mount(server)
            .await;
    }
}

pub fn takealot_config(base_url: &str) -> TakealotConfig {
    TakealotConfig { base_url: base_url.to_string(), request_timeout_secs: 5, page_size: 20 }
}

pub fn integration(id: &str, user_id: &str, key: &str) -> Integration {
    Integration {
        id: id.to_string(),
        user_id: user_id.to_string(),
        marketplace: shelfsync_domain::Marketplace::Takealot,
        name: format!("{user_id} store"),
        api_key: ApiKey::parse(key).expect("valid key"),
        active: true,
        created_at: 1_700_000_000,
        updated_at: 1_700_000_000,
    }
}

/// Fully wired services over SQLite and the real Takealot client.
pub struct Services {
    pub credentials: Arc<CredentialStore>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub integrations: Arc<SqliteIntegrationRepository>,
    pub products: Arc<SqliteProductStore>,
    pub runs: Arc<SqliteSyncRunRepository>,
    pub pool: Arc<ProxyPool>,
}

/// Wire services against `base_url`. With no proxies, direct egress is used.
pub fn services(db: &TestDatabase, base_url: &str, proxies: Vec<ProxyEndpoint>) -> Services {
    let clock = Arc::new(SystemClock);
    let allow_direct = proxies.is_empty();

    let integrations = Arc::new(SqliteIntegrationRepository::new(db.manager.clone()));
    let products = Arc::new(SqliteProductStore::new(db.manager.clone()));
    let runs = Arc::new(SqliteSyncRunRepository::new(db.manager.clone()));
    let credentials = Arc::new(CredentialStore::new(integrations.clone(), clock.clone()));

    let pool = Arc::new(ProxyPool::new(
        proxies,
        ProxyPoolConfig { failure_threshold: 1, cooldown: Duration::from_secs(60) },
        clock.clone(),
    ));
    let rotator = Arc::new(ProxyRotator::new(
        pool.clone(),
        RotationPolicy { max_attempts: 3, allow_direct },
    ));
    let client = TakealotClient::new(&takealot_config(base_url)).expect("takealot client");

    let orchestrator = Arc::new(
        SyncOrchestrator::new(
            credentials.clone(),
            Arc::new(client),
            rotator,
            products.clone(),
            runs.clone(),
            clock,
        )
        .with_settings(SyncSettings {
            page_size: 20,
            run_deadline: Duration::from_secs(30),
            ..SyncSettings::default()
        }),
    );

    Services { credentials, orchestrator, integrations, products, runs, pool }
}
