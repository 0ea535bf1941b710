//! Application context - dependency injection container

use std::sync::Arc;

use serde::Serialize;
use shelfsync_common::{Clock, SystemClock};
use shelfsync_core::{
    CredentialStore, ProductStore, ProxyPool, ProxyPoolConfig, ProxyRotator, ProxySource,
    RotationPolicy, SyncOrchestrator, SyncSettings,
};
use shelfsync_domain::{AppConfig, ProxyHealthState, Result, ShelfSyncError};
use shelfsync_infra::{
    DbManager, SqliteIntegrationRepository, SqliteLegacyKeyRepository, SqliteProductStore,
    SqliteSyncRunRepository, SyncScheduler, SyncSchedulerConfig, TakealotClient,
    WebshareProxySource,
};
use tracing::{info, instrument, warn};

/// Health snapshot served by `GET /health`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub database_healthy: bool,
    pub proxies_total: usize,
    pub proxies_healthy: usize,
}

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: AppConfig,
    pub db: Arc<DbManager>,
    pub credentials: Arc<CredentialStore>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub products: Arc<dyn ProductStore>,
    pub proxy_pool: Arc<ProxyPool>,
    proxy_source: Option<Arc<dyn ProxySource>>,
}

impl AppContext {
    /// Open the database and wire every service from `config`.
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(DbManager::open(&config.database)?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let credentials = Arc::new(
            CredentialStore::new(
                Arc::new(SqliteIntegrationRepository::new(db.clone())),
                clock.clone(),
            )
            .with_legacy_store(Arc::new(SqliteLegacyKeyRepository::new(db.clone()))),
        );

        let proxy_pool = Arc::new(ProxyPool::new(
            config.proxy.endpoints.clone(),
            ProxyPoolConfig::from(&config.proxy),
            clock.clone(),
        ));
        let rotator =
            Arc::new(ProxyRotator::new(proxy_pool.clone(), RotationPolicy::from(&config.proxy)));

        let proxy_source: Option<Arc<dyn ProxySource>> = match &config.proxy.webshare {
            Some(webshare) => Some(Arc::new(WebshareProxySource::new(webshare)?)),
            None => None,
        };

        let products: Arc<dyn ProductStore> = Arc::new(SqliteProductStore::new(db.clone()));
        let orchestrator = Arc::new(
            SyncOrchestrator::new(
                credentials.clone(),
                Arc::new(TakealotClient::new(&config.takealot)?),
                rotator,
                products.clone(),
                Arc::new(SqliteSyncRunRepository::new(db.clone())),
                clock,
            )
            .with_settings(SyncSettings::from_config(&config.sync, &config.takealot)),
        );

        info!(
            db_path = %db.path().display(),
            static_proxies = proxy_pool.len(),
            allow_direct = config.proxy.allow_direct,
            webshare = proxy_source.is_some(),
            "application context initialised"
        );
        if proxy_pool.is_empty() && !config.proxy.allow_direct && proxy_source.is_none() {
            warn!("no proxies configured and direct egress disabled; syncs will fail");
        }

        Ok(Self { config, db, credentials, orchestrator, products, proxy_pool, proxy_source })
    }

    pub fn has_proxy_source(&self) -> bool {
        self.proxy_source.is_some()
    }

    /// Reload the proxy pool from Webshare, keeping the static endpoints.
    #[instrument(skip(self))]
    pub async fn refresh_proxies(&self) -> Result<usize> {
        let source = self.proxy_source.as_ref().ok_or_else(|| {
            ShelfSyncError::InvalidInput("no proxy source is configured".into())
        })?;
        let size = self.proxy_pool.refresh_from(source.as_ref(), &self.config.proxy.endpoints).await?;
        info!(endpoints = size, "proxy pool refreshed");
        Ok(size)
    }

    /// Scheduler over this context's services; not started.
    pub fn scheduler(&self) -> SyncScheduler {
        SyncScheduler::new(
            self.credentials.clone(),
            self.orchestrator.clone(),
            SyncSchedulerConfig::from(&self.config.scheduler),
        )
    }

    pub async fn health_check(&self) -> HealthStatus {
        let db = self.db.clone();
        let database_healthy = tokio::task::spawn_blocking(move || db.health_check())
            .await
            .map(|result| result.is_ok())
            .unwrap_or(false);

        let proxies = self.proxy_pool.status();
        let proxies_healthy =
            proxies.iter().filter(|p| p.state == ProxyHealthState::Healthy).count();

        HealthStatus {
            status: if database_healthy { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            database_healthy,
            proxies_total: proxies.len(),
            proxies_healthy,
        }
    }
}
