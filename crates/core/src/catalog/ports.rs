//! Port interfaces for the local product catalogue

use async_trait::async_trait;
use shelfsync_domain::{Result, TakealotProduct};

/// Namespace products are stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogScope {
    pub user_id: String,
    pub integration_id: String,
}

impl CatalogScope {
    pub fn new(user_id: impl Into<String>, integration_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), integration_id: integration_id.into() }
    }
}

/// What an upsert did to the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// The stored snapshot is newer and was kept.
    Stale,
}

/// Document store keyed by product id within a [`CatalogScope`].
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Insert the product, or replace the stored snapshot when `synced_at` is
    /// not older than the stored one.
    async fn upsert_product(
        &self,
        scope: &CatalogScope,
        product: &TakealotProduct,
        synced_at: i64,
    ) -> Result<UpsertOutcome>;

    /// Products ordered by id.
    async fn list_products(
        &self,
        scope: &CatalogScope,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<TakealotProduct>>;

    async fn count_products(&self, scope: &CatalogScope) -> Result<u64>;

    /// Remove every product of an integration; returns the number removed.
    async fn delete_scope(&self, scope: &CatalogScope) -> Result<u64>;
}
