//! Port interfaces for integration credentials

use async_trait::async_trait;
use shelfsync_domain::{ApiKey, Integration, Marketplace, Result};

/// Persistent integration records.
#[async_trait]
pub trait IntegrationRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Integration>>;

    /// The user's integration for `marketplace`; at most one exists.
    async fn find_by_user(
        &self,
        user_id: &str,
        marketplace: Marketplace,
    ) -> Result<Option<Integration>>;

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Integration>>;

    async fn list_active(&self) -> Result<Vec<Integration>>;

    /// Fails with `InvalidInput` when the user already has an integration for
    /// the marketplace.
    async fn insert(&self, integration: &Integration) -> Result<()>;

    /// Returns `false` when no row matched.
    async fn update_api_key(&self, id: &str, api_key: &ApiKey, updated_at: i64) -> Result<bool>;

    async fn set_active(&self, id: &str, active: bool, updated_at: i64) -> Result<bool>;

    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Read-only view of the deprecated single-key-per-user documents.
#[async_trait]
pub trait LegacyKeyRepository: Send + Sync {
    async fn find_legacy_key(&self, user_id: &str) -> Result<Option<ApiKey>>;
}
