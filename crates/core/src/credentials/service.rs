//! Credential store - resolves and manages integration API keys

use std::sync::Arc;

use shelfsync_common::Clock;
use shelfsync_domain::{ApiKey, Integration, Marketplace, Result, ShelfSyncError};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::ports::{IntegrationRepository, LegacyKeyRepository};

/// Key resolved for one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    pub user_id: String,
    pub integration_id: String,
    pub api_key: ApiKey,
}

/// Scoped credential store.
///
/// Every resolution reads the integration record; nothing is cached between
/// calls. The legacy key store is only consulted by [`import_legacy_key`].
///
/// [`import_legacy_key`]: CredentialStore::import_legacy_key
pub struct CredentialStore {
    integrations: Arc<dyn IntegrationRepository>,
    legacy: Option<Arc<dyn LegacyKeyRepository>>,
    clock: Arc<dyn Clock>,
}

impl CredentialStore {
    pub fn new(integrations: Arc<dyn IntegrationRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { integrations, legacy: None, clock }
    }

    /// Enable the deprecated single-key migration path.
    pub fn with_legacy_store(mut self, legacy: Arc<dyn LegacyKeyRepository>) -> Self {
        self.legacy = Some(legacy);
        self
    }

    /// Resolve the API key for a sync run.
    ///
    /// Errors: `Unauthenticated` without a user, `NotFound` without an
    /// integration, `Unauthorized` when the integration belongs to someone
    /// else or is inactive.
    #[instrument(skip(self))]
    pub async fn resolve_key(
        &self,
        user_id: Option<&str>,
        integration_id: Option<&str>,
    ) -> Result<ResolvedCredential> {
        let user_id = require_user(user_id)?;

        let integration = match integration_id {
            Some(id) => self.owned_integration(user_id, id).await?,
            None => self
                .integrations
                .find_by_user(user_id, Marketplace::Takealot)
                .await?
                .ok_or_else(|| {
                    ShelfSyncError::NotFound(format!("no takealot integration for user {user_id}"))
                })?,
        };

        if !integration.active {
            return Err(ShelfSyncError::Unauthorized(format!(
                "integration {} is inactive",
                integration.id
            )));
        }

        debug!(integration_id = %integration.id, key = %integration.api_key, "resolved credential");
        Ok(ResolvedCredential {
            user_id: integration.user_id,
            integration_id: integration.id,
            api_key: integration.api_key,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_integrations(&self, user_id: Option<&str>) -> Result<Vec<Integration>> {
        let user_id = require_user(user_id)?;
        self.integrations.list_by_user(user_id).await
    }

    /// One integration owned by the caller, active or not.
    #[instrument(skip(self))]
    pub async fn get_integration(
        &self,
        user_id: Option<&str>,
        integration_id: &str,
    ) -> Result<Integration> {
        let user_id = require_user(user_id)?;
        self.owned_integration(user_id, integration_id).await
    }

    /// Active integrations across all users, for scheduled runs.
    pub async fn list_active_integrations(&self) -> Result<Vec<Integration>> {
        self.integrations.list_active().await
    }

    /// Create the user's Takealot integration. A second one is rejected.
    #[instrument(skip(self, api_key))]
    pub async fn create_integration(
        &self,
        user_id: Option<&str>,
        name: &str,
        api_key: ApiKey,
    ) -> Result<Integration> {
        let user_id = require_user(user_id)?;

        if self.integrations.find_by_user(user_id, Marketplace::Takealot).await?.is_some() {
            return Err(ShelfSyncError::InvalidInput(
                "a takealot integration already exists for this user".into(),
            ));
        }

        let now = self.clock.unix_seconds();
        let name = name.trim();
        let integration = Integration {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            marketplace: Marketplace::Takealot,
            name: if name.is_empty() { "Takealot".to_string() } else { name.to_string() },
            api_key,
            active: true,
            created_at: now,
            updated_at: now,
        };

        self.integrations.insert(&integration).await?;
        info!(integration_id = %integration.id, key = %integration.api_key, "integration created");
        Ok(integration)
    }

    /// Replace the integration's API key.
    #[instrument(skip(self, api_key))]
    pub async fn update_api_key(
        &self,
        user_id: Option<&str>,
        integration_id: &str,
        api_key: ApiKey,
    ) -> Result<Integration> {
        let user_id = require_user(user_id)?;
        let mut integration = self.owned_integration(user_id, integration_id).await?;

        let now = self.clock.unix_seconds();
        if !self.integrations.update_api_key(integration_id, &api_key, now).await? {
            return Err(ShelfSyncError::NotFound(format!("integration {integration_id}")));
        }

        info!(integration_id, key = %api_key, "integration key rotated");
        integration.api_key = api_key;
        integration.updated_at = now;
        Ok(integration)
    }

    #[instrument(skip(self))]
    pub async fn set_active(
        &self,
        user_id: Option<&str>,
        integration_id: &str,
        active: bool,
    ) -> Result<Integration> {
        let user_id = require_user(user_id)?;
        let mut integration = self.owned_integration(user_id, integration_id).await?;

        let now = self.clock.unix_seconds();
        if !self.integrations.set_active(integration_id, active, now).await? {
            return Err(ShelfSyncError::NotFound(format!("integration {integration_id}")));
        }

        integration.active = active;
        integration.updated_at = now;
        Ok(integration)
    }

    #[instrument(skip(self))]
    pub async fn delete_integration(&self, user_id: Option<&str>, integration_id: &str) -> Result<()> {
        let user_id = require_user(user_id)?;
        self.owned_integration(user_id, integration_id).await?;

        if !self.integrations.delete(integration_id).await? {
            return Err(ShelfSyncError::NotFound(format!("integration {integration_id}")));
        }
        info!(integration_id, "integration deleted");
        Ok(())
    }

    /// Deprecated single-key migration.
    ///
    /// When the user already has an integration this is a no-op returning it.
    /// Otherwise the supplied key (or, without one, the legacy document) seeds
    /// a new integration.
    #[instrument(skip(self, api_key))]
    pub async fn import_legacy_key(
        &self,
        user_id: Option<&str>,
        api_key: Option<ApiKey>,
    ) -> Result<Integration> {
        let user_id = require_user(user_id)?;

        if let Some(existing) =
            self.integrations.find_by_user(user_id, Marketplace::Takealot).await?
        {
            warn!(integration_id = %existing.id, "legacy key import ignored, integration exists");
            return Ok(existing);
        }

        let api_key = match api_key {
            Some(key) => key,
            None => {
                let legacy = self.legacy.as_ref().ok_or_else(|| {
                    ShelfSyncError::NotFound("legacy key store is not configured".into())
                })?;
                legacy.find_legacy_key(user_id).await?.ok_or_else(|| {
                    ShelfSyncError::NotFound(format!("no legacy key for user {user_id}"))
                })?
            }
        };

        warn!("migrating deprecated single-key credential into an integration");
        self.create_integration(Some(user_id), "Takealot", api_key).await
    }

    async fn owned_integration(&self, user_id: &str, integration_id: &str) -> Result<Integration> {
        let integration = self
            .integrations
            .find_by_id(integration_id)
            .await?
            .ok_or_else(|| ShelfSyncError::NotFound(format!("integration {integration_id}")))?;

        if !integration.is_owned_by(user_id) {
            warn!(integration_id, "integration owned by another user");
            return Err(ShelfSyncError::Unauthorized(format!(
                "integration {integration_id} does not belong to the caller"
            )));
        }
        Ok(integration)
    }
}

fn require_user(user_id: Option<&str>) -> Result<&str> {
    match user_id.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(ShelfSyncError::Unauthenticated("no user context".into())),
    }
}
