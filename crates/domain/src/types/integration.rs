//! Marketplace integrations and their credentials.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::KEY_FINGERPRINT_LEN;
use crate::errors::{Result, ShelfSyncError};
use crate::impl_domain_status_conversions;

/// Marketplace an integration connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    #[default]
    Takealot,
}

impl_domain_status_conversions!(Marketplace {
    Takealot => "takealot",
});

/// Marketplace API key.
///
/// `Debug` and `Display` never print the secret; use [`fingerprint`](Self::fingerprint)
/// to identify a key in logs or API responses.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct ApiKey(String);

impl ApiKey {
    /// Trimmed, non-empty key.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ShelfSyncError::InvalidInput("API key must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The raw secret, for the outbound `Authorization` header and storage.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters of the key's SHA-256 digest.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(KEY_FINGERPRINT_LEN);
        hex
    }
}

impl TryFrom<String> for ApiKey {
    type Error = ShelfSyncError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", self.fingerprint())
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key:{}", self.fingerprint())
    }
}

/// A user's configured connection to a marketplace.
///
/// At most one integration exists per `(user_id, marketplace)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integration {
    pub id: String,
    pub user_id: String,
    pub marketplace: Marketplace,
    pub name: String,
    pub api_key: ApiKey,
    pub active: bool,
    /// Epoch seconds.
    pub created_at: i64,
    pub updated_at: i64,
}

impl Integration {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// API view of an integration; the key is reduced to its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationSummary {
    pub id: String,
    pub user_id: String,
    pub marketplace: Marketplace,
    pub name: String,
    pub active: bool,
    pub key_fingerprint: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&Integration> for IntegrationSummary {
    fn from(integration: &Integration) -> Self {
        Self {
            id: integration.id.clone(),
            user_id: integration.user_id.clone(),
            marketplace: integration.marketplace,
            name: integration.name.clone(),
            active: integration.active,
            key_fingerprint: integration.api_key.fingerprint(),
            created_at: integration.created_at,
            updated_at: integration.updated_at,
        }
    }
}
