//! Takealot catalogue types and the response envelope.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ShelfSyncError};
use crate::impl_domain_status_conversions;

/// Snapshot of one remote catalogue entry at fetch time.
///
/// Superseded, never mutated, by the next sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakealotProduct {
    /// Marketplace-assigned id, unique per integration.
    pub id: String,
    pub title: String,
    pub price: f64,
    /// ISO 4217 code.
    pub currency: String,
    pub availability: String,
    pub url: String,
}

/// Provenance of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    #[default]
    Manual,
    Cron,
}

impl_domain_status_conversions!(SyncType {
    Manual => "manual",
    Cron => "cron",
});

/// Input to one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakealotSyncOptions {
    /// Owner of the integration. Absent means no authenticated user.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub sync_type: SyncType,
    /// Cap on items processed in this run.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Integration to sync; defaults to the user's Takealot integration.
    #[serde(default)]
    pub integration_id: Option<String>,
}

impl TakealotSyncOptions {
    pub fn manual(user_id: impl Into<String>) -> Self {
        Self { user_id: Some(user_id.into()), sync_type: SyncType::Manual, ..Self::default() }
    }

    pub fn cron(user_id: impl Into<String>, integration_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            sync_type: SyncType::Cron,
            integration_id: Some(integration_id.into()),
            limit: None,
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Counts produced by one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub imported: u64,
    pub updated: u64,
    /// Records given up on after exhausting storage retries.
    pub skipped: u64,
}

impl SyncSummary {
    /// Records successfully written.
    pub fn total_written(&self) -> u64 {
        self.imported + self.updated
    }
}

/// Uniform result contract of every marketplace-facing operation.
///
/// `success: false` may still carry `data` when a run made partial progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakealotApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable error-kind code, e.g. `UPSTREAM_UNAVAILABLE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> TakealotApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None, code: None }
    }

    pub fn err(error: &ShelfSyncError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            code: Some(error.code().to_string()),
        }
    }

    /// Failure that still reports the progress made.
    pub fn partial(data: T, error: &ShelfSyncError) -> Self {
        Self { data: Some(data), ..Self::err(error) }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl<T> From<Result<T>> for TakealotApiResponse<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(error) => Self::err(&error),
        }
    }
}
