//! Sync-run history records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::takealot::{SyncSummary, SyncType, TakealotApiResponse};
use crate::impl_domain_status_conversions;

/// Final state of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncRunStatus {
    /// Every page fetched and every record written.
    Succeeded,
    /// Failed after writing at least one record.
    Partial,
    /// Failed without writing anything.
    Failed,
}

impl_domain_status_conversions!(SyncRunStatus {
    Succeeded => "succeeded",
    Partial => "partial",
    Failed => "failed",
});

/// Outcome of one sync run, kept for the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRunRecord {
    pub id: String,
    pub user_id: String,
    pub integration_id: String,
    pub sync_type: SyncType,
    pub status: SyncRunStatus,
    pub imported: u64,
    pub updated: u64,
    pub skipped: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Epoch seconds.
    pub started_at: i64,
    pub finished_at: i64,
}

impl SyncRunRecord {
    /// Build a record from the response a run produced.
    pub fn from_response(
        user_id: &str,
        integration_id: &str,
        sync_type: SyncType,
        response: &TakealotApiResponse<SyncSummary>,
        started_at: i64,
        finished_at: i64,
    ) -> Self {
        let summary = response.data.unwrap_or_default();
        let status = if response.success {
            SyncRunStatus::Succeeded
        } else if summary.total_written() > 0 {
            SyncRunStatus::Partial
        } else {
            SyncRunStatus::Failed
        };

        Self {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            integration_id: integration_id.to_string(),
            sync_type,
            status,
            imported: summary.imported,
            updated: summary.updated,
            skipped: summary.skipped,
            error: response.error.clone(),
            error_code: response.code.clone(),
            started_at,
            finished_at,
        }
    }
}
