//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for ShelfSync
///
/// Every variant maps to a stable machine-readable [`code`](Self::code) that
/// travels in the `TakealotApiResponse` envelope next to the human message.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ShelfSyncError {
    /// No user context was supplied.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// The caller does not own the integration, or it is inactive.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The marketplace throttled the request.
    #[error("Upstream rate limited: {0}")]
    UpstreamRateLimited(String),

    /// The marketplace (or every egress path to it) was unreachable.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// Another run already holds the sync lock for this integration.
    #[error("Sync in progress: {0}")]
    SyncInProgress(String),

    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShelfSyncError {
    /// Stable error-kind code carried in API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::UpstreamRateLimited(_) => "UPSTREAM_RATE_LIMITED",
            Self::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Self::StorageFailure(_) => "STORAGE_FAILURE",
            Self::SyncInProgress(_) => "SYNC_IN_PROGRESS",
            Self::DeadlineExceeded(_) => "DEADLINE_EXCEEDED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether retrying through another egress path may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::UpstreamRateLimited(_) | Self::UpstreamUnavailable(_) | Self::DeadlineExceeded(_)
        )
    }

    /// The message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthenticated(m)
            | Self::Unauthorized(m)
            | Self::NotFound(m)
            | Self::UpstreamRateLimited(m)
            | Self::UpstreamUnavailable(m)
            | Self::StorageFailure(m)
            | Self::SyncInProgress(m)
            | Self::DeadlineExceeded(m)
            | Self::InvalidInput(m)
            | Self::Config(m)
            | Self::Internal(m) => m,
        }
    }
}

/// Result type alias for ShelfSync operations
pub type Result<T> = std::result::Result<T, ShelfSyncError>;
