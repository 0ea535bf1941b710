//! Result reporter.
//!
//! Everything that leaves the engine does so as a [`TakealotApiResponse`];
//! errors and panics below this boundary are converted, never propagated.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use shelfsync_domain::{Result, ShelfSyncError, SyncSummary, TakealotApiResponse};
use tracing::error;

/// Await `operation` and wrap its result in the response envelope.
pub async fn report<T, F>(operation: F) -> TakealotApiResponse<T>
where
    F: Future<Output = Result<T>>,
{
    guard(operation.map(TakealotApiResponse::from)).await
}

/// Await an operation that already produces an envelope, converting a panic
/// into an `INTERNAL_ERROR` response.
pub async fn guard<T, F>(operation: F) -> TakealotApiResponse<T>
where
    F: Future<Output = TakealotApiResponse<T>>,
{
    match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(panic = %message, "operation panicked");
            TakealotApiResponse::err(&ShelfSyncError::Internal(format!(
                "unexpected failure: {message}"
            )))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

/// Aggregate of a sync run that got past authorisation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub summary: SyncSummary,
    /// First failure of the run; a deadline overrides it.
    pub error: Option<ShelfSyncError>,
}

impl SyncOutcome {
    /// Keep the first error only.
    pub fn fail(&mut self, error: ShelfSyncError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Record a deadline expiry, replacing any earlier error.
    pub fn expire(&mut self, error: ShelfSyncError) {
        if !matches!(self.error, Some(ShelfSyncError::DeadlineExceeded(_))) {
            self.error = Some(error);
        }
    }

    pub fn into_response(self) -> TakealotApiResponse<SyncSummary> {
        match self.error {
            None => TakealotApiResponse::ok(self.summary),
            Some(error) => TakealotApiResponse::partial(self.summary, &error),
        }
    }
}
