use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shelfsync_domain::{ShelfSyncError, SyncSummary, TakealotApiResponse};

/// Application-level error type for HTTP handlers.
///
/// Every variant is rendered as a `TakealotApiResponse` envelope with the
/// status that follows its error kind.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] ShelfSyncError),

    /// Malformed request body or query string.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type ApiResult<T> = Result<T, ApiError>;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// HTTP status for a stable error-kind code.
///
/// An exhausted proxy pool is a local capacity problem and maps to 503; any
/// other unreachable upstream is a bad gateway.
pub fn status_for(error: &ShelfSyncError) -> StatusCode {
    match error {
        ShelfSyncError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        ShelfSyncError::Unauthorized(_) => StatusCode::FORBIDDEN,
        ShelfSyncError::NotFound(_) => StatusCode::NOT_FOUND,
        ShelfSyncError::SyncInProgress(_) => StatusCode::CONFLICT,
        ShelfSyncError::UpstreamRateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        ShelfSyncError::UpstreamUnavailable(message) if is_pool_exhausted(message) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ShelfSyncError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        ShelfSyncError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
        ShelfSyncError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ShelfSyncError::StorageFailure(_)
        | ShelfSyncError::Config(_)
        | ShelfSyncError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn is_pool_exhausted(message: &str) -> bool {
    message.contains(shelfsync_domain::constants::PROXY_POOL_EXHAUSTED_MESSAGE)
}

/// Status for an envelope that carries only a code.
fn status_for_code(code: Option<&str>, message: Option<&str>) -> StatusCode {
    let message = message.unwrap_or_default();
    match code {
        Some("UNAUTHENTICATED") => StatusCode::UNAUTHORIZED,
        Some("UNAUTHORIZED") => StatusCode::FORBIDDEN,
        Some("NOT_FOUND") => StatusCode::NOT_FOUND,
        Some("SYNC_IN_PROGRESS") => StatusCode::CONFLICT,
        Some("UPSTREAM_RATE_LIMITED") => StatusCode::TOO_MANY_REQUESTS,
        Some("UPSTREAM_UNAVAILABLE") if is_pool_exhausted(message) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        Some("UPSTREAM_UNAVAILABLE") => StatusCode::BAD_GATEWAY,
        Some("DEADLINE_EXCEEDED") => StatusCode::GATEWAY_TIMEOUT,
        Some("INVALID_INPUT") => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render a sync envelope.
///
/// Runs that made progress answer 200 even when `success` is false; a run
/// that wrote nothing answers with the status of its error kind.
pub fn sync_response(response: TakealotApiResponse<SyncSummary>) -> Response {
    let progressed = response
        .data
        .is_some_and(|summary| summary.total_written() + summary.skipped > 0);

    let status = if response.success || progressed {
        StatusCode::OK
    } else {
        status_for_code(response.code.as_deref(), response.error.as_deref())
    };
    (status, Json(response)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = match self {
            Self::Domain(error) => error,
            Self::BadRequest(message) => ShelfSyncError::InvalidInput(message),
        };
        let status = status_for(&error);

        let error = match error {
            ShelfSyncError::Internal(message) | ShelfSyncError::Config(message) => {
                tracing::error!(error = %message, "Internal error");
                ShelfSyncError::Internal("An internal error occurred".into())
            }
            ShelfSyncError::StorageFailure(message) => {
                tracing::error!(error = %message, "Storage error");
                ShelfSyncError::StorageFailure("The local store is unavailable".into())
            }
            other => other,
        };

        (status, Json(TakealotApiResponse::<()>::err(&error))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (ShelfSyncError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (ShelfSyncError::Unauthorized("x".into()), StatusCode::FORBIDDEN),
            (ShelfSyncError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ShelfSyncError::SyncInProgress("x".into()), StatusCode::CONFLICT),
            (ShelfSyncError::UpstreamRateLimited("x".into()), StatusCode::TOO_MANY_REQUESTS),
            (ShelfSyncError::UpstreamUnavailable("x".into()), StatusCode::BAD_GATEWAY),
            (
                ShelfSyncError::UpstreamUnavailable("proxy pool exhausted".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (ShelfSyncError::DeadlineExceeded("x".into()), StatusCode::GATEWAY_TIMEOUT),
            (ShelfSyncError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (ShelfSyncError::StorageFailure("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(status_for(&error), status, "{error}");
            let envelope = TakealotApiResponse::<()>::err(&error);
            assert_eq!(
                status_for_code(envelope.code.as_deref(), envelope.error.as_deref()),
                status,
                "{error}"
            );
        }
    }

    #[test]
    fn partial_sync_answers_ok() {
        let summary = SyncSummary { imported: 3, updated: 0, skipped: 1 };
        let partial = TakealotApiResponse::partial(
            summary,
            &ShelfSyncError::UpstreamUnavailable("page 2".into()),
        );
        assert_eq!(sync_response(partial).status(), StatusCode::OK);

        let empty = TakealotApiResponse::partial(
            SyncSummary::default(),
            &ShelfSyncError::UpstreamUnavailable("proxy pool exhausted".into()),
        );
        assert_eq!(sync_response(empty).status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let response =
            ApiError::from(ShelfSyncError::Internal("sqlite path /secret/db".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
