use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use shelfsync_domain::TakealotApiResponse;

use super::AppState;
use crate::context::HealthStatus;

/// GET /health -- service and database health.
async fn health_check(
    State(ctx): State<AppState>,
) -> (StatusCode, Json<TakealotApiResponse<HealthStatus>>) {
    let health = ctx.health_check().await;
    let status =
        if health.database_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(TakealotApiResponse::ok(health)))
}

/// Mount health check routes (root level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
