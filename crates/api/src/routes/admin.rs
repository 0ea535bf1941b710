//! Operator endpoints, guarded by the cron bearer secret.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use shelfsync_domain::{ProxyStatus, SyncRunRecord, TakealotApiResponse};

use super::AppState;
use crate::error::ApiResult;
use crate::extract::require_bearer;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResult {
    endpoints: usize,
}

/// Last run per integration.
async fn sync_status(
    State(ctx): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<TakealotApiResponse<Vec<SyncRunRecord>>>> {
    require_bearer(&headers, ctx.config.server.cron_secret.as_deref())?;
    let mut runs = ctx.orchestrator.latest_runs().await?;
    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Ok(Json(TakealotApiResponse::ok(runs)))
}

async fn proxy_status(
    State(ctx): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<TakealotApiResponse<Vec<ProxyStatus>>>> {
    require_bearer(&headers, ctx.config.server.cron_secret.as_deref())?;
    Ok(Json(TakealotApiResponse::ok(ctx.proxy_pool.status())))
}

async fn refresh_proxies(
    State(ctx): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<TakealotApiResponse<RefreshResult>>> {
    require_bearer(&headers, ctx.config.server.cron_secret.as_deref())?;
    let endpoints = ctx.refresh_proxies().await?;
    Ok(Json(TakealotApiResponse::ok(RefreshResult { endpoints })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/sync-status", get(sync_status))
        .route("/admin/proxies", get(proxy_status))
        .route("/admin/proxies/refresh", post(refresh_proxies))
}
