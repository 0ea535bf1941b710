//! Sync triggers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use serde::Deserialize;
use shelfsync_domain::{SyncType, TakealotSyncOptions};
use tracing::info;

use super::{optional_json, AppState};
use crate::error::{sync_response, ApiResult};
use crate::extract::{require_bearer, CallerId};

/// Body of a manual trigger; the user comes from the gateway header.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManualSyncRequest {
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    integration_id: Option<String>,
}

/// POST /api/v1/takealot/sync
async fn manual_sync(
    State(ctx): State<AppState>,
    caller: CallerId,
    body: Bytes,
) -> ApiResult<Response> {
    let request: ManualSyncRequest = optional_json(&body)?;
    let options = TakealotSyncOptions {
        user_id: caller.0,
        sync_type: SyncType::Manual,
        limit: request.limit,
        integration_id: request.integration_id,
    };

    Ok(sync_response(ctx.orchestrator.run_sync(options).await))
}

/// POST /api/v1/cron/takealot-sync -- the caller names the user explicitly.
async fn cron_sync(
    State(ctx): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    require_bearer(&headers, ctx.config.server.cron_secret.as_deref())?;

    let mut options: TakealotSyncOptions = optional_json(&body)?;
    options.sync_type = SyncType::Cron;
    info!(user_id = ?options.user_id, integration_id = ?options.integration_id, "cron trigger");

    Ok(sync_response(ctx.orchestrator.run_sync(options).await))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/takealot/sync", post(manual_sync))
        .route("/cron/takealot-sync", post(cron_sync))
}
