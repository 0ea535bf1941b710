//! Integration CRUD and the deprecated single-key import.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use shelfsync_domain::{ApiKey, IntegrationSummary, TakealotApiResponse};

use super::{optional_json, AppState};
use crate::error::{ApiError, ApiResult};
use crate::extract::CallerId;

type Envelope<T> = Json<TakealotApiResponse<T>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateIntegrationRequest {
    #[serde(default)]
    name: Option<String>,
    api_key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateIntegrationRequest {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyImportRequest {
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletedIntegration {
    id: String,
    products_removed: u64,
    runs_removed: u64,
}

async fn list_integrations(
    State(ctx): State<AppState>,
    caller: CallerId,
) -> ApiResult<Envelope<Vec<IntegrationSummary>>> {
    let integrations = ctx.credentials.list_integrations(caller.as_deref()).await?;
    Ok(Json(TakealotApiResponse::ok(integrations.iter().map(IntegrationSummary::from).collect())))
}

async fn create_integration(
    State(ctx): State<AppState>,
    caller: CallerId,
    payload: Result<Json<CreateIntegrationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Envelope<IntegrationSummary>)> {
    let user_id = caller.require()?;
    let Json(request) = payload?;
    let api_key = ApiKey::parse(&request.api_key)?;

    let integration = ctx
        .credentials
        .create_integration(Some(user_id), request.name.as_deref().unwrap_or_default(), api_key)
        .await?;
    Ok((StatusCode::CREATED, Json(TakealotApiResponse::ok(IntegrationSummary::from(&integration)))))
}

/// PUT rotates the key and/or toggles `active`.
async fn update_integration(
    State(ctx): State<AppState>,
    caller: CallerId,
    Path(id): Path<String>,
    payload: Result<Json<UpdateIntegrationRequest>, JsonRejection>,
) -> ApiResult<Envelope<IntegrationSummary>> {
    let user_id = caller.require()?;
    let Json(request) = payload?;

    let api_key = request.api_key.as_deref().map(ApiKey::parse).transpose()?;
    let mut updated = None;
    if let Some(api_key) = api_key {
        updated = Some(ctx.credentials.update_api_key(Some(user_id), &id, api_key).await?);
    }
    if let Some(active) = request.active {
        updated = Some(ctx.credentials.set_active(Some(user_id), &id, active).await?);
    }

    let integration = updated
        .ok_or_else(|| ApiError::BadRequest("expected apiKey and/or active".into()))?;
    Ok(Json(TakealotApiResponse::ok(IntegrationSummary::from(&integration))))
}

/// DELETE removes the integration, its synced products and its run history.
/// Refused with 409 while a sync of the integration is running.
async fn delete_integration(
    State(ctx): State<AppState>,
    caller: CallerId,
    Path(id): Path<String>,
) -> ApiResult<Envelope<DeletedIntegration>> {
    let user_id = caller.require()?;
    let removal = ctx.orchestrator.remove_integration(Some(user_id), &id).await?;

    Ok(Json(TakealotApiResponse::ok(DeletedIntegration {
        id,
        products_removed: removal.products_removed,
        runs_removed: removal.runs_removed,
    })))
}

async fn legacy_import(
    State(ctx): State<AppState>,
    caller: CallerId,
    body: Bytes,
) -> ApiResult<Envelope<IntegrationSummary>> {
    let user_id = caller.require()?;
    let request: LegacyImportRequest = optional_json(&body)?;
    let api_key = request.api_key.as_deref().map(ApiKey::parse).transpose()?;

    let integration = ctx.credentials.import_legacy_key(Some(user_id), api_key).await?;
    Ok(Json(TakealotApiResponse::ok(IntegrationSummary::from(&integration))))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/takealot/integrations", get(list_integrations).post(create_integration))
        .route("/takealot/integrations/legacy-import", post(legacy_import))
        .route("/takealot/integrations/{id}", put(update_integration).delete(delete_integration))
}
