use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use shelfsync_core::CatalogScope;
use shelfsync_domain::{Marketplace, ShelfSyncError, TakealotApiResponse, TakealotProduct};

use super::AppState;
use crate::error::ApiResult;
use crate::extract::CallerId;

const DEFAULT_PAGE_LIMIT: u32 = 50;
const MAX_PAGE_LIMIT: u32 = 500;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductQuery {
    integration_id: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductPage {
    integration_id: String,
    items: Vec<TakealotProduct>,
    total: u64,
    limit: u32,
    offset: u32,
}

/// GET /api/v1/takealot/products -- defaults to the caller's Takealot
/// integration.
async fn list_products(
    State(ctx): State<AppState>,
    caller: CallerId,
    query: Result<Query<ProductQuery>, QueryRejection>,
) -> ApiResult<Json<TakealotApiResponse<ProductPage>>> {
    let user_id = caller.require()?;
    let Query(query) = query?;

    let integration = match query.integration_id.as_deref() {
        Some(id) => ctx.credentials.get_integration(Some(user_id), id).await?,
        None => ctx
            .credentials
            .list_integrations(Some(user_id))
            .await?
            .into_iter()
            .find(|i| i.marketplace == Marketplace::Takealot)
            .ok_or_else(|| ShelfSyncError::NotFound(format!("no takealot integration for user {user_id}")))?,
    };

    let scope = CatalogScope::new(user_id, &integration.id);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let items = ctx.products.list_products(&scope, limit, offset).await?;
    let total = ctx.products.count_products(&scope).await?;

    Ok(Json(TakealotApiResponse::ok(ProductPage {
        integration_id: integration.id,
        items,
        total,
        limit,
        offset,
    })))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/takealot/products", get(list_products))
}
