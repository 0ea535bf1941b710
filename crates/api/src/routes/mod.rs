//! HTTP routes mounted under `/api/v1`, plus the root-level health check.

use std::sync::Arc;

use axum::Router;
use serde::de::DeserializeOwned;

use crate::context::AppContext;
use crate::error::{ApiError, ApiResult};

pub mod admin;
pub mod health;
pub mod integrations;
pub mod products;
pub mod sync;

/// Shared handler state.
pub type AppState = Arc<AppContext>;

/// Every `/api/v1` route.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(sync::router())
        .merge(integrations::router())
        .merge(products::router())
        .merge(admin::router())
}

/// Parse a JSON body that may be omitted entirely.
fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}
