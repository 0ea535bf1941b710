//! Request extractors and guards.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use shelfsync_domain::constants::USER_ID_HEADER;
use shelfsync_domain::ShelfSyncError;

use crate::error::ApiError;

/// User id forwarded by the auth gateway in `x-user-id`.
///
/// Absent or blank headers yield `None`; the credential store turns that into
/// `UNAUTHENTICATED`.
#[derive(Debug, Clone, Default)]
pub struct CallerId(pub Option<String>);

impl CallerId {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// The user id, or `UNAUTHENTICATED`.
    pub fn require(&self) -> Result<&str, ApiError> {
        self.as_deref()
            .ok_or_else(|| ShelfSyncError::Unauthenticated("no user context".into()).into())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(String::from);
        Ok(Self(user))
    }
}

/// Check `Authorization: Bearer <secret>` against the configured secret.
///
/// Without a configured secret the protected endpoints are closed.
pub fn require_bearer(headers: &HeaderMap, secret: Option<&str>) -> Result<(), ApiError> {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return Err(ShelfSyncError::Unauthorized("operator endpoints are disabled".into()).into());
    };

    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| ShelfSyncError::Unauthenticated("missing bearer token".into()))?;

    if constant_time_eq(presented.as_bytes(), secret.as_bytes()) {
        Ok(())
    } else {
        Err(ShelfSyncError::Unauthenticated("invalid bearer token".into()).into())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
