//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use reqwest::StatusCode;
use rusqlite::Error as SqlError;
use shelfsync_domain::ShelfSyncError;
use tokio::task::JoinError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ShelfSyncError);

impl From<InfraError> for ShelfSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ShelfSyncError> for InfraError {
    fn from(value: ShelfSyncError) -> Self {
        InfraError(value)
    }
}

trait IntoShelfSyncError {
    fn into_shelfsync(self) -> ShelfSyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → ShelfSyncError */
/* -------------------------------------------------------------------------- */

const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;

impl IntoShelfSyncError for SqlError {
    fn into_shelfsync(self) -> ShelfSyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        ShelfSyncError::StorageFailure("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        ShelfSyncError::StorageFailure("database is locked".into())
                    }
                    (
                        ErrorCode::ConstraintViolation,
                        SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY,
                    ) => ShelfSyncError::StorageFailure("unique constraint violation".into()),
                    _ => ShelfSyncError::StorageFailure(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                ShelfSyncError::NotFound("no rows returned by query".into())
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                ShelfSyncError::StorageFailure(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidPath(path) => ShelfSyncError::Config(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => ShelfSyncError::StorageFailure(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_shelfsync())
    }
}

/// Whether the statement failed on a UNIQUE or PRIMARY KEY constraint.
pub(crate) fn is_unique_violation(err: &SqlError) -> bool {
    matches!(
        err,
        SqlError::SqliteFailure(ffi, _)
            if ffi.code == rusqlite::ffi::ErrorCode::ConstraintViolation
                && matches!(ffi.extended_code, SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

pub(crate) fn map_sql_error(err: SqlError) -> ShelfSyncError {
    ShelfSyncError::from(InfraError::from(err))
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → ShelfSyncError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(ShelfSyncError::StorageFailure(format!(
            "connection pool unavailable: {value}"
        )))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ShelfSyncError */
/* -------------------------------------------------------------------------- */

impl IntoShelfSyncError for HttpError {
    fn into_shelfsync(self) -> ShelfSyncError {
        if self.is_timeout() {
            return ShelfSyncError::UpstreamUnavailable("HTTP request timed out".into());
        }

        if self.is_connect() {
            return ShelfSyncError::UpstreamUnavailable("HTTP connection failure".into());
        }

        if self.is_builder() {
            return ShelfSyncError::Config(format!("invalid HTTP request: {self}"));
        }

        if let Some(status) = self.status() {
            return error_for_status(status, "upstream");
        }

        if self.is_decode() {
            return ShelfSyncError::UpstreamUnavailable(format!(
                "malformed upstream response: {self}"
            ));
        }

        ShelfSyncError::UpstreamUnavailable(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_shelfsync())
    }
}

/// Map a non-success HTTP status to the error kind callers act on.
///
/// 401/403 → `Unauthorized`, 404 → `NotFound`, 429 → `UpstreamRateLimited`,
/// 5xx → `UpstreamUnavailable`, any other 4xx → `InvalidInput`.
pub fn error_for_status(status: StatusCode, context: &str) -> ShelfSyncError {
    let message = format!(
        "{context}: HTTP {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("unknown status")
    );

    match status.as_u16() {
        401 | 403 => ShelfSyncError::Unauthorized(message),
        404 => ShelfSyncError::NotFound(message),
        429 => ShelfSyncError::UpstreamRateLimited(message),
        400..=499 => ShelfSyncError::InvalidInput(message),
        _ => ShelfSyncError::UpstreamUnavailable(message),
    }
}

/* -------------------------------------------------------------------------- */
/* tokio::task::JoinError → ShelfSyncError */
/* -------------------------------------------------------------------------- */

pub(crate) fn map_join_error(err: JoinError) -> ShelfSyncError {
    if err.is_cancelled() {
        ShelfSyncError::Internal("blocking task cancelled".into())
    } else {
        ShelfSyncError::Internal(format!("blocking task failed: {err}"))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
