//! Read access to the deprecated single-key store.
//!
//! Before per-integration records existed each user had one Takealot key.
//! The table is only read by the legacy import path.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use shelfsync_core::LegacyKeyRepository;
use shelfsync_domain::{ApiKey, Result};
use tokio::task;
use tracing::warn;

use super::manager::DbManager;
use crate::errors::{map_join_error, map_sql_error};

pub struct SqliteLegacyKeyRepository {
    db: Arc<DbManager>,
}

impl SqliteLegacyKeyRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LegacyKeyRepository for SqliteLegacyKeyRepository {
    async fn find_legacy_key(&self, user_id: &str) -> Result<Option<ApiKey>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();

        task::spawn_blocking(move || -> Result<Option<ApiKey>> {
            let conn = db.get_connection()?;
            let raw: Option<String> = conn
                .query_row(
                    "SELECT api_key FROM legacy_api_keys WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_sql_error)?;

            Ok(raw.and_then(|key| match ApiKey::parse(key) {
                Ok(key) => Some(key),
                Err(_) => {
                    warn!(%user_id, "ignoring blank legacy key");
                    None
                }
            }))
        })
        .await
        .map_err(map_join_error)?
    }
}
