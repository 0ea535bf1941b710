//! Per-integration product document store.
//!
//! Each product is one JSON document keyed by `(user_id, integration_id,
//! product_id)`. Writes are last-writer-wins on `synced_at`: a document is
//! only replaced by one synced at the same time or later.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, TransactionBehavior};
use shelfsync_core::{CatalogScope, ProductStore, UpsertOutcome};
use shelfsync_domain::{Result, ShelfSyncError, TakealotProduct};
use tokio::task;

use super::manager::DbManager;
use crate::errors::{map_join_error, map_sql_error};

/// SQLite-backed [`ProductStore`].
pub struct SqliteProductStore {
    db: Arc<DbManager>,
}

impl SqliteProductStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductStore for SqliteProductStore {
    async fn upsert_product(
        &self,
        scope: &CatalogScope,
        product: &TakealotProduct,
        synced_at: i64,
    ) -> Result<UpsertOutcome> {
        let db = Arc::clone(&self.db);
        let scope = scope.clone();
        let payload = serde_json::to_string(product)
            .map_err(|e| ShelfSyncError::Internal(format!("product encoding failed: {e}")))?;
        let product_id = product.id.clone();

        task::spawn_blocking(move || -> Result<UpsertOutcome> {
            let mut conn = db.get_connection()?;
            upsert_document(&mut conn, &scope, &product_id, &payload, synced_at)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_products(
        &self,
        scope: &CatalogScope,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<TakealotProduct>> {
        let db = Arc::clone(&self.db);
        let scope = scope.clone();

        task::spawn_blocking(move || -> Result<Vec<TakealotProduct>> {
            let conn = db.get_connection()?;
            query_documents(&conn, &scope, limit, offset)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn count_products(&self, scope: &CatalogScope) -> Result<u64> {
        let db = Arc::clone(&self.db);
        let scope = scope.clone();

        task::spawn_blocking(move || -> Result<u64> {
            let conn = db.get_connection()?;
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM catalog_products WHERE user_id = ?1 AND integration_id = ?2",
                    params![scope.user_id, scope.integration_id],
                    |row| row.get(0),
                )
                .map_err(map_sql_error)?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_scope(&self, scope: &CatalogScope) -> Result<u64> {
        let db = Arc::clone(&self.db);
        let scope = scope.clone();

        task::spawn_blocking(move || -> Result<u64> {
            let conn = db.get_connection()?;
            let deleted = conn
                .execute(
                    "DELETE FROM catalog_products WHERE user_id = ?1 AND integration_id = ?2",
                    params![scope.user_id, scope.integration_id],
                )
                .map_err(map_sql_error)?;
            Ok(deleted as u64)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn upsert_document(
    conn: &mut Connection,
    scope: &CatalogScope,
    product_id: &str,
    payload: &str,
    synced_at: i64,
) -> Result<UpsertOutcome> {
    // IMMEDIATE takes the write lock up front so the existence check and the
    // write see the same row.
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(map_sql_error)?;

    let existed: bool = tx
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM catalog_products
                           WHERE user_id = ?1 AND integration_id = ?2 AND product_id = ?3)",
            params![scope.user_id, scope.integration_id, product_id],
            |row| row.get(0),
        )
        .map_err(map_sql_error)?;

    let written = tx
        .execute(
            "INSERT INTO catalog_products (user_id, integration_id, product_id, payload_json, synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_id, integration_id, product_id) DO UPDATE
             SET payload_json = excluded.payload_json, synced_at = excluded.synced_at
             WHERE excluded.synced_at >= catalog_products.synced_at",
            params![scope.user_id, scope.integration_id, product_id, payload, synced_at],
        )
        .map_err(map_sql_error)?;

    tx.commit().map_err(map_sql_error)?;

    // The conflict guard leaves the row untouched when it is newer.
    Ok(match (existed, written) {
        (false, _) => UpsertOutcome::Inserted,
        (true, 0) => UpsertOutcome::Stale,
        (true, _) => UpsertOutcome::Updated,
    })
}

fn query_documents(
    conn: &Connection,
    scope: &CatalogScope,
    limit: u32,
    offset: u32,
) -> Result<Vec<TakealotProduct>> {
    let mut stmt = conn
        .prepare(
            "SELECT payload_json FROM catalog_products
             WHERE user_id = ?1 AND integration_id = ?2
             ORDER BY product_id ASC
             LIMIT ?3 OFFSET ?4",
        )
        .map_err(map_sql_error)?;

    let payloads = stmt
        .query_map(params![scope.user_id, scope.integration_id, limit, offset], |row| {
            row.get::<_, String>(0)
        })
        .map_err(map_sql_error)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(map_sql_error)?;

    payloads
        .iter()
        .map(|json| {
            serde_json::from_str(json).map_err(|e| {
                ShelfSyncError::StorageFailure(format!("corrupt product document: {e}"))
            })
        })
        .collect()
}
