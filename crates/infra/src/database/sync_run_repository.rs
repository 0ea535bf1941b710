//! Sync-run history repository

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use shelfsync_core::SyncRunRepository;
use shelfsync_domain::{Result, SyncRunRecord, SyncRunStatus, SyncType};
use tokio::task;
use tracing::debug;

use super::manager::DbManager;
use crate::errors::{map_join_error, map_sql_error};

const SELECT_RUN: &str = "SELECT id, user_id, integration_id, sync_type, status, imported, updated, skipped,
                                 error, error_code, started_at, finished_at
                          FROM sync_runs";

/// SQLite-backed [`SyncRunRepository`].
pub struct SqliteSyncRunRepository {
    db: Arc<DbManager>,
}

impl SqliteSyncRunRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SyncRunRepository for SqliteSyncRunRepository {
    async fn record_run(&self, record: &SyncRunRecord) -> Result<()> {
        let db = Arc::clone(&self.db);
        let record = record.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            insert_run(&conn, &record)?;
            debug!(run_id = %record.id, status = %record.status, "sync run recorded");
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn latest_runs(&self) -> Result<Vec<SyncRunRecord>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<SyncRunRecord>> {
            let conn = db.get_connection()?;
            query_latest_runs(&conn)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn latest_for_integration(&self, integration_id: &str) -> Result<Option<SyncRunRecord>> {
        let db = Arc::clone(&self.db);
        let integration_id = integration_id.to_string();

        task::spawn_blocking(move || -> Result<Option<SyncRunRecord>> {
            let conn = db.get_connection()?;
            conn.query_row(
                &format!(
                    "{SELECT_RUN} WHERE integration_id = ?1 ORDER BY started_at DESC, id DESC LIMIT 1"
                ),
                params![integration_id],
                map_run_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn prune_history(&self, integration_id: &str, keep: u32) -> Result<u64> {
        let db = Arc::clone(&self.db);
        let integration_id = integration_id.to_string();

        task::spawn_blocking(move || -> Result<u64> {
            let conn = db.get_connection()?;
            let removed = conn
                .execute(
                    "DELETE FROM sync_runs
                     WHERE integration_id = ?1
                       AND id NOT IN (
                           SELECT id FROM sync_runs
                           WHERE integration_id = ?1
                           ORDER BY started_at DESC, id DESC
                           LIMIT ?2
                       )",
                    params![integration_id, keep],
                )
                .map_err(map_sql_error)?;
            if removed > 0 {
                debug!(%integration_id, removed, "sync run history pruned");
            }
            Ok(removed as u64)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_for_integration(&self, integration_id: &str) -> Result<u64> {
        let db = Arc::clone(&self.db);
        let integration_id = integration_id.to_string();

        task::spawn_blocking(move || -> Result<u64> {
            let conn = db.get_connection()?;
            let removed = conn
                .execute("DELETE FROM sync_runs WHERE integration_id = ?1", params![integration_id])
                .map_err(map_sql_error)?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn insert_run(conn: &Connection, record: &SyncRunRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO sync_runs (id, user_id, integration_id, sync_type, status, imported, updated,
                                skipped, error, error_code, started_at, finished_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            record.id,
            record.user_id,
            record.integration_id,
            record.sync_type.as_str(),
            record.status.as_str(),
            to_sql_count(record.imported),
            to_sql_count(record.updated),
            to_sql_count(record.skipped),
            record.error,
            record.error_code,
            record.started_at,
            record.finished_at,
        ],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

fn query_latest_runs(conn: &Connection) -> Result<Vec<SyncRunRecord>> {
    // UUIDv7 ids sort by creation time, so they break started_at ties.
    let sql = format!(
        "{SELECT_RUN} r
         WHERE r.id = (
             SELECT id FROM sync_runs
             WHERE integration_id = r.integration_id
             ORDER BY started_at DESC, id DESC
             LIMIT 1
         )
         ORDER BY r.integration_id ASC"
    );

    let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
    let rows = stmt
        .query_map([], map_run_row)
        .map_err(map_sql_error)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(map_sql_error);
    rows
}

fn map_run_row(row: &Row<'_>) -> rusqlite::Result<SyncRunRecord> {
    let sync_type: String = row.get(3)?;
    let status: String = row.get(4)?;

    Ok(SyncRunRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        integration_id: row.get(2)?,
        sync_type: SyncType::from_str(&sync_type)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?,
        status: SyncRunStatus::from_str(&status)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into()))?,
        imported: from_sql_count(row.get(5)?),
        updated: from_sql_count(row.get(6)?),
        skipped: from_sql_count(row.get(7)?),
        error: row.get(8)?,
        error_code: row.get(9)?,
        started_at: row.get(10)?,
        finished_at: row.get(11)?,
    })
}

fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
