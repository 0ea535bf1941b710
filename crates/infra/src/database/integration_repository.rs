//! Integration repository implementation

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use shelfsync_core::IntegrationRepository;
use shelfsync_domain::{ApiKey, Integration, Marketplace, Result, ShelfSyncError};
use tokio::task;

use super::manager::DbManager;
use crate::errors::{is_unique_violation, map_join_error, map_sql_error};

const SELECT_INTEGRATION: &str = "SELECT id, user_id, marketplace, name, api_key, active, created_at, updated_at
                                  FROM integrations";

/// SQLite-backed [`IntegrationRepository`].
pub struct SqliteIntegrationRepository {
    db: Arc<DbManager>,
}

impl SqliteIntegrationRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn run<T, F>(&self, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<T> {
            let conn = db.get_connection()?;
            operation(&conn)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl IntegrationRepository for SqliteIntegrationRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Integration>> {
        let id = id.to_string();
        self.run(move |conn| {
            conn.query_row(&format!("{SELECT_INTEGRATION} WHERE id = ?1"), params![id], map_row)
                .optional()
                .map_err(map_sql_error)
        })
        .await
    }

    async fn find_by_user(
        &self,
        user_id: &str,
        marketplace: Marketplace,
    ) -> Result<Option<Integration>> {
        let user_id = user_id.to_string();
        self.run(move |conn| {
            conn.query_row(
                &format!("{SELECT_INTEGRATION} WHERE user_id = ?1 AND marketplace = ?2"),
                params![user_id, marketplace.as_str()],
                map_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Integration>> {
        let user_id = user_id.to_string();
        self.run(move |conn| {
            query_many(
                conn,
                &format!("{SELECT_INTEGRATION} WHERE user_id = ?1 ORDER BY created_at ASC"),
                params![user_id],
            )
        })
        .await
    }

    async fn list_active(&self) -> Result<Vec<Integration>> {
        self.run(|conn| {
            query_many(
                conn,
                &format!("{SELECT_INTEGRATION} WHERE active = 1 ORDER BY created_at ASC"),
                params![],
            )
        })
        .await
    }

    async fn insert(&self, integration: &Integration) -> Result<()> {
        let integration = integration.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO integrations (id, user_id, marketplace, name, api_key, active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    integration.id,
                    integration.user_id,
                    integration.marketplace.as_str(),
                    integration.name,
                    integration.api_key.expose(),
                    integration.active,
                    integration.created_at,
                    integration.updated_at,
                ],
            )
            .map_err(|err| {
                if is_unique_violation(&err) {
                    ShelfSyncError::InvalidInput(format!(
                        "a {} integration already exists for this user",
                        integration.marketplace
                    ))
                } else {
                    map_sql_error(err)
                }
            })?;
            Ok(())
        })
        .await
    }

    async fn update_api_key(&self, id: &str, api_key: &ApiKey, updated_at: i64) -> Result<bool> {
        let id = id.to_string();
        let api_key = api_key.clone();
        self.run(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE integrations SET api_key = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id, api_key.expose(), updated_at],
                )
                .map_err(map_sql_error)?;
            Ok(changed > 0)
        })
        .await
    }

    async fn set_active(&self, id: &str, active: bool, updated_at: i64) -> Result<bool> {
        let id = id.to_string();
        self.run(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE integrations SET active = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id, active, updated_at],
                )
                .map_err(map_sql_error)?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.run(move |conn| {
            let changed = conn
                .execute("DELETE FROM integrations WHERE id = ?1", params![id])
                .map_err(map_sql_error)?;
            Ok(changed > 0)
        })
        .await
    }
}

fn query_many(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Integration>> {
    let mut stmt = conn.prepare(sql).map_err(map_sql_error)?;
    let rows = stmt
        .query_map(params, map_row)
        .map_err(map_sql_error)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(map_sql_error);
    rows
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<Integration> {
    let marketplace: String = row.get(2)?;
    let api_key: String = row.get(4)?;

    Ok(Integration {
        id: row.get(0)?,
        user_id: row.get(1)?,
        marketplace: Marketplace::from_str(&marketplace)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into()))?,
        name: row.get(3)?,
        api_key: ApiKey::parse(api_key)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
        active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
