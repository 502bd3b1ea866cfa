use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use super::Backend;
use crate::errors::StoreError;

const CREATE_TABLE: &str = r#"CREATE TABLE IF NOT EXISTS secret (
    key     TEXT UNIQUE,
    content TEXT
)"#;
const INSERT: &str = "INSERT INTO secret (key, content) VALUES (?, ?)";
const SELECT: &str = "SELECT content FROM secret WHERE key = ?";
const DELETE: &str = "DELETE FROM secret WHERE key = ?";

/// Backend storing one row per record in a SQLite table.
///
/// Every operation is a single statement, so SQLite's own atomicity
/// orders them; no application-level lock is taken.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Connect to `database_url` (created if missing) and ensure the table exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let in_memory = database_url.contains(":memory:");

        let mut options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::StorageUnavailable(format!("invalid database url: {}", e)))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to an in-memory database is a separate database,
        // so keep exactly one alive for the lifetime of the pool.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            StoreError::StorageUnavailable(format!("failed connection to database: {}", e))
        })?;

        sqlx::query(CREATE_TABLE).execute(&pool).await.map_err(|e| {
            StoreError::StorageUnavailable(format!("failed to create database table: {}", e))
        })?;

        tracing::info!("sqlite store ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, record_key: &str) -> Result<Option<String>, StoreError> {
        let content = sqlx::query_scalar::<_, String>(SELECT)
            .bind(record_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::BackendRead(e.to_string()))?;
        Ok(content)
    }

    async fn put(&self, record_key: &str, content: &str) -> Result<(), StoreError> {
        sqlx::query(INSERT)
            .bind(record_key)
            .bind(content)
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateKey,
                _ => StoreError::BackendWrite(e.to_string()),
            })?;

        tracing::debug!("sqlite store: record inserted");
        Ok(())
    }

    async fn delete(&self, record_key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(DELETE)
            .bind(record_key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::BackendWrite(e.to_string()))?;

        let removed = result.rows_affected() > 0;
        if removed {
            tracing::debug!("sqlite store: record deleted");
        }
        Ok(removed)
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}
