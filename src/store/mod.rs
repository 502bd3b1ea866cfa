//! Persistence backends for encrypted secrets.
//!
//! Two interchangeable implementations share the [`Backend`] contract:
//!   - `JsonFileBackend`: the whole collection lives in one JSON file and is
//!     rewritten on every mutation under a per-instance lock.
//!   - `SqliteBackend`: one row per record, relying on SQLite's own atomicity.
//!
//! The backend is chosen once at startup from [`BackendKind`].

pub mod file;
pub mod sqlite;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::StoreError;

pub use file::JsonFileBackend;
pub use sqlite::SqliteBackend;

/// Durable mapping from record key to encrypted content.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short backend name for log fields.
    fn name(&self) -> &'static str;

    /// Look up the encrypted content stored under `record_key`.
    async fn get(&self, record_key: &str) -> Result<Option<String>, StoreError>;

    /// Insert a new record. Never overwrites: an existing key yields
    /// [`StoreError::DuplicateKey`].
    async fn put(&self, record_key: &str, content: &str) -> Result<(), StoreError>;

    /// Remove a record. Returns `false` when there was nothing to remove.
    async fn delete(&self, record_key: &str) -> Result<bool, StoreError>;

    async fn close(&self) -> Result<(), StoreError>;
}

/// Which backend to open, with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    JsonFile(PathBuf),
    Sqlite(String),
}

impl BackendKind {
    /// Resolve a backend by name (`json` or `sqlite`).
    pub fn from_name(
        name: &str,
        json_path: impl Into<PathBuf>,
        database_url: impl Into<String>,
    ) -> Result<Self, StoreError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" | "file" => Ok(BackendKind::JsonFile(json_path.into())),
            "sqlite" | "db" => Ok(BackendKind::Sqlite(database_url.into())),
            other => Err(StoreError::Configuration(format!(
                "unknown storage backend '{}', expected 'json' or 'sqlite'",
                other
            ))),
        }
    }
}

/// Open the selected backend. Failure here means the process cannot serve.
pub async fn open(kind: &BackendKind) -> Result<Box<dyn Backend>, StoreError> {
    match kind {
        BackendKind::JsonFile(path) => Ok(Box::new(JsonFileBackend::open(path).await?)),
        BackendKind::Sqlite(url) => Ok(Box::new(SqliteBackend::connect(url).await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_from_name() {
        assert_eq!(
            BackendKind::from_name("json", "s.json", "sqlite://s.db").unwrap(),
            BackendKind::JsonFile(PathBuf::from("s.json"))
        );
        assert_eq!(
            BackendKind::from_name(" SQLite ", "s.json", "sqlite://s.db").unwrap(),
            BackendKind::Sqlite("sqlite://s.db".to_string())
        );
        assert!(matches!(
            BackendKind::from_name("redis", "s.json", "sqlite://s.db"),
            Err(StoreError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_open_selects_backend() {
        let dir = tempfile::tempdir().unwrap();

        let kind = BackendKind::JsonFile(dir.path().join("secrets.json"));
        assert_eq!(open(&kind).await.unwrap().name(), "json");

        let url = format!("sqlite://{}", dir.path().join("secrets.db").display());
        let backend = open(&BackendKind::Sqlite(url)).await.unwrap();
        assert_eq!(backend.name(), "sqlite");
        backend.close().await.unwrap();
    }
}
