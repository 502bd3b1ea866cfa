use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::Backend;
use crate::errors::StoreError;

type Collection = BTreeMap<String, String>;

/// Backend that keeps every record in a single JSON object on disk.
///
/// Mutations hold `write_lock` across the whole read-modify-write cycle and
/// replace the file by rename, so readers never see a partial document.
/// Reads take no lock and may observe a slightly stale collection.
pub struct JsonFileBackend {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileBackend {
    /// Open the collection at `path`, creating it as `{}` when missing.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        match fs::read(&path).await {
            Ok(bytes) => {
                serde_json::from_slice::<Collection>(&bytes).map_err(|e| {
                    StoreError::StorageUnavailable(format!(
                        "{} is not a valid secrets file: {}",
                        path.display(),
                        e
                    ))
                })?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                write_collection(&path, &Collection::new())
                    .await
                    .map_err(|e| {
                        StoreError::StorageUnavailable(format!(
                            "failed to create {}: {}",
                            path.display(),
                            e
                        ))
                    })?;
                tracing::info!(path = %path.display(), "created empty secrets file");
            }
            Err(e) => {
                return Err(StoreError::StorageUnavailable(format!(
                    "could not read {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    async fn load(&self) -> Result<Collection, StoreError> {
        let bytes = fs::read(&self.path)
            .await
            .map_err(|e| StoreError::BackendRead(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::BackendRead(format!("{}: {}", self.path.display(), e)))
    }

    async fn persist(&self, collection: &Collection) -> Result<(), StoreError> {
        write_collection(&self.path, collection)
            .await
            .map_err(|e| StoreError::BackendWrite(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl Backend for JsonFileBackend {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn get(&self, record_key: &str) -> Result<Option<String>, StoreError> {
        let mut collection = self.load().await?;
        Ok(collection.remove(record_key))
    }

    async fn put(&self, record_key: &str, content: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut collection = self.load().await?;
        if collection.contains_key(record_key) {
            return Err(StoreError::DuplicateKey);
        }
        collection.insert(record_key.to_string(), content.to_string());
        self.persist(&collection).await?;

        tracing::debug!(records = collection.len(), "json store: record inserted");
        Ok(())
    }

    async fn delete(&self, record_key: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut collection = self.load().await?;
        if collection.remove(record_key).is_none() {
            return Ok(false);
        }
        self.persist(&collection).await?;

        tracing::debug!(records = collection.len(), "json store: record deleted");
        Ok(true)
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Serialize `collection` to a sibling temp file (owner-only on unix) and
/// rename it over `path`.
async fn write_collection(path: &Path, collection: &Collection) -> std::io::Result<()> {
    let data = serde_json::to_vec(collection)?;
    let tmp = temp_path(path);

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(&tmp).await?;
    file.write_all(&data).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp, path).await
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_open_creates_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");

        JsonFileBackend::open(&path).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        let backend = JsonFileBackend::open(&path).await.unwrap();
        backend.put("k", "v").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_open_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        std::fs::write(&path, "not json").unwrap();

        let err = JsonFileBackend::open(&path).await.err().unwrap();
        assert!(matches!(err, StoreError::StorageUnavailable(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_open_keeps_existing_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        std::fs::write(&path, r#"{"abc":"def"}"#).unwrap();

        let backend = JsonFileBackend::open(&path).await.unwrap();
        assert_eq!(backend.get("abc").await.unwrap().as_deref(), Some("def"));
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::open(dir.path().join("secrets.json"))
            .await
            .unwrap();

        assert_eq!(backend.get("k1").await.unwrap(), None);
        backend.put("k1", "c1").await.unwrap();
        backend.put("k2", "c2").await.unwrap();
        assert_eq!(backend.get("k1").await.unwrap().as_deref(), Some("c1"));

        assert!(backend.delete("k1").await.unwrap());
        assert_eq!(backend.get("k1").await.unwrap(), None);
        assert_eq!(backend.get("k2").await.unwrap().as_deref(), Some("c2"));

        // absent key is a no-op
        assert!(!backend.delete("k1").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::open(dir.path().join("secrets.json"))
            .await
            .unwrap();

        backend.put("k", "first").await.unwrap();
        let err = backend.put("k", "second").await.err().unwrap();
        assert!(matches!(err, StoreError::DuplicateKey));
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_corrupted_file_after_open_surfaces_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        let backend = JsonFileBackend::open(&path).await.unwrap();

        std::fs::write(&path, "{broken").unwrap();
        assert!(matches!(backend.get("k").await, Err(StoreError::BackendRead(_))));
        assert!(matches!(backend.put("k", "v").await, Err(StoreError::BackendRead(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_puts_are_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(
            JsonFileBackend::open(dir.path().join("secrets.json"))
                .await
                .unwrap(),
        );

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..50 {
            let backend = backend.clone();
            tasks.spawn(async move {
                backend
                    .put(&format!("key-{}", i), &format!("content-{}", i))
                    .await
            });
        }
        while let Some(res) = tasks.join_next().await {
            res.unwrap().unwrap();
        }

        for i in 0..50 {
            assert_eq!(
                backend.get(&format!("key-{}", i)).await.unwrap(),
                Some(format!("content-{}", i))
            );
        }
    }
}
