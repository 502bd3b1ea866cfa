use std::sync::Arc;

use crate::crypto::{AesGcmCipher, Cipher};
use crate::errors::StoreError;
use crate::keygen::{self, RETRIEVAL_KEY_LENGTH};
use crate::store::{self, Backend, BackendKind};

/// Encrypted store of secrets that can each be read exactly once.
///
/// Records are addressed by `Cipher::record_key` of the retrieval key; the
/// plaintext key itself is never persisted. A record lives from `save` until
/// the first successful `read`.
pub struct SecretStore {
    cipher: Arc<dyn Cipher>,
    backend: Arc<dyn Backend>,
}

impl SecretStore {
    pub fn new(cipher: Arc<dyn Cipher>, backend: Arc<dyn Backend>) -> Self {
        Self { cipher, backend }
    }

    /// Build the AES-GCM cipher from `encryption_key` and open the selected
    /// backend. Errors here are fatal to startup.
    pub async fn open(encryption_key: &str, kind: &BackendKind) -> Result<Self, StoreError> {
        let cipher = AesGcmCipher::new(encryption_key)?;
        let backend = store::open(kind).await?;
        tracing::info!(backend = backend.name(), "secret store opened");
        Ok(Self::new(Arc::new(cipher), Arc::from(backend)))
    }

    /// Encrypt and store `secret`, returning the retrieval key.
    pub async fn save(&self, secret: &str) -> Result<String, StoreError> {
        let key = keygen::generate(RETRIEVAL_KEY_LENGTH);
        let record_key = self.cipher.record_key(&key)?;
        let content = self.cipher.encrypt(secret)?;

        self.backend.put(&record_key, &content).await?;

        tracing::debug!(backend = self.backend.name(), "secret saved");
        Ok(key)
    }

    /// Return the secret stored under `key` and delete it.
    ///
    /// A record whose content fails to decrypt is left in place. When two
    /// reads race for the same key only the one whose delete removed the
    /// record gets the secret; the other sees `NotFound`.
    pub async fn read(&self, key: &str) -> Result<String, StoreError> {
        let record_key = self.cipher.record_key(key)?;

        let content = self
            .backend
            .get(&record_key)
            .await?
            .ok_or(StoreError::NotFound)?;

        let secret = self.cipher.decrypt(&content).map_err(|e| {
            tracing::warn!(backend = self.backend.name(), error = %e, "stored secret failed to decrypt");
            StoreError::ReadFailure(e)
        })?;

        if !self.backend.delete(&record_key).await? {
            return Err(StoreError::NotFound);
        }

        tracing::debug!(backend = self.backend.name(), "secret read and deleted");
        Ok(secret)
    }

    /// Whether a secret is currently stored under `key`. Does not consume it.
    pub async fn validate_exists(&self, key: &str) -> Result<bool, StoreError> {
        let record_key = self.cipher.record_key(key)?;
        Ok(self.backend.get(&record_key).await?.is_some())
    }

    pub async fn close(&self) -> Result<(), StoreError> {
        self.backend.close().await
    }
}
