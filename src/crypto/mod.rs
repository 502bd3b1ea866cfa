pub mod aes;

use thiserror::Error;

pub use aes::AesGcmCipher;

/// Length in bytes of the symmetric key every cipher is constructed with.
pub const KEY_LENGTH: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("encryption key must be {expected} bytes long, got {actual}")]
    KeyLength { expected: usize, actual: usize },

    #[error("cipher failure: {0}")]
    Encryption(String),

    #[error("malformed ciphertext: {0}")]
    Decode(String),
}

/// Abstraction over the symmetric cipher used to protect stored secrets.
///
/// Ciphertexts are text-safe so they can live in JSON documents and SQL
/// text columns. `record_key` is the deterministic counterpart used to
/// address a record by its retrieval key.
pub trait Cipher: Send + Sync {
    /// Encrypt a plaintext string. Two calls with the same input yield
    /// different ciphertexts.
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError>;

    /// Decrypt a string previously produced by `encrypt` under the same key.
    fn decrypt(&self, encoded: &str) -> Result<String, CipherError>;

    /// Derive the storage identity of a retrieval key. Stable for a given
    /// cipher key and not reversible.
    fn record_key(&self, retrieval_key: &str) -> Result<String, CipherError>;
}
