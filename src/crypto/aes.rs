use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::{Cipher, CipherError, KEY_LENGTH};

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;
const RECORD_KEY_LABEL: &[u8] = b"onetimeshare/record-key/v1";

/// AES-256-GCM with a random nonce per message.
///
/// Stored form is `base64(nonce || ciphertext || tag)`. Record keys are
/// HMAC-SHA256 digests under a subkey derived from the cipher key, so the
/// encryption key itself is never used as a MAC key.
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
    index_key: Zeroizing<[u8; 32]>,
}

impl AesGcmCipher {
    /// Build a cipher from the raw bytes of `key`, which must be exactly
    /// [`KEY_LENGTH`] bytes.
    pub fn new(key: &str) -> Result<Self, CipherError> {
        Self::from_bytes(key.as_bytes())
    }

    pub fn from_bytes(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != KEY_LENGTH {
            return Err(CipherError::KeyLength {
                expected: KEY_LENGTH,
                actual: key.len(),
            });
        }

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| CipherError::Encryption(format!("invalid key: {:?}", e)))?;

        let mut hasher = Sha256::new();
        hasher.update(RECORD_KEY_LABEL);
        hasher.update(key);
        let mut index_key = Zeroizing::new([0u8; 32]);
        index_key.copy_from_slice(&hasher.finalize());

        Ok(Self { cipher, index_key })
    }
}

impl Cipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let nonce_bytes = generate_nonce();
        let nonce = Nonce::from_slice(&nonce_bytes);
        let sealed = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CipherError::Encryption(format!("encryption failed: {}", e)))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&sealed);
        Ok(base64::engine::general_purpose::STANDARD.encode(blob))
    }

    fn decrypt(&self, encoded: &str) -> Result<String, CipherError> {
        let blob = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| CipherError::Decode(e.to_string()))?;

        if blob.len() < NONCE_LEN {
            return Err(CipherError::Decode(format!(
                "ciphertext is {} bytes, shorter than the nonce",
                blob.len()
            )));
        }

        let (nonce_bytes, sealed) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|e| CipherError::Encryption(format!("decryption failed: {}", e)))?;

        String::from_utf8(plaintext).map_err(|e| CipherError::Decode(e.to_string()))
    }

    fn record_key(&self, retrieval_key: &str) -> Result<String, CipherError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.index_key[..])
            .map_err(|e| CipherError::Encryption(format!("invalid MAC key: {}", e)))?;
        mac.update(retrieval_key.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}
