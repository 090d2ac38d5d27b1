//! # Credential Encryption
//!
//! Symmetric encryption for provider credentials at rest. The 256-bit key is
//! derived from the process-level `ENCRYPTION_KEY` secret via SHA-256; the
//! stored form is `base64(nonce || ciphertext)` with a random 96-bit nonce.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};

const NONCE_LEN: usize = 12;

fn derive_key(secret: &str) -> Key<Aes256Gcm> {
    let digest = Sha256::digest(secret.as_bytes());
    Key::<Aes256Gcm>::clone_from_slice(&digest)
}

/// Encrypt a plaintext credential for storage.
pub fn encrypt_credential(secret: &str, plaintext: &str) -> Result<String> {
    let cipher = Aes256Gcm::new(&derive_key(secret));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| EngineError::crypto(format!("encryption failed: {e}")))?;

    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(combined))
}

/// Decrypt a stored credential.
///
/// Returns [`EngineError::Crypto`] for malformed or tampered ciphertext. The
/// caller decides whether that failure may fall back to environment-variable
/// credentials; a missing `ENCRYPTION_KEY` never reaches this function.
pub fn decrypt_credential(secret: &str, encoded: &str) -> Result<String> {
    let combined = BASE64
        .decode(encoded)
        .map_err(|e| EngineError::crypto(format!("invalid base64 ciphertext: {e}")))?;

    if combined.len() <= NONCE_LEN {
        return Err(EngineError::crypto("ciphertext too short"));
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(&derive_key(secret));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| EngineError::crypto(format!("decryption failed: {e}")))?;

    String::from_utf8(plaintext)
        .map_err(|e| EngineError::crypto(format!("decrypted credential is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let encrypted = encrypt_credential("test-key", "sk-ant-secret-token").unwrap();
        let decrypted = decrypt_credential("test-key", &encrypted).unwrap();
        assert_eq!(decrypted, "sk-ant-secret-token");
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = encrypt_credential("key-one", "credential").unwrap();
        let result = decrypt_credential("key-two", &encrypted);
        assert!(matches!(result, Err(EngineError::Crypto { .. })));
    }

    #[test]
    fn test_malformed_ciphertext_fails() {
        assert!(decrypt_credential("key", "not-base64!!!").is_err());
        assert!(decrypt_credential("key", "AAAA").is_err());
    }

    #[test]
    fn test_nonce_uniqueness() {
        let a = encrypt_credential("key", "same-plaintext").unwrap();
        let b = encrypt_credential("key", "same-plaintext").unwrap();
        assert_ne!(a, b);
    }
}
