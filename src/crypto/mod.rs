//! AES-256-GCM encryption for stored secrets.
//!
//! Every secret is encrypted separately with a fresh random nonce. The master
//! key must be 32 bytes (256 bits) and comes from process configuration; it is
//! never written to disk.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of the encryption key in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits, standard for GCM)
const NONCE_SIZE: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption key is not valid base64")]
    KeyNotBase64,
    #[error("encryption key must be {KEY_SIZE} bytes (256 bits), got {0} bytes")]
    KeyWrongLength(usize),
    #[error("encryption failed")]
    EncryptionFailed,
    /// Wrong or rotated key, corrupted ciphertext, or tampering. Callers must
    /// never treat this as "no credential stored".
    #[error("decryption failed (wrong key or corrupted data)")]
    DecryptionFailed,
    #[error("ciphertext or nonce is not valid base64")]
    BlobNotBase64,
    #[error("invalid nonce size: expected {NONCE_SIZE}, got {0}")]
    BadNonce(usize),
}

/// Ciphertext plus the nonce it was produced under, both base64-encoded.
///
/// The only form in which API tokens and credential JSON are persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretBlob {
    pub ciphertext: String,
    pub nonce: String,
}

/// Validates that the master key is exactly 32 bytes when base64 decoded.
pub fn validate_key(key_base64: &str) -> Result<Vec<u8>, CryptoError> {
    let key_bytes = BASE64
        .decode(key_base64)
        .map_err(|_| CryptoError::KeyNotBase64)?;

    if key_bytes.len() != KEY_SIZE {
        return Err(CryptoError::KeyWrongLength(key_bytes.len()));
    }

    Ok(key_bytes)
}

/// Process-wide symmetric cipher over stored secrets.
///
/// Constructed once at startup from the configured master key. Construction
/// fails on a missing-length or malformed key: running with an ephemeral
/// generated key instead would silently orphan every previously encrypted
/// secret, so this is a hard deployment precondition.
pub struct SecretCipher {
    key: Vec<u8>,
}

impl SecretCipher {
    /// Build a cipher from a base64-encoded 256-bit key.
    pub fn new(key_base64: &str) -> Result<Self, CryptoError> {
        let key = validate_key(key_base64)?;
        Ok(Self { key })
    }

    /// Encrypts plaintext with a random nonce (never reused).
    pub fn encrypt(&self, plaintext: &str) -> Result<SecretBlob, CryptoError> {
        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::EncryptionFailed)?;

        let nonce_bytes = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext_bytes = cipher
            .encrypt(&nonce_bytes, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        Ok(SecretBlob {
            ciphertext: BASE64.encode(&ciphertext_bytes),
            nonce: BASE64.encode(nonce_bytes),
        })
    }

    /// Decrypts a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// GCM authentication guarantees this either returns the original
    /// plaintext or fails; garbage bytes are never handed back.
    pub fn decrypt(&self, blob: &SecretBlob) -> Result<String, CryptoError> {
        let ciphertext_bytes = BASE64
            .decode(&blob.ciphertext)
            .map_err(|_| CryptoError::BlobNotBase64)?;
        let nonce_bytes = BASE64
            .decode(&blob.nonce)
            .map_err(|_| CryptoError::BlobNotBase64)?;

        if nonce_bytes.len() != NONCE_SIZE {
            return Err(CryptoError::BadNonce(nonce_bytes.len()));
        }

        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::DecryptionFailed)?;

        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext_bytes = cipher
            .decrypt(nonce, ciphertext_bytes.as_ref())
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext_bytes).map_err(|_| CryptoError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher_with(byte: u8) -> SecretCipher {
        SecretCipher::new(&BASE64.encode([byte; 32])).expect("valid test key")
    }

    #[test]
    fn test_key_validation() {
        // Valid 32-byte key (base64-encoded)
        let valid_key = BASE64.encode([0u8; 32]);
        assert!(validate_key(&valid_key).is_ok());

        // Too short
        let short_key = BASE64.encode([0u8; 16]);
        assert!(matches!(
            validate_key(&short_key),
            Err(CryptoError::KeyWrongLength(16))
        ));

        // Too long
        let long_key = BASE64.encode([0u8; 64]);
        assert!(matches!(
            validate_key(&long_key),
            Err(CryptoError::KeyWrongLength(64))
        ));

        // Invalid base64
        assert!(matches!(
            validate_key("not-valid-base64!@#$"),
            Err(CryptoError::KeyNotBase64)
        ));
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = cipher_with(0);
        let plaintext = "pk_12345_SECRETCLICKUPTOKEN";

        let blob = cipher.encrypt(plaintext).expect("encryption failed");
        assert_ne!(blob.ciphertext, plaintext);

        let decrypted = cipher.decrypt(&blob).expect("decryption failed");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_different_nonces() {
        let cipher = cipher_with(0);
        let plaintext = "same-plaintext";

        let blob1 = cipher.encrypt(plaintext).unwrap();
        let blob2 = cipher.encrypt(plaintext).unwrap();

        // Nonces are random, so ciphertexts differ too
        assert_ne!(blob1.nonce, blob2.nonce);
        assert_ne!(blob1.ciphertext, blob2.ciphertext);

        assert_eq!(cipher.decrypt(&blob1).unwrap(), plaintext);
        assert_eq!(cipher.decrypt(&blob2).unwrap(), plaintext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let cipher1 = cipher_with(0);
        let cipher2 = cipher_with(1);
        let plaintext = "secret";

        let blob = cipher1.encrypt(plaintext).unwrap();

        // Decrypting under a different key fails loudly and never yields the
        // plaintext back
        let result = cipher2.decrypt(&blob);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_wrong_nonce_fails() {
        let cipher = cipher_with(0);

        let blob = cipher.encrypt("secret").unwrap();
        let other = cipher.encrypt("other").unwrap();

        let mismatched = SecretBlob {
            ciphertext: blob.ciphertext,
            nonce: other.nonce,
        };
        assert!(matches!(
            cipher.decrypt(&mismatched),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = cipher_with(0);

        let mut blob = cipher.encrypt("secret").unwrap();
        blob.ciphertext.push('X');

        // Authenticated encryption detects tampering
        assert!(cipher.decrypt(&blob).is_err());
    }
}
