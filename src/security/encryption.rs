//! Encryption at rest for namespace files.
//!
//! Provides AES-256-GCM authenticated encryption keyed from a passphrase.
//! Whether a namespace file is encrypted is a configuration property
//! (passphrase present or not), never sniffed from the payload.
//!
//! # Format
//!
//! `nonce (12 bytes) || ciphertext + auth tag (16 bytes)`
//!
//! The nonce is freshly random per encryption. Decryption authenticates the
//! ciphertext; truncated or tampered payloads are rejected as a hard error.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Nonce size for AES-256-GCM (12 bytes / 96 bits).
const NONCE_SIZE: usize = 12;

/// GCM authentication tag size in bytes.
const TAG_SIZE: usize = 16;

/// AES-256-GCM encryptor keyed from a passphrase.
pub struct Encryptor {
    cipher: Aes256Gcm,
}

impl Encryptor {
    /// Creates an encryptor whose key is the SHA-256 digest of the passphrase.
    #[must_use]
    pub fn from_passphrase(passphrase: &SecretString) -> Self {
        let key_bytes: [u8; 32] = Sha256::digest(passphrase.expose_secret().as_bytes()).into();
        let key = Key::<Aes256Gcm>::from(key_bytes);
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Encrypts plaintext, returning `nonce || ciphertext`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if encryption fails.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);

        let ciphertext =
            self.cipher
                .encrypt(&nonce, plaintext)
                .map_err(|e| Error::OperationFailed {
                    operation: "encrypt".to_string(),
                    cause: format!("AES-256-GCM encryption failed: {e}"),
                })?;

        let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    /// Decrypts `nonce || ciphertext`, authenticating the payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DecryptFailed`] when the payload is shorter than one
    /// nonce plus one auth tag, or when authentication fails (tampering or a
    /// different passphrase).
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::DecryptFailed(format!(
                "ciphertext too short: {} bytes",
                data.len()
            )));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher.decrypt(nonce, ciphertext).map_err(|_| {
            Error::DecryptFailed("authentication failed (wrong passphrase or corrupted data)".to_string())
        })
    }
}
