//! Response encryption.
//!
//! Uses AES-256-GCM keyed with the first 32 bytes of the shared secret. The
//! wire format is `nonce || ciphertext || tag`, with a random 96-bit nonce per
//! message, which is what the CI server's extension client expects when it
//! asks for `Accept-Encoding: aesgcm`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use thiserror::Error;

/// Key length in bytes (256 bits for AES-256)
pub const KEY_LENGTH: usize = 32;

/// Nonce length in bytes (96 bits for AES-GCM)
pub const NONCE_LENGTH: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid encryption key: need at least 32 bytes of secret, got {0}")]
    KeyTooShort(usize),

    #[error("failed to create cipher: {0}")]
    Cipher(String),

    #[error("encryption failed")]
    Encryption,

    #[error("encrypted payload too short")]
    TooShort,

    #[error("decryption failed: invalid key or corrupted data")]
    Decryption,
}

/// Derive the AES-256 key from the shared secret.
pub fn derive_key(secret: &str) -> Result<[u8; KEY_LENGTH], CryptoError> {
    let bytes = secret.as_bytes();
    if bytes.len() < KEY_LENGTH {
        return Err(CryptoError::KeyTooShort(bytes.len()));
    }
    let mut key = [0u8; KEY_LENGTH];
    key.copy_from_slice(&bytes[..KEY_LENGTH]);
    Ok(key)
}

/// Encrypt `plaintext`, returning `nonce || ciphertext || tag`.
pub fn encrypt(key: &[u8; KEY_LENGTH], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::Cipher(e.to_string()))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Encryption)?;

    let mut combined = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);
    Ok(combined)
}

/// Reverse [`encrypt`]. Fails if the key is wrong or the blob was tampered with.
pub fn decrypt(key: &[u8; KEY_LENGTH], blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < NONCE_LENGTH {
        return Err(CryptoError::TooShort);
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LENGTH);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::Cipher(e.to_string()))?;
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Decryption)
}
