//! Symmetric sealing of structured payloads.
//!
//! Blob layout: `base64(nonce || ciphertext || tag)`. The same routine seals user
//! documents (session key) and share snapshots (master key).

use base64::{Engine as _, engine::general_purpose};
use serde::{de::DeserializeOwned, Serialize};

use crate::crypto::aes::{self, SecureKey, NONCE_SIZE};
use crate::error::{AppError, Result};

/// Serializes `value` to canonical JSON bytes and seals it with `key`.
///
/// # Arguments
///
/// * `value` - The value to seal.
/// * `key` - The 256-bit document key.
///
/// # Returns
///
/// The base64 blob of nonce, ciphertext and tag, or `AppError::Encryption`.
pub fn encrypt<T: Serialize>(value: &T, key: &SecureKey) -> Result<String> {
    let plaintext = zeroize::Zeroizing::new(
        sonic_rs::to_vec(value)
            .map_err(|e| AppError::Internal(format!("Serialization failed: {}", e)))?,
    );

    let (ciphertext, nonce) = aes::encrypt(key, &plaintext)?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);

    Ok(general_purpose::STANDARD.encode(blob))
}

/// Opens a blob produced by [`encrypt`].
///
/// Malformed encoding, a short blob, a wrong key, tampering and a payload that no
/// longer matches `T` all yield [`AppError::Decryption`].
pub fn decrypt<T: DeserializeOwned>(blob: &str, key: &SecureKey) -> Result<T> {
    let raw = general_purpose::STANDARD
        .decode(blob.trim())
        .map_err(|_| AppError::Decryption)?;

    if raw.len() <= NONCE_SIZE {
        return Err(AppError::Decryption);
    }

    let (nonce, ciphertext) = raw.split_at(NONCE_SIZE);
    let nonce: [u8; NONCE_SIZE] = nonce.try_into().map_err(|_| AppError::Decryption)?;

    let plaintext = zeroize::Zeroizing::new(aes::decrypt(key, ciphertext, &nonce)?);

    sonic_rs::from_slice(&plaintext).map_err(|e| {
        tracing::warn!("Decrypted payload did not parse: {}", e);
        AppError::Decryption
    })
}
