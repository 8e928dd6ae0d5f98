use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::crypto::aes::{SecureKey, KEY_SIZE};
use crate::error::{AppError, Result};

/// The size of the per-account encryption salt in bytes.
pub const ENCRYPTION_SALT_SIZE: usize = 32;

/// Generates a fresh hex-encoded encryption salt.
///
/// Independent of the password verifier's salt: the same password yields unrelated
/// secrets for authentication and for encryption.
pub fn generate_encryption_salt() -> String {
    let mut salt = [0u8; ENCRYPTION_SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    hex::encode(salt)
}

/// Derives the document encryption key from a password and the account's encryption salt.
///
/// Deterministic: the same password and salt always unlock the same ciphertext.
pub fn derive_key(password: &str, salt_hex: &str, iterations: u32) -> Result<SecureKey> {
    let salt = hex::decode(salt_hex)
        .map_err(|e| AppError::Encryption(format!("Invalid encryption salt: {}", e)))?;
    if iterations == 0 {
        return Err(AppError::Encryption("Key derivation needs at least one iteration".to_string()));
    }

    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut key);
    let secure = SecureKey::new(key);
    zeroize::Zeroize::zeroize(&mut key);
    Ok(secure)
}

/// In-memory mapping of session token to document key.
///
/// Entries have no expiry of their own; they are evicted exactly when the owning
/// session is destroyed. Nothing here is ever persisted.
#[derive(Clone, Default)]
pub struct KeyVault {
    keys: Arc<RwLock<HashMap<String, SecureKey>>>,
}

impl KeyVault {
    /// Creates a new, empty `KeyVault`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the key for a session, replacing any previous one.
    pub async fn store_key_for_session(&self, token: &str, key: SecureKey) {
        let mut keys = self.keys.write().await;
        keys.insert(token.to_string(), key);
    }

    /// Returns a copy of the session's key, if the vault still holds one.
    pub async fn get_key_for_session(&self, token: &str) -> Option<SecureKey> {
        let keys = self.keys.read().await;
        keys.get(token).cloned()
    }

    /// Drops the session's key. Returns whether a key was present.
    pub async fn evict(&self, token: &str) -> bool {
        let mut keys = self.keys.write().await;
        keys.remove(token).is_some()
    }

    /// Drops the keys of several sessions at once.
    pub async fn evict_many<'a>(&self, tokens: impl IntoIterator<Item = &'a String>) {
        let mut keys = self.keys.write().await;
        for token in tokens {
            keys.remove(token);
        }
    }

    /// Returns the number of keys held.
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }
}
