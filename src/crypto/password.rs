use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// The size of the verifier salt in bytes.
pub const SALT_SIZE: usize = 32;
/// The size of the PBKDF2 output in bytes.
const HASH_SIZE: usize = 32;

fn pbkdf2_sha256(password: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; HASH_SIZE]> {
    let mut out = Zeroizing::new([0u8; HASH_SIZE]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out[..]);
    out
}

/// Hashes a password into a `salt_hex:hash_hex` verifier with PBKDF2-HMAC-SHA256.
///
/// A fresh random salt is drawn on every call, so hashing the same password twice
/// never yields the same verifier.
pub fn hash_password(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let hash = pbkdf2_sha256(password, &salt, iterations);
    tracing::debug!("Password hashed with PBKDF2 ({} iterations)", iterations);
    format!("{}:{}", hex::encode(salt), hex::encode(&hash[..]))
}

/// Verifies a candidate password against a stored verifier.
///
/// Malformed verifiers (missing separator, bad hex, wrong salt or hash length) fail
/// closed and return `false`.
pub fn verify_password(verifier: &str, candidate: &str, iterations: u32) -> bool {
    let Some((salt_hex, hash_hex)) = verifier.split_once(':') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return false;
    };
    if salt.len() != SALT_SIZE || expected.len() != HASH_SIZE || iterations == 0 {
        return false;
    }

    let derived = pbkdf2_sha256(candidate, &salt, iterations);
    derived[..].ct_eq(expected.as_slice()).into()
}
