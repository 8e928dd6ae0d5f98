use base64::{Engine as _, engine::general_purpose};
use rand::rngs::OsRng;
use rand::RngCore;

/// The size of a session token in bytes (hex-encoded on the wire).
const SESSION_TOKEN_SIZE: usize = 32;
/// The size of a share token in bytes (URL-safe base64 on the wire).
const SHARE_TOKEN_SIZE: usize = 32;

/// Generates a new random session token: 256 bits, 64 hex characters.
pub fn generate_session_token() -> String {
    let mut token = [0u8; SESSION_TOKEN_SIZE];
    OsRng.fill_bytes(&mut token);
    hex::encode(token)
}

/// Generates a new random share token.
///
/// # Returns
///
/// A URL-safe base64-encoded token without padding, safe to embed in a link.
pub fn generate_share_token() -> String {
    let mut token = [0u8; SHARE_TOKEN_SIZE];
    OsRng.fill_bytes(&mut token);
    general_purpose::URL_SAFE_NO_PAD.encode(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_tokens_are_hex_and_random() {
        let token = generate_session_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_session_token());
    }

    #[test]
    fn share_tokens_are_url_safe() {
        let token = generate_share_token();
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(token, generate_share_token());
    }
}
