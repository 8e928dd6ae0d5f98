use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a persisted login session.
///
/// The document key derived at login is not part of this record; it lives only
/// in the in-memory key vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The ID of the account this session belongs to.
    #[serde(rename = "user_id")]
    pub account_id: String,
    /// The timestamp when the session was created.
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
    /// Absolute expiry; never extended.
    #[serde(with = "crate::models::timestamp")]
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// A session is valid up to and including its expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// The authenticated caller, attached to requests by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub account_id: String,
    pub username: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}
