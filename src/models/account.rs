use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a teacher account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Opaque, globally unique identifier.
    pub id: String,
    /// The display/login name.
    pub username: String,
    /// Lower-cased email address; the unique lookup key.
    pub email: String,
    /// PBKDF2 verifier, `salt_hex:hash_hex`.
    pub password_hash: String,
    /// Hex salt for deriving the document key. Absent on accounts created before
    /// documents were encrypted; filled in at the next login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_salt: Option<String>,
    /// The timestamp when the account was created.
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
}

/// The public part of an account, as returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            username: account.username.clone(),
            email: account.email.clone(),
        }
    }
}
