use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::{account::Account, session::Session, share::ClassShare};

/// How a user's document sits in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredDocument {
    /// `{ "encrypted": true, "ciphertext": "..." }`
    Encrypted { encrypted: bool, ciphertext: String },
    /// A plaintext document written before encryption existed. Kept as raw JSON so
    /// one odd record never fails the whole store; migrated at login.
    Legacy(Box<Value>),
}

impl StoredDocument {
    pub fn sealed(ciphertext: String) -> Self {
        StoredDocument::Encrypted {
            encrypted: true,
            ciphertext,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, StoredDocument::Encrypted { encrypted: true, .. })
    }
}

/// The whole persisted store: one structured document loaded and saved atomically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    /// Accounts keyed by lower-cased email.
    #[serde(default)]
    pub users: BTreeMap<String, Account>,
    /// Sessions keyed by token.
    #[serde(default)]
    pub sessions: BTreeMap<String, Session>,
    /// Documents keyed by account id.
    #[serde(default)]
    pub user_data: BTreeMap<String, StoredDocument>,
    /// Class shares keyed by share token.
    #[serde(default)]
    pub class_shares: BTreeMap<String, ClassShare>,
}
