use uuid::Uuid;

use crate::models::{account::Account, store::StoreData};

/// Normalises an email into the store key: trimmed and lower-cased.
pub fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Finds an account by its email address (case-insensitive).
///
/// # Arguments
///
/// * `data` - The loaded store.
/// * `email` - The email address to look up.
///
/// # Returns
///
/// The account, or `None` if no account uses that email.
pub fn find_by_email<'a>(data: &'a StoreData, email: &str) -> Option<&'a Account> {
    data.users.get(&email_key(email))
}

/// Finds an account by its ID.
pub fn find_by_id<'a>(data: &'a StoreData, account_id: &str) -> Option<&'a Account> {
    data.users.values().find(|account| account.id == account_id)
}

/// Returns true if the username is already taken (case-insensitive).
pub fn username_taken(data: &StoreData, username: &str) -> bool {
    let wanted = username.to_lowercase();
    data.users
        .values()
        .any(|account| account.username.to_lowercase() == wanted)
}

/// Generates an account ID that collides with no existing account or document key.
pub fn generate_account_id(data: &StoreData) -> String {
    loop {
        let id = Uuid::new_v4().to_string();
        if find_by_id(data, &id).is_none() && !data.user_data.contains_key(&id) {
            return id;
        }
        tracing::debug!("Account id collision, regenerating");
    }
}

/// Inserts an account under its email key.
pub fn insert(data: &mut StoreData, account: Account) {
    data.users.insert(email_key(&account.email), account);
}

/// Removes an account and everything it owns.
///
/// Order is document, then shares with their PIN entries, then sessions, then the
/// account record.
///
/// # Arguments
///
/// * `data` - The store being mutated.
/// * `account_id` - The account to remove.
///
/// # Returns
///
/// The tokens of the removed sessions.
pub fn remove_with_owned_data(data: &mut StoreData, account_id: &str) -> Vec<String> {
    data.user_data.remove(account_id);

    data.class_shares
        .retain(|_, share| share.account_id != account_id);

    let tokens: Vec<String> = data
        .sessions
        .iter()
        .filter(|(_, session)| session.account_id == account_id)
        .map(|(token, _)| token.clone())
        .collect();
    for token in &tokens {
        data.sessions.remove(token);
    }

    data.users.retain(|_, account| account.id != account_id);

    tokens
}
