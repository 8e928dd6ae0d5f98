use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use crate::crypto::aes::SecureKey;
use crate::crypto::{codec, password, vault};
use crate::error::{AppError, Result};
use crate::models::account::{Account, AccountSummary};
use crate::models::document::Document;
use crate::models::store::{StoreData, StoredDocument};
use crate::repositories::account as account_repo;
use crate::services::{data as data_service, sessions};
use crate::state::AppState;
use crate::validation::auth::RegisterRequest;

/// What a successful login hands back to the client.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub user: AccountSummary,
    pub expires_at: DateTime<Utc>,
}

/// Creates a new account with an encrypted default document.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `request` - The validated registration request.
///
/// # Returns
///
/// The new account's ID, or `AppError::Conflict` if the email or username is taken.
pub async fn register(state: &AppState, request: RegisterRequest) -> Result<String> {
    let email = account_repo::email_key(&request.email);
    let username = request.username.trim().to_string();
    tracing::debug!("🔐 Creating account: {}", username);

    {
        let data = state.db.read().await?;
        check_available(&data, &email, &username)?;
    }

    let password_iterations = state.config.password_hash_iterations;
    let kdf_iterations = state.config.key_derivation_iterations;
    let plain = Zeroizing::new(request.password);
    let (verifier, salt, key) = tokio::task::spawn_blocking(move || -> Result<_> {
        let verifier = password::hash_password(&plain, password_iterations);
        let salt = vault::generate_encryption_salt();
        let key = vault::derive_key(&plain, &salt, kdf_iterations)?;
        Ok((verifier, salt, key))
    })
    .await??;

    let ciphertext = codec::encrypt(&Document::default(), &key)?;
    let now = state.now();

    let account_id = state
        .db
        .update(|data| {
            check_available(data, &email, &username)?;

            let id = account_repo::generate_account_id(data);
            account_repo::insert(
                data,
                Account {
                    id: id.clone(),
                    username: username.clone(),
                    email: email.clone(),
                    password_hash: verifier,
                    encryption_salt: Some(salt),
                    created_at: now,
                },
            );
            data.user_data
                .insert(id.clone(), StoredDocument::sealed(ciphertext));
            Ok(id)
        })
        .await?;

    tracing::info!("✅ Account registered: {}", account_id);
    Ok(account_id)
}

fn check_available(data: &StoreData, email: &str, username: &str) -> Result<()> {
    if account_repo::find_by_email(data, email).is_some() {
        return Err(AppError::Conflict("Email is already registered".to_string()));
    }
    if account_repo::username_taken(data, username) {
        return Err(AppError::Conflict("Username is already taken".to_string()));
    }
    Ok(())
}

/// Verifies credentials, opens a session and places the document key in the vault.
///
/// Accounts that predate encryption get their salt here, and a plaintext document
/// is sealed with the freshly derived key before the session is handed out.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `email` - The login email.
/// * `password` - The cleartext password, zeroized after key derivation.
///
/// # Returns
///
/// A `LoginOutcome` or `AppError::Authentication`.
pub async fn login(state: &AppState, email: &str, password: String) -> Result<LoginOutcome> {
    let email = account_repo::email_key(email);
    let bad_credentials = || AppError::Authentication("Invalid email or password".to_string());

    let account = {
        let data = state.db.read().await?;
        account_repo::find_by_email(&data, &email)
            .cloned()
            .ok_or_else(bad_credentials)?
    };

    let password_iterations = state.config.password_hash_iterations;
    let kdf_iterations = state.config.key_derivation_iterations;
    let plain = Zeroizing::new(password);
    let verifier = account.password_hash.clone();
    let existing_salt = account.encryption_salt.clone();

    let unlocked = tokio::task::spawn_blocking(move || -> Result<Option<(String, SecureKey)>> {
        if !password::verify_password(&verifier, &plain, password_iterations) {
            return Ok(None);
        }
        let salt = existing_salt.unwrap_or_else(vault::generate_encryption_salt);
        let key = vault::derive_key(&plain, &salt, kdf_iterations)?;
        Ok(Some((salt, key)))
    })
    .await??;

    let Some((salt, key)) = unlocked else {
        tracing::warn!("❌ Bad password for {}", account.id);
        return Err(bad_credentials());
    };

    let now = state.now();
    let lifetime = state.config.session_duration();

    let (token, session, migrated) = state
        .db
        .update(|data| {
            let stored = data
                .users
                .get_mut(&email)
                .filter(|stored| stored.id == account.id)
                .ok_or_else(bad_credentials)?;

            match stored.encryption_salt.clone() {
                None => {
                    tracing::info!("🔑 Generated encryption salt for {}", account.id);
                    stored.encryption_salt = Some(salt.clone());
                }
                Some(current) if current != salt => {
                    return Err(AppError::Conflict(
                        "Account changed during login, please try again".to_string(),
                    ));
                }
                Some(_) => {}
            }

            let migrated = data_service::seal_document(data, &account.id, &key)?;
            let (token, session) = sessions::create_session(data, &account.id, now, lifetime);
            Ok((token, session, migrated))
        })
        .await?;

    state.vault.store_key_for_session(&token, key).await;

    if migrated {
        tracing::info!("🔒 Legacy document of {} encrypted at login", account.id);
    }
    tracing::info!("✅ Login successful: {}", account.id);

    Ok(LoginOutcome {
        token,
        user: AccountSummary::from(&account),
        expires_at: session.expires_at,
    })
}

/// Ends a session: the record, its vault key and its cache entry.
pub async fn logout(state: &AppState, token: &str) -> Result<()> {
    state
        .db
        .update(|data| {
            data.sessions.remove(token);
            Ok(())
        })
        .await?;

    state.vault.evict(token).await;
    state.cache.disconnect(token).await;

    tracing::info!("👋 Session closed");
    Ok(())
}

/// Deletes an account with its document, shares, PIN entries and sessions in one save.
pub async fn delete_account(state: &AppState, account_id: &str) -> Result<()> {
    let tokens = state
        .db
        .update(|data| {
            if account_repo::find_by_id(data, account_id).is_none() {
                return Err(AppError::NotFound);
            }
            Ok(account_repo::remove_with_owned_data(data, account_id))
        })
        .await?;

    state.vault.evict_many(&tokens).await;
    state.cache.evict_many(&tokens).await;

    tracing::info!("🗑️ Account {} deleted ({} session(s) closed)", account_id, tokens.len());
    Ok(())
}
