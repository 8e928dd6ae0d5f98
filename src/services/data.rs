use crate::crypto::aes::SecureKey;
use crate::crypto::codec;
use crate::error::{AppError, Result};
use crate::models::document::Document;
use crate::models::session::AuthSession;
use crate::models::store::{StoreData, StoredDocument};
use crate::services::shares;
use crate::state::AppState;

/// Makes sure the account's stored document is ciphertext.
///
/// A plaintext document is sealed with `key`; a missing one is replaced by a
/// sealed default. A plaintext record that is not a readable gradebook is left
/// untouched. Returns true if a plaintext document was migrated.
pub fn seal_document(data: &mut StoreData, account_id: &str, key: &SecureKey) -> Result<bool> {
    match data.user_data.get(account_id) {
        Some(StoredDocument::Legacy(raw)) => {
            let document = match Document::from_legacy(raw.as_ref().clone()) {
                Ok(document) => document,
                Err(e) => {
                    tracing::warn!("⚠️  Plaintext document of {} unreadable, left as is: {}", account_id, e);
                    return Ok(false);
                }
            };
            let ciphertext = codec::encrypt(&document, key)?;
            data.user_data
                .insert(account_id.to_string(), StoredDocument::sealed(ciphertext));
            Ok(true)
        }
        Some(StoredDocument::Encrypted { .. }) => Ok(false),
        None => {
            let ciphertext = codec::encrypt(&Document::default(), key)?;
            data.user_data
                .insert(account_id.to_string(), StoredDocument::sealed(ciphertext));
            Ok(false)
        }
    }
}

/// Reads the caller's document: from the cache when its heartbeat is fresh,
/// otherwise by decrypting the stored ciphertext with the session key.
///
/// `None` means the ciphertext could not be opened with this key.
async fn load_document(
    state: &AppState,
    session: &AuthSession,
    key: &SecureKey,
) -> Result<Option<Document>> {
    let now = state.now();
    if let Some(document) = state.cache.get(&session.token, now).await {
        tracing::debug!("⚡ Cache hit for {}", session.account_id);
        return Ok(Some(document));
    }

    let mark = state.cache.write_mark(&session.account_id).await;
    let stored = state.db.read().await?.user_data.remove(&session.account_id);

    let document = match stored {
        Some(StoredDocument::Encrypted { ciphertext, .. }) => {
            match codec::decrypt::<Document>(&ciphertext, key) {
                Ok(document) => document,
                Err(e) => {
                    tracing::warn!("⚠️  Document of {} unreadable: {}", session.account_id, e);
                    return Ok(None);
                }
            }
        }
        Some(StoredDocument::Legacy(raw)) => {
            let document = match Document::from_legacy(*raw) {
                Ok(document) => document,
                Err(e) => {
                    tracing::warn!("⚠️  Plaintext document of {} unreadable: {}", session.account_id, e);
                    return Ok(None);
                }
            };
            let ciphertext = codec::encrypt(&document, key)?;
            let migrated = state
                .db
                .update(|data| {
                    let still_plaintext = matches!(
                        data.user_data.get(&session.account_id),
                        Some(StoredDocument::Legacy(_))
                    );
                    if still_plaintext {
                        data.user_data
                            .insert(session.account_id.clone(), StoredDocument::sealed(ciphertext));
                    }
                    Ok(still_plaintext)
                })
                .await?;
            if migrated {
                tracing::info!("🔒 Legacy document of {} encrypted on read", session.account_id);
            }
            document
        }
        None => {
            state
                .db
                .update(|data| seal_document(data, &session.account_id, key))
                .await?;
            Document::default()
        }
    };

    state
        .cache
        .insert(&session.token, &session.account_id, document.clone(), now, mark)
        .await;
    Ok(Some(document))
}

/// Returns the caller's document.
///
/// Without a vault key, or when the ciphertext does not open, the caller gets an
/// empty default document. That result is neither cached nor persisted.
pub async fn get_data(state: &AppState, session: &AuthSession) -> Result<Document> {
    let Some(key) = state.vault.get_key_for_session(&session.token).await else {
        tracing::debug!("🔑 No key in vault for session of {}", session.account_id);
        return Ok(Document::default());
    };

    Ok(load_document(state, session, &key).await?.unwrap_or_default())
}

/// Like [`get_data`], but insists on a vault key. Used where the owner's data is
/// needed to act on their behalf.
pub async fn document_for_owner(state: &AppState, session: &AuthSession) -> Result<Document> {
    let key = state
        .vault
        .get_key_for_session(&session.token)
        .await
        .ok_or_else(missing_key)?;

    Ok(load_document(state, session, &key).await?.unwrap_or_default())
}

fn missing_key() -> AppError {
    AppError::AuthenticationRequired("Encryption key missing, please log in again".to_string())
}

/// Encrypts and persists the caller's document, then re-syncs their class shares
/// in the same save and refreshes the cache.
pub async fn save_data(state: &AppState, session: &AuthSession, document: Document) -> Result<()> {
    let key = state
        .vault
        .get_key_for_session(&session.token)
        .await
        .ok_or_else(missing_key)?;

    let ciphertext = codec::encrypt(&document, &key)?;
    let now = state.now();

    let (report, seq) = state
        .db
        .update(|data| {
            data.user_data
                .insert(session.account_id.clone(), StoredDocument::sealed(ciphertext));
            let report =
                shares::sync_on_write(data, &session.account_id, &document, now, &state.master_key)?;
            Ok((report, state.cache.next_write_seq()))
        })
        .await?;

    state
        .cache
        .put(&session.token, &session.account_id, document, now, seq)
        .await;

    if report.synced > 0 || report.deactivated > 0 {
        tracing::debug!(
            "🔄 Shares of {} synced: {} updated, {} deactivated",
            session.account_id,
            report.synced,
            report.deactivated
        );
    }
    Ok(())
}

/// Refreshes the cache heartbeat. Returns whether the session has a warm entry.
pub async fn heartbeat(state: &AppState, session: &AuthSession) -> bool {
    state.cache.heartbeat(&session.token, state.now()).await
}

/// Evicts the session's cache entry; the session and its key stay.
pub async fn disconnect(state: &AppState, session: &AuthSession) -> bool {
    state.cache.disconnect(&session.token).await
}
