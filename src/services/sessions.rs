use chrono::{DateTime, Duration, Utc};

use crate::crypto::tokens::generate_session_token;
use crate::error::Result;
use crate::models::session::{AuthSession, Session};
use crate::models::store::StoreData;
use crate::repositories::account as account_repo;
use crate::state::AppState;

/// Issues a new session for the account and records it in `data`.
///
/// The lifetime is absolute from `now`; nothing ever extends it.
pub fn create_session(
    data: &mut StoreData,
    account_id: &str,
    now: DateTime<Utc>,
    lifetime: Duration,
) -> (String, Session) {
    let token = loop {
        let candidate = generate_session_token();
        if !data.sessions.contains_key(&candidate) {
            break candidate;
        }
    };

    let session = Session {
        account_id: account_id.to_string(),
        created_at: now,
        expires_at: now + lifetime,
    };
    data.sessions.insert(token.clone(), session.clone());
    (token, session)
}

/// Resolves a bearer token to the caller it belongs to.
///
/// Empty, unknown and expired tokens all resolve to `None`. Resolution never
/// renews the session.
pub fn resolve_in(data: &StoreData, token: &str, now: DateTime<Utc>) -> Option<AuthSession> {
    if token.is_empty() {
        return None;
    }

    let session = data.sessions.get(token)?;
    if session.is_expired(now) {
        tracing::debug!("⌛ Session expired for account {}", session.account_id);
        return None;
    }

    let account = account_repo::find_by_id(data, &session.account_id)?;
    Some(AuthSession {
        token: token.to_string(),
        account_id: account.id.clone(),
        username: account.username.clone(),
        email: account.email.clone(),
        expires_at: session.expires_at,
    })
}

/// Resolves a token against the current store.
pub async fn resolve_session(state: &AppState, token: &str) -> Result<Option<AuthSession>> {
    if token.is_empty() {
        return Ok(None);
    }
    let data = state.db.read().await?;
    Ok(resolve_in(&data, token, state.now()))
}

/// Deletes every expired session and evicts its vault key and cache entry.
///
/// Returns the number of sessions removed.
pub async fn expire_sweep(state: &AppState) -> Result<usize> {
    let now = state.now();

    let any_expired = state
        .db
        .read()
        .await?
        .sessions
        .values()
        .any(|session| session.is_expired(now));
    if !any_expired {
        return Ok(0);
    }

    let removed: Vec<String> = state
        .db
        .update(|data| {
            let expired: Vec<String> = data
                .sessions
                .iter()
                .filter(|(_, session)| session.is_expired(now))
                .map(|(token, _)| token.clone())
                .collect();
            for token in &expired {
                data.sessions.remove(token);
            }
            Ok(expired)
        })
        .await?;

    state.vault.evict_many(&removed).await;
    state.cache.evict_many(&removed).await;

    if !removed.is_empty() {
        tracing::info!("🧹 Expired {} session(s)", removed.len());
    }
    Ok(removed.len())
}
