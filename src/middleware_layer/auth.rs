use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{error::AppError, services::sessions, state::AppState};

/// The name of the session cookie.
pub const SESSION_COOKIE: &str = "session_token";

/// Extracts the session token: the cookie first, then an `Authorization: Bearer` header.
///
/// # Arguments
///
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
///
/// # Returns
///
/// The token, or `None` if neither source carries a non-empty one.
fn extract_session_token(cookies: &Cookies, request: &Request<Body>) -> Option<String> {
    if let Some(cookie) = cookies.get(SESSION_COOKIE) {
        let value = cookie.value().trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// A middleware that requires a valid session to be present.
///
/// On success the resolved [`AuthSession`](crate::models::session::AuthSession) is
/// attached to the request extensions.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The handler's response, or `AppError::AuthenticationRequired`.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Checking authentication...");

    let token = extract_session_token(&cookies, &request).ok_or_else(|| {
        tracing::debug!("❌ No session token in cookie or header");
        AppError::AuthenticationRequired("Not logged in".to_string())
    })?;

    let session = sessions::resolve_session(&state, &token)
        .await?
        .ok_or_else(|| AppError::AuthenticationRequired("Session expired or invalid".to_string()))?;

    tracing::debug!("✅ Authenticated account: {}", session.account_id);

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}
