use axum::{
    extract::State,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use garde::Validate;
use serde::Serialize;
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};

use crate::{
    error::Result,
    middleware_layer::auth::SESSION_COOKIE,
    models::{account::AccountSummary, session::AuthSession},
    services::auth as auth_service,
    state::AppState,
    validation::auth::{LoginRequest, RegisterRequest},
};

/// The response payload for registration.
#[derive(Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub user_id: String,
}

/// The response payload for login.
#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: AccountSummary,
    pub expires_at: DateTime<Utc>,
}

/// The response payload for requests that only report success.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

/// Creates the session cookie.
fn create_secure_cookie(value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, value);
    cookie.set_http_only(true);
    if secure {
        cookie.set_secure(true);
    }
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age_secs));
    cookie.set_path("/");
    cookie
}

/// Handles account registration.
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    tracing::info!("📝 Register attempt: {:?}", payload);
    payload.validate()?;

    let user_id = auth_service::register(&state, payload).await?;

    Ok(Json(RegisterResponse {
        success: true,
        user_id,
    }))
}

/// Handles login. The token is set as a cookie and also returned in the body.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    tracing::info!("🔐 Login attempt: {}", payload.email);

    let outcome = auth_service::login(&state, &payload.email, payload.password).await?;

    let max_age = (outcome.expires_at - state.now()).num_seconds().max(0);
    cookies.add(create_secure_cookie(
        outcome.token.clone(),
        max_age,
        state.config.secure_cookies,
    ));
    tracing::debug!("✅ Session cookie added");

    Ok(Json(LoginResponse {
        success: true,
        token: outcome.token,
        user: outcome.user,
        expires_at: outcome.expires_at,
    }))
}

/// Handles logout.
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    cookies: Cookies,
) -> Result<impl IntoResponse> {
    auth_service::logout(&state, &session.token).await?;

    cookies.remove(Cookie::build(SESSION_COOKIE).path("/").build());

    Ok(Json(AuthResponse {
        success: true,
        message: "Logged out".to_string(),
    }))
}

/// Handles account deletion.
#[axum::debug_handler]
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    cookies: Cookies,
) -> Result<impl IntoResponse> {
    auth_service::delete_account(&state, &session.account_id).await?;

    cookies.remove(Cookie::build(SESSION_COOKIE).path("/").build());

    Ok(Json(AuthResponse {
        success: true,
        message: "Account deleted".to_string(),
    }))
}
