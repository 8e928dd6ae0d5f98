use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    models::{
        session::AuthSession,
        share::{IssuedPin, ShareStatus, VisibilityPolicy},
    },
    services::shares::{self as share_service, CreatedShare, ShareUpdate},
    state::AppState,
};

/// The request payload for creating a class share.
#[derive(Deserialize, Debug)]
pub struct CreateShareRequest {
    pub class_id: String,
    pub expires_hours: Option<i64>,
    #[serde(default)]
    pub visibility: VisibilityPolicy,
}

/// The request payload for updating a class share.
#[derive(Deserialize, Debug)]
pub struct UpdateShareRequest {
    pub visibility: Option<VisibilityPolicy>,
    pub expires_hours: Option<i64>,
}

#[derive(Serialize)]
pub struct CreateShareResponse {
    pub success: bool,
    #[serde(flatten)]
    pub share: CreatedShare,
}

#[derive(Serialize)]
pub struct UpdateShareResponse {
    pub success: bool,
    pub share: ShareStatus,
}

#[derive(Serialize)]
pub struct PinsResponse {
    pub success: bool,
    pub pins: Vec<IssuedPin>,
}

#[derive(Serialize)]
pub struct RevokeResponse {
    pub success: bool,
}

/// Creates a share for one of the caller's classes.
#[axum::debug_handler]
pub async fn create_share(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Json(payload): Json<CreateShareRequest>,
) -> Result<impl IntoResponse> {
    tracing::debug!("🔗 Share request: {:?}", payload);
    let share = share_service::create_share(
        &state,
        &session,
        &payload.class_id,
        payload.expires_hours,
        payload.visibility,
    )
    .await?;

    Ok(Json(CreateShareResponse {
        success: true,
        share,
    }))
}

/// Changes visibility or lifetime of a share.
#[axum::debug_handler]
pub async fn update_share(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(share_token): Path<String>,
    Json(payload): Json<UpdateShareRequest>,
) -> Result<impl IntoResponse> {
    let share = share_service::update_share(
        &state,
        &session,
        &share_token,
        ShareUpdate {
            visibility: payload.visibility,
            expires_hours: payload.expires_hours,
        },
    )
    .await?;

    Ok(Json(UpdateShareResponse {
        success: true,
        share,
    }))
}

/// Revokes a share.
#[axum::debug_handler]
pub async fn revoke_share(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(share_token): Path<String>,
) -> Result<impl IntoResponse> {
    share_service::revoke_share(&state, &session, &share_token).await?;
    Ok(Json(RevokeResponse { success: true }))
}

/// Issues fresh PINs for every student of a share.
#[axum::debug_handler]
pub async fn regenerate_pins(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(share_token): Path<String>,
) -> Result<impl IntoResponse> {
    let pins = share_service::regenerate_pins(&state, &session, &share_token).await?;
    Ok(Json(PinsResponse {
        success: true,
        pins,
    }))
}

/// Reports whether a class currently has a live share.
#[axum::debug_handler]
pub async fn share_status(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(class_id): Path<String>,
) -> Result<Json<ShareStatus>> {
    let status = share_service::get_status(&state, &session, &class_id).await?;
    Ok(Json(status))
}
