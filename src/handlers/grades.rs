use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::{
    error::Result,
    models::share::StudentView,
    services::pin_auth,
    state::AppState,
};

/// The request payload for a student's PIN check.
#[derive(Deserialize)]
pub struct VerifyPinRequest {
    pub pin: String,
}

/// Unlocks one student's grades with their PIN. No session required.
#[axum::debug_handler]
pub async fn verify_pin(
    State(state): State<AppState>,
    Path(share_token): Path<String>,
    Json(payload): Json<VerifyPinRequest>,
) -> Result<Json<StudentView>> {
    let view = pin_auth::verify(&state, &share_token, &payload.pin).await?;
    Ok(Json(view))
}
