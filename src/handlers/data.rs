use axum::{extract::State, response::IntoResponse, Extension, Json};
use serde::Serialize;

use crate::{
    error::Result,
    models::{document::Document, session::AuthSession},
    services::data as data_service,
    state::AppState,
};

#[derive(Serialize)]
pub struct SaveResponse {
    pub success: bool,
}

#[derive(Serialize)]
pub struct HeartbeatResponse {
    pub success: bool,
    pub cached: bool,
}

/// Returns the caller's decrypted document.
#[axum::debug_handler]
pub async fn get_data(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<Document>> {
    let document = data_service::get_data(&state, &session).await?;
    Ok(Json(document))
}

/// Replaces the caller's document.
#[axum::debug_handler]
pub async fn save_data(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Json(document): Json<Document>,
) -> Result<impl IntoResponse> {
    data_service::save_data(&state, &session, document).await?;
    Ok(Json(SaveResponse { success: true }))
}

/// Keeps the caller's cache entry warm.
#[axum::debug_handler]
pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> Json<HeartbeatResponse> {
    let cached = data_service::heartbeat(&state, &session).await;
    Json(HeartbeatResponse {
        success: true,
        cached,
    })
}

/// Drops the caller's cache entry when the client closes.
#[axum::debug_handler]
pub async fn disconnect(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> Json<SaveResponse> {
    let evicted = data_service::disconnect(&state, &session).await;
    tracing::debug!("🔌 Client disconnected (cache entry evicted: {})", evicted);
    Json(SaveResponse { success: true })
}
