use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use http::{header, HeaderValue, Method};
use std::time::Duration;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    handlers,
    middleware_layer::{auth::require_auth, rate_limit},
    state::AppState,
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("⚠️  Ignoring invalid CORS origin {}: {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::COOKIE,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400))
}

/// Builds the full HTTP surface.
///
/// Each route group carries its own rate class; on authenticated groups the rate
/// limit runs before authentication.
pub fn build_router(state: AppState) -> Router {
    let register_routes = Router::new()
        .route("/api/register", post(handlers::auth::register))
        .route_layer(from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_register,
        ))
        .with_state(state.clone());

    let login_routes = Router::new()
        .route("/api/login", post(handlers::auth::login))
        .route_layer(from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_login,
        ))
        .with_state(state.clone());

    let grade_routes = Router::new()
        .route("/api/grades/{token}/verify", post(handlers::grades::verify_pin))
        .route_layer(from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_pin_verify,
        ))
        .with_state(state.clone());

    let session_routes = Router::new()
        .route("/api/logout", post(handlers::auth::logout))
        .route("/api/account", delete(handlers::auth::delete_account))
        .route("/api/heartbeat", post(handlers::data::heartbeat))
        .route("/api/disconnect", post(handlers::data::disconnect))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .route_layer(from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_default,
        ))
        .with_state(state.clone());

    let data_routes = Router::new()
        .route(
            "/api/data",
            get(handlers::data::get_data).post(handlers::data::save_data),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .route_layer(from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_data,
        ))
        .with_state(state.clone());

    let share_routes = Router::new()
        .route("/api/share/class", post(handlers::shares::create_share))
        .route(
            "/api/share/class/{token}",
            put(handlers::shares::update_share).delete(handlers::shares::revoke_share),
        )
        .route(
            "/api/share/class/{token}/regenerate-pins",
            post(handlers::shares::regenerate_pins),
        )
        .route(
            "/api/share/class/status/{class_id}",
            get(handlers::shares::share_status),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .route_layer(from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_share_manage,
        ))
        .with_state(state.clone());

    Router::new()
        .merge(register_routes)
        .merge(login_routes)
        .merge(grade_routes)
        .merge(session_routes)
        .merge(data_routes)
        .merge(share_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(cors_layer(&state.config.cors_origins))
}
