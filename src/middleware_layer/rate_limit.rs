use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    config::{RateClass, RateLimits},
    error::{AppError, Result},
    state::AppState,
};

type WindowKey = (String, RateClass);

/// Sliding-window request counter per `(client IP, endpoint class)`.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<WindowKey, VecDeque<DateTime<Utc>>>>>,
    limits: Arc<RateLimits>,
}

impl RateLimiter {
    /// Creates a new `RateLimiter` with the given per-class policies.
    pub fn new(limits: RateLimits) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            limits: Arc::new(limits),
        }
    }

    /// Records a request from `ip` in `class` if it fits the class ceiling.
    ///
    /// Timestamps that fell out of the trailing window are pruned first. When the
    /// ceiling is reached the request is not recorded.
    ///
    /// # Arguments
    ///
    /// * `ip` - The client address.
    /// * `class` - The endpoint class the request belongs to.
    /// * `now` - The current time.
    ///
    /// # Returns
    ///
    /// `Ok(())`, or `AppError::RateLimitExceeded` carrying how many seconds remain
    /// until the oldest surviving timestamp leaves the window.
    pub async fn check(&self, ip: &str, class: RateClass, now: DateTime<Utc>) -> Result<()> {
        let policy = self.limits.policy(class);
        let window = policy.window();

        let mut windows = self.windows.lock().await;
        let stamps = windows.entry((ip.to_string(), class)).or_default();

        while let Some(oldest) = stamps.front() {
            if now - *oldest >= window {
                stamps.pop_front();
            } else {
                break;
            }
        }

        if stamps.len() < policy.max_requests {
            stamps.push_back(now);
            return Ok(());
        }

        let remaining_ms = stamps
            .front()
            .map(|oldest| (*oldest + window - now).num_milliseconds())
            .unwrap_or(0);
        let retry_after = ((remaining_ms + 999) / 1000).max(1) as u64;

        tracing::warn!(
            "🚦 Rate limit hit: ip={} class={} retry_after={}s",
            ip,
            class.as_str(),
            retry_after
        );
        Err(AppError::RateLimitExceeded { retry_after })
    }

    /// Drops timestamps that left their window and forgets keys left empty.
    pub async fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|(_, class), stamps| {
            let window = self.limits.policy(*class).window();
            stamps.retain(|stamp| now - *stamp < window);
            !stamps.is_empty()
        });
        before - windows.len()
    }

    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }
}

/// Extracts the real IP address from the request extensions.
///
/// # Arguments
///
/// * `req` - The incoming request.
///
/// # Returns
///
/// The IP address as a string, or "unknown" when the server was not started with
/// connect info.
fn extract_real_ip(req: &Request<Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn enforce(state: &AppState, class: RateClass, req: Request<Body>, next: Next) -> Response {
    let ip = extract_real_ip(&req);
    let now = state.clock.now();

    if let Err(e) = state.limiter.check(&ip, class, now).await {
        return e.into_response();
    }

    next.run(req).await
}

/// A middleware that rate limits account registration.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The handler's response, or a 429 response when the ceiling is reached.
pub async fn rate_limit_register(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    enforce(&state, RateClass::Register, req, next).await
}

/// A middleware that rate limits login attempts.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The handler's response, or a 429 response when the ceiling is reached.
pub async fn rate_limit_login(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    enforce(&state, RateClass::Login, req, next).await
}

/// A middleware that rate limits student PIN checks.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The handler's response, or a 429 response when the ceiling is reached.
pub async fn rate_limit_pin_verify(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    enforce(&state, RateClass::PinVerify, req, next).await
}

/// A middleware that rate limits the document endpoint: reads and writes are
/// counted separately.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The handler's response, or a 429 response when the ceiling is reached.
pub async fn rate_limit_data(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let class = if req.method() == Method::GET {
        RateClass::DataRead
    } else {
        RateClass::DataWrite
    };
    enforce(&state, class, req, next).await
}

/// A middleware that rate limits share management.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The handler's response, or a 429 response when the ceiling is reached.
pub async fn rate_limit_share_manage(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    enforce(&state, RateClass::ShareManage, req, next).await
}

/// A middleware applying the default ceiling.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The handler's response, or a 429 response when the ceiling is reached.
pub async fn rate_limit_default(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    enforce(&state, RateClass::Default, req, next).await
}
