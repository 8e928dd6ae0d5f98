//! Shared test helpers, available to all `#[cfg(test)]` modules in the crate.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use crate::clock::ManualClock;
use crate::config::{Config, RateLimitPolicy, RateLimits};
use crate::db::MemoryStore;
use crate::models::document::Document;
use crate::models::session::AuthSession;
use crate::services::{auth, sessions};
use crate::state::AppState;
use crate::validation::auth::RegisterRequest;

pub const PASSWORD: &str = "geheim123";

/// A `Config` with cheap hashing and limits high enough never to trigger.
pub fn test_config() -> Config {
    let generous = RateLimitPolicy::new(10_000, 60);
    Config {
        password_hash_iterations: 1_000,
        key_derivation_iterations: 1_000,
        pin_hash_memory_kib: 1024,
        pin_hash_iterations: 1,
        rate_limits: RateLimits {
            login: generous,
            register: generous,
            pin_verify: generous,
            data_write: generous,
            data_read: generous,
            share_manage: generous,
            default: generous,
        },
        ..Config::default()
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 6, 8, 0, 0).unwrap()
}

/// A fresh state over an in-memory store and a manual clock starting at [`t0`].
pub struct TestEnv {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

pub fn test_env() -> TestEnv {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let state = AppState::with_store(&test_config(), store.clone(), clock.clone());
    TestEnv { state, store, clock }
}

/// Registers `username` and logs in, returning the resolved caller.
pub async fn register_and_login(state: &AppState, username: &str) -> AuthSession {
    let email = format!("{}@schule.at", username);
    auth::register(
        state,
        RegisterRequest {
            username: username.to_string(),
            email: email.clone(),
            password: PASSWORD.to_string(),
            password_confirm: PASSWORD.to_string(),
        },
    )
    .await
    .unwrap();

    let outcome = auth::login(state, &email, PASSWORD.to_string()).await.unwrap();
    sessions::resolve_session(state, &outcome.token)
        .await
        .unwrap()
        .unwrap()
}

/// A gradebook with class `c1` holding Anna (grade `anna_grade`) and Ben.
pub fn gradebook(anna_grade: &str) -> Document {
    serde_json::from_value(json!({
        "teacherName": "Frau Berger",
        "classes": [{
            "id": "c1",
            "name": "4A",
            "subjects": ["Mathematik"],
            "students": [
                {"id": "s1", "name": "Anna", "grades": [{"value": anna_grade, "categoryId": "cat1"}]},
                {"id": "s2", "name": "Ben", "grades": [{"value": "3", "categoryId": "cat1"}]}
            ]
        }],
        "categories": [{"id": "cat1", "name": "Schularbeit", "weight": 50}]
    }))
    .unwrap()
}
