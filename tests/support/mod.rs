//! Shared helpers for the router-level integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use futures::future::BoxFuture;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tower::ServiceExt;

use edugrade::clock::ManualClock;
use edugrade::config::{Config, RateLimitPolicy, RateLimits};
use edugrade::db::{DocumentStore, MemoryStore};
use edugrade::error::Result;
use edugrade::models::store::StoreData;
use edugrade::routes::build_router;
use edugrade::state::AppState;

pub const PASSWORD: &str = "geheim123";

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 3, 7, 30, 0).unwrap()
}

/// Cheap hashing and rate limits far above anything a test sends.
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

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_store(config, MemoryStore::new())
    }

    pub fn with_store(config: Config, store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self::with_backend(config, store.clone(), store)
    }

    /// Serves from `backend`; `store` is the memory store underneath it.
    pub fn with_backend(
        config: Config,
        backend: Arc<dyn DocumentStore>,
        store: Arc<MemoryStore>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(start()));
        let state = AppState::with_store(&config, backend, clock.clone());
        let router = build_router(state.clone());
        Self {
            router,
            state,
            store,
            clock,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn register(&self, username: &str) -> TestResponse {
        self.send(
            Method::POST,
            "/api/register",
            None,
            Some(json!({
                "username": username,
                "email": format!("{}@schule.at", username),
                "password": PASSWORD,
                "password_confirm": PASSWORD
            })),
        )
        .await
    }

    pub async fn login(&self, username: &str) -> TestResponse {
        self.send(
            Method::POST,
            "/api/login",
            None,
            Some(json!({
                "email": format!("{}@schule.at", username),
                "password": PASSWORD
            })),
        )
        .await
    }

    /// Registers and logs in; returns the session token.
    pub async fn teacher(&self, username: &str) -> String {
        let registered = self.register(username).await;
        assert_eq!(registered.status, StatusCode::OK, "{:?}", registered.body);
        let logged_in = self.login(username).await;
        assert_eq!(logged_in.status, StatusCode::OK, "{:?}", logged_in.body);
        logged_in.body["token"].as_str().unwrap().to_string()
    }

    /// Logs an already registered teacher in again; returns the new session token.
    pub async fn relogin(&self, username: &str) -> String {
        let logged_in = self.login(username).await;
        assert_eq!(logged_in.status, StatusCode::OK, "{:?}", logged_in.body);
        logged_in.body["token"].as_str().unwrap().to_string()
    }

    pub async fn save(&self, token: &str, document: Value) -> TestResponse {
        self.send(Method::POST, "/api/data", Some(token), Some(document))
            .await
    }

    pub async fn verify_pin(&self, share_token: &str, pin: &str) -> TestResponse {
        self.send(
            Method::POST,
            &format!("/api/grades/{}/verify", share_token),
            None,
            Some(json!({ "pin": pin })),
        )
        .await
    }
}

/// A gradebook with class `c1` (Anna, Ben) and class `c2` (Clara).
pub fn gradebook(anna_grade: &str) -> Value {
    json!({
        "teacherName": "Frau Berger",
        "currentClassId": "c1",
        "classes": [
            {
                "id": "c1",
                "name": "4A",
                "subjects": ["Mathematik"],
                "students": [
                    {"id": "s1", "name": "Anna", "grades": [{"value": anna_grade, "categoryId": "cat1"}]},
                    {"id": "s2", "name": "Ben", "grades": [{"value": "3", "categoryId": "cat1"}]}
                ]
            },
            {
                "id": "c2",
                "name": "4B",
                "students": [{"id": "s3", "name": "Clara", "grades": []}]
            }
        ],
        "categories": [{"id": "cat1", "name": "Schularbeit", "weight": 50}],
        "tutorial": {"completed": true, "neverShowAgain": true}
    })
}

/// Finds the PIN issued to `student_id` in a create/regenerate response.
pub fn pin_for(body: &Value, student_id: &str) -> String {
    body["pins"]
        .as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["student_id"] == student_id)
        .and_then(|entry| entry["pin"].as_str())
        .unwrap()
        .to_string()
}

/// A memory store that can hold one chosen load after it has read its snapshot,
/// until the test releases it.
#[derive(Default)]
pub struct GatedStore {
    pub inner: Arc<MemoryStore>,
    countdown: AtomicUsize,
    held: Notify,
    release: Notify,
}

impl GatedStore {
    /// Lets `pass` loads through, then holds the next one.
    pub fn hold_after(&self, pass: usize) {
        self.countdown.store(pass + 1, Ordering::SeqCst);
    }

    /// Resolves once the held load has read its snapshot.
    pub async fn wait_held(&self) {
        self.held.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

impl DocumentStore for GatedStore {
    fn load(&self) -> BoxFuture<'_, Result<StoreData>> {
        Box::pin(async move {
            let previous = self
                .countdown
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .unwrap_or(0);
            let data = self.inner.load().await?;
            if previous == 1 {
                self.held.notify_one();
                self.release.notified().await;
            }
            Ok(data)
        })
    }

    fn save<'a>(&'a self, data: &'a StoreData) -> BoxFuture<'a, Result<()>> {
        self.inner.save(data)
    }
}
