use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::crypto::aes::{self, SecureKey};
use crate::crypto::pin::PinHasher;
use crate::crypto::vault::KeyVault;
use crate::data_cache::DataCache;
use crate::db::{Database, DocumentStore, JsonFileStore};
use crate::middleware_layer::rate_limit::RateLimiter;

/// The application's state.
///
/// Every process-scoped component is built here once and handed to handlers;
/// nothing lives in globals.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    /// Serialised access to the persisted store.
    pub db: Database,
    /// Source of "now".
    pub clock: Arc<dyn Clock>,
    /// Session token -> document key.
    pub vault: KeyVault,
    /// Session token -> decrypted document.
    pub cache: DataCache,
    /// Sliding-window rate limiter.
    pub limiter: RateLimiter,
    /// Process-lifetime key sealing share snapshots.
    pub master_key: Arc<SecureKey>,
    /// Argon2id hasher for share PINs.
    pub pin_hasher: PinHasher,
}

impl AppState {
    /// Creates a new `AppState` backed by the JSON file named in the configuration.
    pub fn new(config: &Config) -> Self {
        let store = Arc::new(JsonFileStore::new(config.data_path.clone()));
        tracing::info!("✅ JSON store at {}", config.data_path.display());

        Self::with_store(config, store, Arc::new(SystemClock))
    }

    /// Creates a new `AppState` over an arbitrary store and clock.
    pub fn with_store(config: &Config, store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        let master_key = Arc::new(aes::generate_key());
        tracing::info!("✅ Master key generated (share snapshots from earlier runs are unreadable)");

        let cache = DataCache::new(config.heartbeat_timeout());
        tracing::info!(
            "✅ Data cache initialized (heartbeat timeout {}s)",
            config.cache_heartbeat_timeout_secs
        );

        let limiter = RateLimiter::new(config.rate_limits.clone());
        tracing::info!("✅ RateLimiter initialized");

        Self {
            config: Arc::new(config.clone()),
            db: Database::new(store),
            clock,
            vault: KeyVault::new(),
            cache,
            limiter,
            master_key,
            pin_hasher: PinHasher::new(config.pin_hash_memory_kib, config.pin_hash_iterations),
        }
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }
}
