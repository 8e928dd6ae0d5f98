use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use anyhow::{Context, Result};
use chrono::Duration;

/// Endpoint classes the rate limiter tracks separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateClass {
    Login,
    Register,
    PinVerify,
    DataWrite,
    DataRead,
    ShareManage,
    Default,
}

impl RateClass {
    pub const ALL: [RateClass; 7] = [
        RateClass::Login,
        RateClass::Register,
        RateClass::PinVerify,
        RateClass::DataWrite,
        RateClass::DataRead,
        RateClass::ShareManage,
        RateClass::Default,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RateClass::Login => "login",
            RateClass::Register => "register",
            RateClass::PinVerify => "pin_verify",
            RateClass::DataWrite => "data_write",
            RateClass::DataRead => "data_read",
            RateClass::ShareManage => "share_manage",
            RateClass::Default => "default",
        }
    }
}

/// A ceiling of `max_requests` inside a trailing window of `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: usize,
    pub window_secs: i64,
}

impl RateLimitPolicy {
    pub const fn new(max_requests: usize, window_secs: i64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::seconds(self.window_secs)
    }
}

impl FromStr for RateLimitPolicy {
    type Err = anyhow::Error;

    /// Parses `N/SECONDS`, e.g. `5/60`.
    fn from_str(s: &str) -> Result<Self> {
        let (count, window) = s
            .split_once('/')
            .context("rate limit must look like N/SECONDS")?;
        let max_requests: usize = count.trim().parse().context("invalid request count")?;
        let window_secs: i64 = window.trim().parse().context("invalid window seconds")?;
        if max_requests == 0 || window_secs <= 0 {
            anyhow::bail!("rate limit count and window must be positive");
        }
        Ok(Self::new(max_requests, window_secs))
    }
}

/// Per-class rate limit ceilings.
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub login: RateLimitPolicy,
    pub register: RateLimitPolicy,
    pub pin_verify: RateLimitPolicy,
    pub data_write: RateLimitPolicy,
    pub data_read: RateLimitPolicy,
    pub share_manage: RateLimitPolicy,
    pub default: RateLimitPolicy,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            login: RateLimitPolicy::new(5, 60),
            register: RateLimitPolicy::new(3, 60),
            pin_verify: RateLimitPolicy::new(5, 60),
            data_write: RateLimitPolicy::new(30, 60),
            data_read: RateLimitPolicy::new(60, 60),
            share_manage: RateLimitPolicy::new(30, 60),
            default: RateLimitPolicy::new(100, 60),
        }
    }
}

impl RateLimits {
    pub fn policy(&self, class: RateClass) -> RateLimitPolicy {
        match class {
            RateClass::Login => self.login,
            RateClass::Register => self.register,
            RateClass::PinVerify => self.pin_verify,
            RateClass::DataWrite => self.data_write,
            RateClass::DataRead => self.data_read,
            RateClass::ShareManage => self.share_manage,
            RateClass::Default => self.default,
        }
    }

    fn policy_mut(&mut self, class: RateClass) -> &mut RateLimitPolicy {
        match class {
            RateClass::Login => &mut self.login,
            RateClass::Register => &mut self.register,
            RateClass::PinVerify => &mut self.pin_verify,
            RateClass::DataWrite => &mut self.data_write,
            RateClass::DataRead => &mut self.data_read,
            RateClass::ShareManage => &mut self.share_manage,
            RateClass::Default => &mut self.default,
        }
    }
}

/// The application's configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// The socket the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// The JSON file holding accounts, sessions, documents and shares.
    pub data_path: PathBuf,
    /// Absolute session lifetime in hours.
    pub session_duration_hours: i64,
    /// Heartbeat timeout `H` for the decrypted-data cache.
    pub cache_heartbeat_timeout_secs: i64,
    /// How long an expired share lingers before the sweep hard-deletes it.
    pub share_grace_hours: i64,
    /// Share lifetime when the request does not specify one.
    pub default_share_hours: i64,
    /// Interval of the background sweeper.
    pub sweep_interval_secs: u64,
    /// PBKDF2 iterations for password verifiers.
    pub password_hash_iterations: u32,
    /// PBKDF2 iterations for document encryption keys.
    pub key_derivation_iterations: u32,
    /// Argon2 memory cost (KiB) for PIN hashes.
    pub pin_hash_memory_kib: u32,
    /// Argon2 time cost for PIN hashes.
    pub pin_hash_iterations: u32,
    /// Origins allowed by CORS.
    pub cors_origins: Vec<String>,
    /// Marks session cookies `Secure`.
    pub secure_cookies: bool,
    /// Rate limit policies per endpoint class.
    pub rate_limits: RateLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 1601)),
            data_path: PathBuf::from("data/edugrade.json"),
            session_duration_hours: 1,
            cache_heartbeat_timeout_secs: 120,
            share_grace_hours: 24,
            default_share_hours: 168,
            sweep_interval_secs: 300,
            password_hash_iterations: 200_000,
            key_derivation_iterations: 100_000,
            pin_hash_memory_kib: 8192,
            pin_hash_iterations: 2,
            cors_origins: vec![
                "http://localhost:1601".to_string(),
                "http://127.0.0.1:1601".to_string(),
            ],
            secure_cookies: false,
            rate_limits: RateLimits::default(),
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// Every variable is optional; unset variables keep the defaults above.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let mut rate_limits = RateLimits::default();
        for class in RateClass::ALL {
            let var = format!("RATE_LIMIT_{}", class.as_str().to_uppercase());
            if let Ok(raw) = env::var(&var) {
                *rate_limits.policy_mut(class) = raw
                    .parse()
                    .with_context(|| format!("Invalid {}", var))?;
            }
        }

        let cors_origins = match env::var("CORS_ORIGINS") {
            Ok(raw) => raw
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            Err(_) => defaults.cors_origins.clone(),
        };

        let is_production = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string()) == "production";

        let config = Self {
            bind_addr: parse_var("BIND_ADDR", defaults.bind_addr)?,
            data_path: env::var("DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_path),
            session_duration_hours: parse_var(
                "SESSION_DURATION_HOURS",
                defaults.session_duration_hours,
            )?,
            cache_heartbeat_timeout_secs: parse_var(
                "CACHE_HEARTBEAT_TIMEOUT_SECS",
                defaults.cache_heartbeat_timeout_secs,
            )?,
            share_grace_hours: parse_var("SHARE_GRACE_HOURS", defaults.share_grace_hours)?,
            default_share_hours: parse_var("DEFAULT_SHARE_HOURS", defaults.default_share_hours)?,
            sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?,
            password_hash_iterations: parse_var(
                "PASSWORD_HASH_ITERATIONS",
                defaults.password_hash_iterations,
            )?,
            key_derivation_iterations: parse_var(
                "KEY_DERIVATION_ITERATIONS",
                defaults.key_derivation_iterations,
            )?,
            pin_hash_memory_kib: parse_var("PIN_HASH_MEMORY_KIB", defaults.pin_hash_memory_kib)?,
            pin_hash_iterations: parse_var("PIN_HASH_ITERATIONS", defaults.pin_hash_iterations)?,
            cors_origins,
            secure_cookies: is_production,
            rate_limits,
        };

        if config.session_duration_hours <= 0 {
            anyhow::bail!("SESSION_DURATION_HOURS must be positive");
        }
        if config.cache_heartbeat_timeout_secs <= 0 {
            anyhow::bail!("CACHE_HEARTBEAT_TIMEOUT_SECS must be positive");
        }
        if config.password_hash_iterations == 0 || config.key_derivation_iterations == 0 {
            anyhow::bail!("PBKDF2 iteration counts must be positive");
        }

        Ok(config)
    }

    pub fn session_duration(&self) -> Duration {
        Duration::hours(self.session_duration_hours)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::seconds(self.cache_heartbeat_timeout_secs)
    }

    pub fn share_grace(&self) -> Duration {
        Duration::hours(self.share_grace_hours)
    }
}
