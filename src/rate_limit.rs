// SPDX-License-Identifier: Apache-2.0
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;
use tracing::{info, warn};

/// Environment variable names for rate limiting configuration
pub const LOGIN_RATE_LIMIT_ENV: &str = "PONTGATE_LOGIN_RATE_LIMIT";
pub const RATE_LIMIT_ENABLED_ENV: &str = "PONTGATE_RATE_LIMIT_ENABLED";

/// Default rate limit values
pub const DEFAULT_LOGIN_RATE_LIMIT: u32 = 5; // 5 attempts per minute per IP

// Bounded store size; oldest IPs are evicted first
const STORE_CAPACITY: usize = 10_000;

/// Configuration for auth-endpoint rate limiting
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Number of auth attempts allowed per minute per IP
    pub login_rate_limit: u32,
    /// Whether rate limiting is enabled
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_rate_limit: DEFAULT_LOGIN_RATE_LIMIT,
            enabled: true,
        }
    }
}

impl RateLimitConfig {
    /// Load rate limit configuration from environment variables or use defaults
    pub fn from_env() -> Self {
        let login_rate_limit = std::env::var(LOGIN_RATE_LIMIT_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_LOGIN_RATE_LIMIT);

        let enabled = std::env::var(RATE_LIMIT_ENABLED_ENV)
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true);

        Self {
            login_rate_limit,
            enabled,
        }
    }
}

/// Simple timestamp for rate limiting
#[derive(Debug, Clone, Copy)]
struct Timestamp(std::time::SystemTime);

impl Timestamp {
    fn now() -> Self {
        Timestamp(std::time::SystemTime::now())
    }

    fn elapsed(&self) -> Duration {
        self.0.elapsed().unwrap_or_else(|_| Duration::from_secs(0))
    }
}

/// Per-IP limiter for the auth endpoints (login, signup, Google exchange).
///
/// The store is an explicitly-scoped LRU handed to the server via `web::Data`
/// rather than process-global state, so multi-instance deployments degrade to
/// per-instance limits instead of silently sharing a broken global.
pub struct LoginRateLimiter {
    /// Maps IP -> (count, last_reset_time)
    attempts: Mutex<LruCache<String, (u32, Timestamp)>>,
    /// Maximum attempts allowed per period
    max_attempts: u32,
    /// Reset period (typically 1 minute)
    period: Duration,
    /// Whether rate limiting is enabled
    enabled: bool,
}

impl LoginRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let attempts = Mutex::new(LruCache::new(
            NonZeroUsize::new(STORE_CAPACITY).expect("capacity is non-zero"),
        ));
        Self {
            attempts,
            max_attempts: config.login_rate_limit,
            period: Duration::from_secs(60),
            enabled: config.enabled,
        }
    }

    /// Check if an IP address is allowed another auth attempt.
    /// Returns true if allowed, false if rate-limited.
    pub fn check_ip(&self, ip: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let now = Timestamp::now();
        let mut attempts = self.attempts.lock().unwrap();

        let entry = attempts.get_or_insert_mut(ip.to_string(), || (0, now));

        // If the period has elapsed, reset the counter
        if entry.1.elapsed() >= self.period {
            *entry = (1, now); // Reset with this attempt counted
            return true;
        }

        // Check if we're under the limit
        if entry.0 < self.max_attempts {
            entry.0 += 1;
            true
        } else {
            warn!("Rate limited auth attempt from IP: {}", ip);
            false
        }
    }
}

/// Container injected once into the server
pub struct RateLimiters {
    pub login_limiter: LoginRateLimiter,
    pub config: RateLimitConfig,
}

impl RateLimiters {
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::from_env())
    }

    pub fn with_config(config: RateLimitConfig) -> Self {
        info!("Rate limiting configuration:");
        info!("  Enabled: {}", config.enabled);
        info!(
            "  Auth rate limit: {} per minute per IP",
            config.login_rate_limit
        );

        let login_limiter = LoginRateLimiter::new(&config);

        Self {
            login_limiter,
            config,
        }
    }
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new()
    }
}
