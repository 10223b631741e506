// SPDX-License-Identifier: Apache-2.0
use std::fs;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::GatewayError;

/// Environment variable for the upstream API base URL
pub const BACKEND_URL_ENV: &str = "BACKEND_URL";
/// Environment variable for the canonical apex cookie domain
pub const APEX_DOMAIN_ENV: &str = "PONTGATE_APEX_DOMAIN";
/// Environment variable for the idle-session timeout in milliseconds
pub const IDLE_TIMEOUT_ENV: &str = "PONTGATE_IDLE_TIMEOUT_MS";
/// Environment variable selecting the deployment environment
pub const DEPLOY_ENV: &str = "PONTGATE_ENV";
/// Environment variable for the listen address
pub const LISTEN_ADDR_ENV: &str = "PONTGATE_LISTEN_ADDR";

/// Optional TOML configuration file, overridden by environment variables
pub const CONFIG_FILE: &str = "config/gateway.toml";

const DEFAULT_APEX_DOMAIN: &str = "pont-facturx.com";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:7880";
/// 30 minutes of inactivity before a session is forcibly invalidated
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30 * 60 * 1000;

/// Shape of `config/gateway.toml`; every field optional so the file can set
/// only what differs from the defaults.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    listen_addr: Option<String>,
    backend_url: Option<String>,
    apex_domain: Option<String>,
    idle_timeout_ms: Option<u64>,
    production: Option<bool>,
}

/// Explicit gateway configuration, built once at startup and injected into
/// handlers via `web::Data`. Handlers never read the process environment.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the HTTP server binds to
    pub listen_addr: String,
    /// Upstream API base URL. `None` is tolerated at startup; handlers that
    /// need it answer 500 per request instead of panicking the process.
    pub backend_url: Option<String>,
    /// Canonical apex domain used for cookie sharing between apex and www
    pub apex_domain: String,
    /// Rolling idle-session timeout in milliseconds
    pub idle_timeout_ms: u64,
    /// Gates the `Secure` cookie flag and explicit cookie-domain scoping
    pub production: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            backend_url: None,
            apex_domain: DEFAULT_APEX_DOMAIN.to_string(),
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            production: false,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from `config/gateway.toml` (if present) with
    /// environment-variable overrides on top.
    pub fn load() -> Self {
        let file = match fs::read_to_string(CONFIG_FILE) {
            Ok(text) => match toml::from_str::<FileConfig>(&text) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!("Failed to parse {}: {}", CONFIG_FILE, e);
                    FileConfig::default()
                }
            },
            Err(_) => FileConfig::default(),
        };

        let defaults = GatewayConfig::default();

        let listen_addr = std::env::var(LISTEN_ADDR_ENV)
            .ok()
            .or(file.listen_addr)
            .unwrap_or(defaults.listen_addr);

        let backend_url = std::env::var(BACKEND_URL_ENV).ok().or(file.backend_url);

        let apex_domain = std::env::var(APEX_DOMAIN_ENV)
            .ok()
            .or(file.apex_domain)
            .unwrap_or(defaults.apex_domain);

        let idle_timeout_ms = std::env::var(IDLE_TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.idle_timeout_ms)
            .unwrap_or(defaults.idle_timeout_ms);

        let production = std::env::var(DEPLOY_ENV)
            .map(|v| v.eq_ignore_ascii_case("production"))
            .ok()
            .or(file.production)
            .unwrap_or(false);

        let config = Self {
            listen_addr,
            backend_url,
            apex_domain,
            idle_timeout_ms,
            production,
        };

        info!("Gateway configuration:");
        info!("  Listen address: {}", config.listen_addr);
        info!(
            "  Upstream: {}",
            config.backend_url.as_deref().unwrap_or("<unset>")
        );
        info!("  Apex domain: {}", config.apex_domain);
        info!("  Idle timeout: {} ms", config.idle_timeout_ms);
        info!("  Production: {}", config.production);

        config
    }

    /// Upstream base URL, or the configuration error every handler that
    /// forwards upstream must surface as a 500.
    pub fn upstream(&self) -> Result<&str, GatewayError> {
        self.backend_url
            .as_deref()
            .ok_or(GatewayError::MissingUpstream)
    }
}
