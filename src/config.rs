//! Environment-supplied configuration.
//!
//! Every knob is read from the environment once at startup, validated and
//! defaulted here so the core never sees a missing or malformed value. The
//! variable names match the previously deployed service so an existing
//! deployment carries over unchanged.

use std::env;

use crate::gateway::GatewayConfig;

/// Default listen port if not specified via environment variable.
const DEFAULT_PORT: u16 = 3000;

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the gateway listens on (`PORT`).
    pub port: u16,

    /// Override for the provider endpoint (`UPTIMEROBOT_API_URL`), used by
    /// deployments that front the provider with their own proxy.
    pub upstream_url: Option<String>,

    /// Upstream credentials, comma-separated (`UPTIMEROBOT_API_KEY`). An
    /// empty list fails every data request deterministically until fixed.
    pub upstream_api_keys: Vec<String>,

    /// Gateway policy knobs.
    pub gateway: GatewayConfig,
}

impl Config {
    /// Load the configuration from the environment, falling back to
    /// defaults for anything missing or unparseable.
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let upstream_url = env::var("UPTIMEROBOT_API_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let upstream_api_keys = env::var("UPTIMEROBOT_API_KEY")
            .map(|value| split_csv(&value))
            .unwrap_or_default();

        let defaults = GatewayConfig::default();

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|value| split_csv(&value))
            .ok()
            .filter(|origins| !origins.is_empty())
            .unwrap_or(defaults.allowed_origins);

        let rate_limit = env::var("RATE_LIMIT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(defaults.rate_limit);

        let cache_ttl_seconds = env::var("CACHE_TIME")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(defaults.cache_ttl_seconds);

        let require_api_key = env::var("REQUIRE_API_KEY")
            .map(|value| value == "true")
            .unwrap_or(defaults.require_api_key);

        let api_keys = env::var("ALLOWED_API_KEYS")
            .map(|value| split_csv(&value))
            .unwrap_or(defaults.api_keys);

        Self {
            port,
            upstream_url,
            upstream_api_keys,
            gateway: GatewayConfig {
                allowed_origins,
                rate_limit,
                cache_ttl_seconds,
                require_api_key,
                api_keys,
            },
        }
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(String::from)
        .collect()
}
