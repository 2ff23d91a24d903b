use std::net::SocketAddr;

use serde::Deserialize;

const MIB: u64 = 1024 * 1024;

/// Process-wide configuration, loaded once at startup (spec §6, §9 "Dynamic
/// 'config' objects": no runtime schema extension).
///
/// All fields are environment-driven; `classroom-server` is the only crate
/// that constructs this directly from `std::env`. `classroom-core` itself
/// never reads the environment, keeping the library testable without it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    /// Enables verbose logging; mirrors the original's `GlobalSettings.DEBUG`.
    #[serde(default)]
    pub debug: bool,
    /// Postgres connection string for the metadata store.
    pub database_url: String,
    /// Redis connection string for the hot-tier KV store.
    pub kv_url: String,
    /// Redis logical DB index used for file content / sorted sets.
    #[serde(default)]
    pub kv_db: u8,
    /// Redis logical DB index used for the memoization cache (component F).
    ///
    /// Kept separate from `kv_db` so a cache flush can never evict file content.
    #[serde(default = "default_cache_db")]
    pub cache_db: u8,
    /// Object-store bucket name for the cold tier.
    pub object_bucket: String,
    /// Per-project total content size cap, in bytes.
    #[serde(default = "default_project_size_limit")]
    pub project_size_limit_bytes: u64,
    /// Per-file hot/cold placement threshold, in bytes.
    #[serde(default = "default_hot_limit")]
    pub hot_limit_bytes: u64,
    /// Shared secret accepted as `X-API-KEY` for observability-only sessions.
    pub monitor_key: String,
    /// Optional Sentry DSN; accepted but unused until a future revision wires a layer.
    #[serde(default)]
    pub sentry_dsn: Option<String>,
    /// Base URL of the upstream token-verification service.
    pub auth_endpoint: String,
    /// Address the websocket listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

fn default_cache_db() -> u8 {
    1
}

fn default_project_size_limit() -> u64 {
    512 * MIB
}

fn default_hot_limit() -> u64 {
    128 * MIB
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().expect("valid default bind addr")
}

impl Config {
    /// Loads configuration from process environment variables, applying the
    /// same defaults as the field-level `serde(default)`s.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        assert_eq!(default_project_size_limit(), 512 * 1024 * 1024);
        assert_eq!(default_hot_limit(), 128 * 1024 * 1024);
    }
}
