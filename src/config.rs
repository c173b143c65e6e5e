//! Probe configuration module
//!
//! Handles loading configuration from environment variables.

use crate::cache::{parse_shard_list, ShardEndpoint, DEFAULT_SHARDS};
use crate::error::ProbeError;
use std::env;
use tracing_subscriber::filter::Directive;

/// Port used when PORT is not set
pub const DEFAULT_PORT: u16 = 3000;

/// Probe configuration
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// TCP port for the kill-switch listener (0 = OS-assigned)
    pub port: u16,

    /// Cache shard endpoints, in order
    pub cache_shards: Vec<ShardEndpoint>,

    /// Enable cache client diagnostics at startup
    pub cache_debug: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl ProbeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ProbeError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ProbeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank PORT behaves like an unset one
        let port = match lookup("PORT").filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => raw.trim().parse().map_err(|e| ProbeError::InvalidPort {
                reason: format!("PORT must be a valid port number: {e}"),
                raw,
            })?,
            None => DEFAULT_PORT,
        };

        // Set-but-empty is an explicit empty list, rejected by the cache client
        let cache_shards =
            parse_shard_list(&lookup("CACHE_SHARDS").unwrap_or_else(|| DEFAULT_SHARDS.to_string()))?;

        let cache_debug = match lookup("CACHE_DEBUG") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ProbeError::Config(format!("CACHE_DEBUG must be true or false, got '{raw}'"))
            })?,
            None => true,
        };

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        log_directive(&log_level)?;

        Ok(Self {
            port,
            cache_shards,
            cache_debug,
            log_level,
        })
    }
}

/// Filter directive enabling `level` for this crate
pub fn log_directive(level: &str) -> Result<Directive, ProbeError> {
    format!("disconnect_probe={level}")
        .parse()
        .map_err(|e| ProbeError::Config(format!("LOG_LEVEL '{level}' is not a valid level: {e}")))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
