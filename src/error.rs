//! Domain error types for the disconnect probe
//!
//! Structured thiserror types so startup failures can be matched on and
//! reported with the component that failed.
//!
//! main.rs is the ONLY module allowed to use anyhow::Result (process boundary).
//! All library code returns Result<T, ProbeError>.

use thiserror::Error;

/// Probe domain errors
///
/// Every variant is fatal at startup. There is no steady-state error:
/// once listening, a connection close is the designed trigger, not a failure.
///
/// Example log output:
/// ```text
/// ProbeError::Bind { port: 3000, .. }
/// → "listener failed to bind port 3000: Address already in use (os error 98)"
/// ```
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Environment variable present but invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// Cache client constructed with no shard endpoints
    #[error("cache client requires at least one shard endpoint")]
    EmptyShardList,

    /// Shard endpoint is not a valid host:port pair
    #[error("invalid shard endpoint '{input}': {reason}")]
    InvalidShardEndpoint { input: String, reason: String },

    /// The cluster client rejected the endpoint set
    #[error("cache client construction failed")]
    CacheClient(#[source] redis::RedisError),

    /// PORT is not a usable TCP port number
    #[error("listener cannot use port '{raw}': {reason}")]
    InvalidPort { raw: String, reason: String },

    /// Listener could not bind the requested port
    #[error("listener failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

impl ProbeError {
    /// Name of the component that failed, for the fatal startup diagnostic.
    pub fn component(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::EmptyShardList | Self::InvalidShardEndpoint { .. } | Self::CacheClient(_) => {
                "cache client"
            }
            Self::InvalidPort { .. } | Self::Bind { .. } => "listener",
        }
    }

    /// True for every variant describing a bad shard-endpoint list.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyShardList | Self::InvalidShardEndpoint { .. } | Self::CacheClient(_)
        )
    }

    /// True when the listener could not take its port, including an
    /// invalid port number.
    pub fn is_bind_error(&self) -> bool {
        matches!(self, Self::InvalidPort { .. } | Self::Bind { .. })
    }
}
