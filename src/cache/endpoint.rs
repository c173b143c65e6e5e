//! Shard endpoint parsing

use crate::error::ProbeError;
use std::fmt;
use std::str::FromStr;

/// Shard list used when CACHE_SHARDS is not set
pub const DEFAULT_SHARDS: &str = "127.0.0.1:6380,127.0.0.1:6381,127.0.0.1:6382";

/// One (host, port) address of a cache shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardEndpoint {
    host: String,
    port: u16,
}

impl ShardEndpoint {
    /// Create an endpoint, validating host and port
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, ProbeError> {
        let host = host.into();
        let input = format!("{host}:{port}");

        if host.is_empty() {
            return Err(invalid(&input, "host is empty"));
        }
        if host.chars().any(char::is_whitespace) {
            return Err(invalid(&input, "host contains whitespace"));
        }
        if port == 0 {
            return Err(invalid(&input, "port must be non-zero"));
        }

        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Connection URL understood by the redis client
    pub fn connection_url(&self) -> String {
        format!("redis://{self}")
    }
}

impl fmt::Display for ShardEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ShardEndpoint {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();

        let (host, port) = if let Some(rest) = input.strip_prefix('[') {
            // Bracketed IPv6: [::1]:6380
            rest.split_once("]:")
                .ok_or_else(|| invalid(input, "expected [host]:port"))?
        } else {
            let (host, port) = input
                .rsplit_once(':')
                .ok_or_else(|| invalid(input, "missing port"))?;
            if host.contains(':') {
                return Err(invalid(input, "IPv6 hosts must be bracketed"));
            }
            (host, port)
        };

        let port: u16 = port
            .parse()
            .map_err(|_| invalid(input, "port is not a number"))?;

        Self::new(host, port)
    }
}

/// Parse a comma-separated shard list.
///
/// A blank string is an empty list; rejecting it is left to the client.
pub fn parse_shard_list(s: &str) -> Result<Vec<ShardEndpoint>, ProbeError> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }

    s.split(',').map(str::parse).collect()
}

fn invalid(input: &str, reason: &str) -> ProbeError {
    ProbeError::InvalidShardEndpoint {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}
