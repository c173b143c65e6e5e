//! Cache client handle
//!
//! Wraps the redis cluster client together with the shard list it was
//! built from and a diagnostics flag. Construction is lazy: no shard is
//! contacted until a connection is requested.

use crate::cache::endpoint::ShardEndpoint;
use crate::error::ProbeError;

use redis::cluster::ClusterClient;
use std::fmt;
use tracing::{debug, info};

/// Process-wide handle to the sharded cache
pub struct CacheClient {
    endpoints: Vec<ShardEndpoint>,
    // Owned for the process lifetime; no cache commands are issued yet
    #[allow(dead_code)]
    cluster: ClusterClient,
    diagnostics: bool,
}

impl CacheClient {
    /// Build a client over the given shards
    ///
    /// Fails with a configuration error if the list is empty or the
    /// cluster client rejects any endpoint.
    pub fn construct(endpoints: Vec<ShardEndpoint>) -> Result<Self, ProbeError> {
        if endpoints.is_empty() {
            return Err(ProbeError::EmptyShardList);
        }

        let urls: Vec<String> = endpoints.iter().map(ShardEndpoint::connection_url).collect();
        let cluster = ClusterClient::new(urls).map_err(ProbeError::CacheClient)?;

        info!(shard_count = endpoints.len(), "Cache client constructed");

        Ok(Self {
            endpoints,
            cluster,
            diagnostics: false,
        })
    }

    /// Turn on verbose tracing for this client
    pub fn enable_diagnostics(&mut self) {
        self.diagnostics = true;
        for (index, shard) in self.endpoints.iter().enumerate() {
            debug!(index, shard = %shard, "Cache diagnostics enabled");
        }
    }

    pub fn diagnostics_enabled(&self) -> bool {
        self.diagnostics
    }

    /// Shards in the order they were supplied
    pub fn endpoints(&self) -> &[ShardEndpoint] {
        &self.endpoints
    }

    pub fn shard_count(&self) -> usize {
        self.endpoints.len()
    }
}

impl fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheClient")
            .field("endpoints", &self.endpoints)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}
