//! Sharded cache client
//!
//! A long-lived handle to the cache cluster, built once at startup from a
//! static list of shard endpoints. Routing and failover belong to the
//! redis cluster client; this module only owns the construction contract.

mod client;
mod endpoint;

pub use client::CacheClient;
pub use endpoint::{parse_shard_list, ShardEndpoint, DEFAULT_SHARDS};
