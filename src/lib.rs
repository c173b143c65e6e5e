//! Disconnect Probe - network-triggered process kill switch
//!
//! Opens a TCP listener and ends the process as soon as any client
//! connection to it closes. Alongside it, a sharded cache client is built
//! at startup and kept for the process lifetime.
//!
//! - `cache`: multi-shard cache client handle
//! - `listener`: termination-on-disconnect TCP server
//! - `config`: environment configuration
//! - `error`: startup error taxonomy

pub mod cache;
pub mod config;
pub mod error;
pub mod listener;

pub use cache::{CacheClient, ShardEndpoint};
pub use config::ProbeConfig;
pub use error::ProbeError;
pub use listener::{CloseEvent, CloseReason, TerminationListener};
