//! Termination-on-disconnect listener
//!
//! A TCP server whose only per-connection behavior is to report when the
//! connection ends. The composition root turns that report into process exit.

mod server;
mod state;

pub use server::{CloseEvent, CloseReason, TerminationListener};
pub use state::{ListenerPhase, ListenerState};
