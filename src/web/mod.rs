//! HTTP server for health checks and metrics
//!
//! Provides a lightweight HTTP server for monitoring the relay.

pub mod shared;
pub use shared::{RelayStats, SharedState};

pub mod http_server;
pub use http_server::run_http_server;
