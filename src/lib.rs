//! signal-relay - WebRTC signaling relay
//!
//! Peers connect over WebSocket (optionally TLS) and every JSON message one
//! peer sends is forwarded, unchanged, to all other connected peers.

pub mod config;
pub mod signaling;
pub mod transport;
pub mod web;

// Re-exports
pub use config::Config;
pub use signaling::{Envelope, MessageKind, PeerHandle, PeerId, Registry};
pub use transport::{handle_signaling_connection, WebSocketServer};
pub use web::SharedState;
