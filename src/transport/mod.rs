//! Transport layer for signal-relay
//!
//! Accepts TCP connections, performs the optional TLS handshake and the
//! WebSocket upgrade, and runs one signaling session per peer.

pub mod websocket;
pub mod signaling_server;

#[cfg(feature = "native-tls")]
pub mod tls;

pub use websocket::WebSocketServer;
pub use signaling_server::handle_signaling_connection;

use std::error::Error;
use std::fmt;
use std::io;

/// Transport-level errors
#[derive(Debug)]
pub enum TransportError {
    /// Socket bind/accept failure
    Io(io::Error),
    /// Certificate loading or TLS handshake failure
    Tls(String),
    /// WebSocket upgrade failure
    Handshake(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Io(e) => write!(f, "I/O error: {}", e),
            TransportError::Tls(msg) => write!(f, "TLS error: {}", msg),
            TransportError::Handshake(msg) => write!(f, "WebSocket handshake failed: {}", msg),
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TransportError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::Io(e)
    }
}
