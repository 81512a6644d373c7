//! Signaling relay core
//!
//! This module provides the pieces shared by every peer connection:
//! - Envelope decoding and message classification
//! - The registry of live peers and broadcast fan-out

pub mod envelope;
pub mod registry;

pub use envelope::{Envelope, MessageKind};
pub use registry::{BroadcastReport, PeerHandle, PeerId, PeerInfo, Registration, Registry};

use std::error::Error;
use std::fmt;

/// Signaling-related errors
#[derive(Debug)]
pub enum SignalingError {
    /// Inbound payload is not structured (JSON) data
    Decode(String),
    /// Outbound channel of a peer is closed
    PeerGone(PeerId),
}

impl fmt::Display for SignalingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalingError::Decode(msg) => write!(f, "Decode error: {}", msg),
            SignalingError::PeerGone(id) => write!(f, "Peer {} is gone", id),
        }
    }
}

impl Error for SignalingError {}
