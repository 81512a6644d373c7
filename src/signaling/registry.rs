//! Peer registry
//!
//! Tracks the set of live signaling peers and fans messages out to them.
//! Every connection handler shares one `Registry` through an `Arc`.

use super::SignalingError;
use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use uuid::Uuid;

/// Unique peer identity, one per accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PeerId(Uuid);

impl PeerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Send side of a peer connection.
///
/// The registry never owns the socket: it only holds the sender half of the
/// channel drained by the connection's writer task.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    pub id: PeerId,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    outbound: mpsc::UnboundedSender<Message>,
}

impl PeerHandle {
    pub fn new(addr: SocketAddr, outbound: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: PeerId::new(),
            addr,
            connected_at: Instant::now(),
            outbound,
        }
    }

    /// Queue a message for this peer's writer task
    pub fn send(&self, message: Message) -> Result<(), SignalingError> {
        self.outbound
            .send(message)
            .map_err(|_| SignalingError::PeerGone(self.id))
    }

    pub fn info(&self) -> PeerInfo {
        PeerInfo {
            id: self.id,
            addr: self.addr.to_string(),
            connected_secs: self.connected_at.elapsed().as_secs_f64(),
        }
    }
}

/// Peer description exposed by the HTTP `/peers` endpoint
#[derive(Debug, Clone, Serialize)]
pub struct PeerInfo {
    pub id: PeerId,
    pub addr: String,
    pub connected_secs: f64,
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Set of live peers
#[derive(Debug, Default)]
pub struct Registry {
    peers: RwLock<HashMap<PeerId, PeerHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer. Returns `false` if a peer with the same id was already present.
    pub fn register(&self, peer: PeerHandle) -> bool {
        let id = peer.id;
        let addr = peer.addr;
        let mut peers = self.peers.write();
        let inserted = peers.insert(id, peer).is_none();
        let count = peers.len();
        drop(peers);

        if inserted {
            info!("Peer {} ({}) registered, {} connected", id, addr, count);
        } else {
            debug!("Peer {} registered again, ignoring duplicate", id);
        }
        inserted
    }

    /// Register a peer and tie its removal to the returned guard
    pub fn register_scoped(self: &Arc<Self>, peer: PeerHandle) -> Registration {
        let id = peer.id;
        self.register(peer);
        Registration {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Remove a peer. Absent peers are a no-op.
    pub fn unregister(&self, id: &PeerId) -> Option<PeerHandle> {
        let mut peers = self.peers.write();
        let removed = peers.remove(id);
        let count = peers.len();
        drop(peers);

        if let Some(ref peer) = removed {
            info!("Peer {} ({}) unregistered, {} connected", id, peer.addr, count);
        }
        removed
    }

    /// Deliver `message` to every registered peer except `sender`.
    ///
    /// A failed delivery is logged and counted but never removes the recipient;
    /// the recipient's own handler unregisters it when its connection ends.
    pub fn broadcast(&self, sender: &PeerId, message: &Message) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        // Read lock held across the fan-out: sends are channel pushes and never
        // wait on the network, and an unregister cannot interleave.
        let peers = self.peers.read();
        for (id, peer) in peers.iter() {
            if id == sender {
                continue;
            }
            match peer.send(message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("Broadcast from {} failed: {}", sender, e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.peers.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// Snapshot of connected peers, oldest first
    pub fn peers(&self) -> Vec<PeerInfo> {
        let peers = self.peers.read();
        let mut handles: Vec<&PeerHandle> = peers.values().collect();
        handles.sort_by_key(|p| p.connected_at);
        handles.iter().map(|p| p.info()).collect()
    }
}

/// Registry membership of one connection.
///
/// Dropping the guard unregisters the peer, so every exit path of a
/// connection handler removes it exactly once.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<Registry>,
    id: PeerId,
}

impl Registration {
    pub fn id(&self) -> PeerId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(&self.id);
    }
}
