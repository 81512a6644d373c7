//! Shared state for signal-relay
//!
//! Holds the configuration, the peer registry and relay counters. One
//! instance is created at startup and handed to every connection handler.

use crate::config::Config;
use crate::signaling::{BroadcastReport, MessageKind, Registry};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared state for the application
#[derive(Debug, Clone)]
pub struct SharedState {
    /// Configuration
    pub config: Arc<Config>,

    /// Live signaling peers
    pub registry: Arc<Registry>,

    /// Relay counters
    pub stats: Arc<RelayStats>,

    /// Server start time
    pub start_time: Instant,
}

impl SharedState {
    /// Create a new shared state with an empty registry
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, Arc::new(Registry::new()))
    }

    pub fn with_registry(config: Config, registry: Arc<Registry>) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            stats: Arc::new(RelayStats::default()),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Number of connected peers
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }
}

/// Monotonic relay counters
#[derive(Debug, Default)]
pub struct RelayStats {
    pub connections_total: AtomicU64,
    pub handshake_failures: AtomicU64,
    pub decode_errors: AtomicU64,
    pub deliveries: AtomicU64,
    pub delivery_failures: AtomicU64,
    messages: [AtomicU64; 7],
    pub ice_candidates_total: AtomicU64,
    pub ice_candidates_udp: AtomicU64,
    pub ice_candidates_tcp: AtomicU64,
    pub ice_candidates_host: AtomicU64,
    pub ice_candidates_srflx: AtomicU64,
    pub ice_candidates_relay: AtomicU64,
    pub ice_candidates_prflx: AtomicU64,
}

impl RelayStats {
    pub fn record_connection(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handshake_failure(&self) {
        self.handshake_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message(&self, kind: MessageKind) {
        self.messages[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self, report: BroadcastReport) {
        self.deliveries
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.delivery_failures
            .fetch_add(report.failed as u64, Ordering::Relaxed);
    }

    /// A frame that was queued for a peer but could not be written
    pub fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an ICE candidate by transport and type
    pub fn record_ice_candidate(&self, transport: Option<&str>, candidate_type: Option<&str>) {
        self.ice_candidates_total.fetch_add(1, Ordering::Relaxed);

        if let Some(transport) = transport {
            match transport {
                "udp" => self.ice_candidates_udp.fetch_add(1, Ordering::Relaxed),
                "tcp" => self.ice_candidates_tcp.fetch_add(1, Ordering::Relaxed),
                _ => 0,
            };
        }

        if let Some(candidate_type) = candidate_type {
            match candidate_type {
                "host" => self.ice_candidates_host.fetch_add(1, Ordering::Relaxed),
                "srflx" => self.ice_candidates_srflx.fetch_add(1, Ordering::Relaxed),
                "relay" => self.ice_candidates_relay.fetch_add(1, Ordering::Relaxed),
                "prflx" => self.ice_candidates_prflx.fetch_add(1, Ordering::Relaxed),
                _ => 0,
            };
        }
    }

    pub fn messages(&self, kind: MessageKind) -> u64 {
        self.messages[kind.index()].load(Ordering::Relaxed)
    }

    pub fn messages_total(&self) -> u64 {
        self.messages
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }
}

/// Read a counter
pub fn load(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}
