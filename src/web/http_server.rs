//! HTTP server for health checks and metrics
//!
//! Provides `/health`, `/metrics` (Prometheus text format) and `/peers`.

use crate::signaling::{MessageKind, PeerInfo};
use crate::web::shared::{load, SharedState};
use axum::{extract::State, routing::get, Json, Router};
use log::info;
use serde_json::{json, Value};
use std::fmt::Write;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Build the monitoring router
pub fn router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/peers", get(peers_handler))
        .with_state(state)
}

/// Run the HTTP server on the configured address
pub async fn run_http_server(state: Arc<SharedState>) -> Result<(), Box<dyn std::error::Error>> {
    let addr = state.config.http_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .await
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)?;

    Ok(())
}

/// Health check handler
async fn health_handler(State(state): State<Arc<SharedState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.uptime().as_secs_f64(),
        "peers": state.connection_count(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Connected peers, oldest first
async fn peers_handler(State(state): State<Arc<SharedState>>) -> Json<Vec<PeerInfo>> {
    Json(state.registry.peers())
}

/// Metrics handler (Prometheus format)
async fn metrics_handler(State(state): State<Arc<SharedState>>) -> String {
    let stats = &state.stats;
    let mut out = format!(
        r#"# HELP signal_relay_uptime_seconds Server uptime in seconds
# TYPE signal_relay_uptime_seconds counter
signal_relay_uptime_seconds {:.2}
# HELP signal_relay_peers Currently connected peers
# TYPE signal_relay_peers gauge
signal_relay_peers {}
# HELP signal_relay_connections_total Accepted TCP connections
# TYPE signal_relay_connections_total counter
signal_relay_connections_total {}
# HELP signal_relay_handshake_failures_total Failed TLS or WebSocket handshakes
# TYPE signal_relay_handshake_failures_total counter
signal_relay_handshake_failures_total {}
# HELP signal_relay_decode_errors_total Inbound messages dropped as malformed
# TYPE signal_relay_decode_errors_total counter
signal_relay_decode_errors_total {}
# HELP signal_relay_deliveries_total Messages handed to recipients
# TYPE signal_relay_deliveries_total counter
signal_relay_deliveries_total {}
# HELP signal_relay_delivery_failures_total Deliveries to closed recipients
# TYPE signal_relay_delivery_failures_total counter
signal_relay_delivery_failures_total {}
# HELP signal_relay_ice_candidates_total ICE candidates observed
# TYPE signal_relay_ice_candidates_total counter
signal_relay_ice_candidates_total {}
# HELP signal_relay_ice_candidates_by_transport_total ICE candidates by transport protocol
# TYPE signal_relay_ice_candidates_by_transport_total counter
signal_relay_ice_candidates_by_transport_total{{transport="udp"}} {}
signal_relay_ice_candidates_by_transport_total{{transport="tcp"}} {}
# HELP signal_relay_ice_candidates_by_type_total ICE candidates by candidate type
# TYPE signal_relay_ice_candidates_by_type_total counter
signal_relay_ice_candidates_by_type_total{{type="host"}} {}
signal_relay_ice_candidates_by_type_total{{type="srflx"}} {}
signal_relay_ice_candidates_by_type_total{{type="relay"}} {}
signal_relay_ice_candidates_by_type_total{{type="prflx"}} {}
# HELP signal_relay_messages_total Relayed messages by type
# TYPE signal_relay_messages_total counter
"#,
        state.uptime().as_secs_f64(),
        state.connection_count(),
        load(&stats.connections_total),
        load(&stats.handshake_failures),
        load(&stats.decode_errors),
        load(&stats.deliveries),
        load(&stats.delivery_failures),
        load(&stats.ice_candidates_total),
        load(&stats.ice_candidates_udp),
        load(&stats.ice_candidates_tcp),
        load(&stats.ice_candidates_host),
        load(&stats.ice_candidates_srflx),
        load(&stats.ice_candidates_relay),
        load(&stats.ice_candidates_prflx),
    );
    for kind in MessageKind::ALL {
        let _ = writeln!(
            out,
            "signal_relay_messages_total{{type=\"{}\"}} {}",
            kind,
            stats.messages(kind)
        );
    }
    out
}
