//! Signaling session handler
//!
//! One handler runs per accepted WebSocket. The flow is:
//! 1. Register the peer (the guard unregisters it when the handler returns)
//! 2. Read frames; every frame that decodes as JSON is forwarded unchanged
//!    to all other peers, anything else is logged and dropped
//! 3. On close or transport error, unregister and drain the writer task

use crate::signaling::{BroadcastReport, Envelope, MessageKind, PeerHandle, PeerId};
use crate::web::{RelayStats, SharedState};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::WebSocketStream;

/// How long a closing handler waits for queued frames to be written
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle a signaling WebSocket connection until it closes
pub async fn handle_signaling_connection<S>(
    ws_stream: WebSocketStream<S>,
    addr: SocketAddr,
    state: Arc<SharedState>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (write, mut read) = ws_stream.split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Message>();

    let peer = PeerHandle::new(addr, outbound_tx.clone());
    let mut writer_handle = tokio::spawn(run_writer(
        write,
        outbound_rx,
        peer.id,
        addr,
        state.stats.clone(),
    ));

    let registration = state.registry.register_scoped(peer);
    let peer_id = registration.id();

    while let Some(result) = read.next().await {
        match result {
            Ok(msg @ Message::Text(_)) | Ok(msg @ Message::Binary(_)) => {
                relay_message(&state, &peer_id, &msg);
            }
            // tungstenite queues the pong itself
            Ok(Message::Ping(_)) => {}
            Ok(Message::Pong(_)) => {}
            Ok(Message::Frame(_)) => {}
            Ok(Message::Close(frame)) => {
                debug!("Peer {} sent close: {:?}", peer_id, frame);
                break;
            }
            Err(e) => {
                error!("WebSocket error from peer {} ({}): {}", peer_id, addr, e);
                break;
            }
        }
    }

    drop(registration);
    drop(outbound_tx);

    if timeout(WRITER_DRAIN_TIMEOUT, &mut writer_handle).await.is_err() {
        warn!("Peer {} writer did not drain in time, aborting", peer_id);
        writer_handle.abort();
    }

    info!("Peer {} ({}) disconnected", peer_id, addr);
}

/// Drain a peer's outbound queue into its socket.
///
/// A failed write ends the writer; the frame that hit the broken socket is
/// counted as a delivery failure.
async fn run_writer<S>(
    mut write: SplitSink<WebSocketStream<S>, Message>,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    peer_id: PeerId,
    addr: SocketAddr,
    stats: Arc<RelayStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(msg) = outbound_rx.recv().await {
        if let Err(e) = write.send(msg).await {
            warn!("Send to peer {} ({}) failed: {}", peer_id, addr, e);
            stats.record_delivery_failure();
            break;
        }
    }
    if let Err(e) = write.close().await {
        debug!("Close for peer {} ({}) failed: {}", peer_id, addr, e);
    }
}

/// Decode, classify and forward one data frame.
///
/// Returns `None` when the frame was dropped because it is not JSON.
pub fn relay_message(
    state: &SharedState,
    sender: &PeerId,
    message: &Message,
) -> Option<BroadcastReport> {
    let decoded = match message {
        Message::Text(text) => Envelope::decode(text),
        Message::Binary(bytes) => Envelope::decode_bytes(bytes),
        _ => return None,
    };

    let envelope = match decoded {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(
                "Dropping malformed message from peer {}: {} ({})",
                sender,
                e,
                preview(message)
            );
            state.stats.record_decode_error();
            return None;
        }
    };

    log_classification(sender, &envelope, message);
    state.stats.record_message(envelope.kind);
    if envelope.kind == MessageKind::Candidate {
        let (transport, candidate_type) = envelope.ice_summary();
        state
            .stats
            .record_ice_candidate(transport.as_deref(), candidate_type.as_deref());
    }

    let report = state.registry.broadcast(sender, message);
    state.stats.record_broadcast(report);
    trace!(
        "Peer {} {} forwarded to {} peers ({} failed)",
        sender,
        envelope.kind,
        report.delivered,
        report.failed
    );
    Some(report)
}

fn log_classification(sender: &PeerId, envelope: &Envelope, message: &Message) {
    match envelope.kind {
        MessageKind::Offer | MessageKind::Answer | MessageKind::Candidate => {
            debug!("Peer {}: {} message ({} bytes)", sender, envelope.kind, message.len());
        }
        kind if kind.is_keepalive() => {
            trace!("Peer {}: {} message", sender, kind);
        }
        _ => {
            debug!("Peer {}: unrecognized message {}", sender, preview(message));
        }
    }
}

/// First 80 characters of a frame, for logs
fn preview(message: &Message) -> String {
    match message {
        Message::Text(text) => text.chars().take(80).collect(),
        Message::Binary(bytes) => format!("<{} binary bytes>", bytes.len()),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tokio::io::DuplexStream;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::tungstenite::protocol::Role;

    type Client = WebSocketStream<DuplexStream>;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn text(s: &str) -> Message {
        Message::Text(s.to_string())
    }

    async fn connect(state: &Arc<SharedState>, port: u16) -> (Client, JoinHandle<()>) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let handle = tokio::spawn(handle_signaling_connection(server, addr(port), state.clone()));
        (client, handle)
    }

    async fn wait_for_peers(state: &SharedState, count: usize) {
        for _ in 0..200 {
            if state.registry.len() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {} peers, registry has {}",
            count,
            state.registry.len()
        );
    }

    async fn recv(client: &mut Client) -> Message {
        timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .expect("websocket error")
    }

    async fn assert_silent(client: &mut Client) {
        let result = timeout(Duration::from_millis(150), client.next()).await;
        assert!(result.is_err(), "unexpected message: {:?}", result);
    }

    fn new_state() -> Arc<SharedState> {
        Arc::new(SharedState::new(Config::default()))
    }

    #[tokio::test]
    async fn test_ping_reaches_all_other_peers() {
        let state = new_state();
        let (mut a, _ha) = connect(&state, 1).await;
        let (mut b, hb) = connect(&state, 2).await;
        let (mut c, _hc) = connect(&state, 3).await;
        wait_for_peers(&state, 3).await;

        a.send(text(r#"{"type":"ping"}"#)).await.unwrap();
        assert_eq!(recv(&mut b).await, text(r#"{"type":"ping"}"#));
        assert_eq!(recv(&mut c).await, text(r#"{"type":"ping"}"#));
        assert_silent(&mut a).await;

        b.close(None).await.unwrap();
        hb.await.unwrap();
        wait_for_peers(&state, 2).await;

        a.send(text(r#"{"type":"candidate","x":1}"#)).await.unwrap();
        assert_eq!(recv(&mut c).await, text(r#"{"type":"candidate","x":1}"#));
        assert_silent(&mut a).await;
        assert_eq!(state.stats.messages(MessageKind::Ping), 1);
        assert_eq!(state.stats.messages(MessageKind::Candidate), 1);
    }

    #[tokio::test]
    async fn test_malformed_message_is_dropped_and_connection_kept() {
        let state = new_state();
        let (mut a, _ha) = connect(&state, 1).await;
        let (mut b, _hb) = connect(&state, 2).await;
        wait_for_peers(&state, 2).await;

        a.send(text("not json")).await.unwrap();
        let offer = r#"{"type":"offer","sdp":"v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1"}"#;
        a.send(text(offer)).await.unwrap();

        // The first thing B sees is the offer, byte for byte
        assert_eq!(recv(&mut b).await, text(offer));
        assert_eq!(state.registry.len(), 2);
        assert_eq!(crate::web::shared::load(&state.stats.decode_errors), 1);
    }

    #[tokio::test]
    async fn test_every_tag_is_forwarded_verbatim() {
        let state = new_state();
        let (mut a, _ha) = connect(&state, 1).await;
        let (mut b, _hb) = connect(&state, 2).await;
        wait_for_peers(&state, 2).await;

        let payloads = [
            r#"{"type":"offer","sdp":"v=0..."}"#,
            r#"{"type":"answer","sdp":"v=0..."}"#,
            r#"{ "type" : "candidate", "candidate" : {"candidate":"candidate:1 1 udp 2122260223 192.168.1.5 54400 typ host","sdpMid":"0"} }"#,
            r#"{"type":"pong","timestamp":1700000000000}"#,
            r#"{"type":"delay-report","delay":21.5}"#,
            r#"{"type":"something-else","nested":{"k":[1,2,3]}}"#,
            r#"[1,2,3]"#,
        ];
        for payload in payloads {
            a.send(text(payload)).await.unwrap();
        }
        // Single sender order is preserved
        for payload in payloads {
            assert_eq!(recv(&mut b).await, text(payload));
        }
        assert_eq!(state.stats.messages(MessageKind::Unknown), 2);
        assert_eq!(crate::web::shared::load(&state.stats.ice_candidates_host), 1);
    }

    #[tokio::test]
    async fn test_binary_json_is_forwarded_as_binary() {
        let state = new_state();
        let (mut a, _ha) = connect(&state, 1).await;
        let (mut b, _hb) = connect(&state, 2).await;
        wait_for_peers(&state, 2).await;

        let payload = br#"{"type":"answer","sdp":"v=0"}"#.to_vec();
        a.send(Message::Binary(vec![0xff, 0x00])).await.unwrap();
        a.send(Message::Binary(payload.clone())).await.unwrap();

        assert_eq!(recv(&mut b).await, Message::Binary(payload));
    }

    #[tokio::test]
    async fn test_ping_frame_gets_pong() {
        let state = new_state();
        let (mut a, _ha) = connect(&state, 1).await;
        let (mut b, _hb) = connect(&state, 2).await;
        wait_for_peers(&state, 2).await;

        a.send(Message::Ping(vec![7, 7])).await.unwrap();
        assert_eq!(recv(&mut a).await, Message::Pong(vec![7, 7]));
        assert_silent(&mut b).await;
    }

    #[tokio::test]
    async fn test_abrupt_disconnect_unregisters_once() {
        let state = new_state();
        let (a, ha) = connect(&state, 1).await;
        let (mut b, _hb) = connect(&state, 2).await;
        wait_for_peers(&state, 2).await;

        drop(a);
        ha.await.unwrap();
        assert_eq!(state.registry.len(), 1);

        // Remaining peer is unaffected
        let (mut c, _hc) = connect(&state, 3).await;
        wait_for_peers(&state, 2).await;
        b.send(text(r#"{"type":"offer"}"#)).await.unwrap();
        assert_eq!(recv(&mut c).await, text(r#"{"type":"offer"}"#));
    }

    #[tokio::test]
    async fn test_failed_write_is_counted() {
        let stats = Arc::new(RelayStats::default());
        let (client_io, server_io) = tokio::io::duplex(1024);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let (write, _read) = server.split();
        drop(client_io);

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(text(r#"{"type":"offer"}"#)).unwrap();
        drop(tx);

        timeout(
            Duration::from_secs(2),
            run_writer(write, rx, PeerId::new(), addr(1), stats.clone()),
        )
        .await
        .unwrap();
        assert_eq!(crate::web::shared::load(&stats.delivery_failures), 1);
    }

    #[test]
    fn test_relay_message_without_peers() {
        let state = SharedState::new(Config::default());
        let sender = PeerId::new();

        let report = relay_message(&state, &sender, &text(r#"{"type":"offer"}"#));
        assert_eq!(report, Some(BroadcastReport::default()));
        assert_eq!(relay_message(&state, &sender, &text("{oops")), None);
        assert_eq!(relay_message(&state, &sender, &Message::Ping(vec![])), None);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(200);
        assert_eq!(preview(&text(&long)).chars().count(), 80);
    }
}
