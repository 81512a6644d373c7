//! WebSocket server implementation
//!
//! Accepts peer connections and spawns one signaling session per peer.

use super::signaling_server::handle_signaling_connection;
use super::TransportError;
use crate::web::shared::SharedState;
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Duration;

#[cfg(feature = "native-tls")]
use tokio_native_tls::TlsAcceptor;

/// WebSocket server
pub struct WebSocketServer {
    /// Shared state
    state: Arc<SharedState>,
    /// TLS acceptor when serving wss://
    #[cfg(feature = "native-tls")]
    tls: Option<TlsAcceptor>,
}

impl WebSocketServer {
    /// Create a new WebSocket server, loading the TLS identity if enabled
    pub fn new(state: Arc<SharedState>) -> Result<Self, TransportError> {
        #[cfg(feature = "native-tls")]
        let tls = if state.config.tls.enabled {
            Some(super::tls::load_acceptor(
                &state.config.tls.cert_path,
                &state.config.tls.key_path,
            )?)
        } else {
            None
        };
        #[cfg(not(feature = "native-tls"))]
        let _plain = ensure_plain(&state)?;

        Ok(Self {
            state,
            #[cfg(feature = "native-tls")]
            tls,
        })
    }

    fn scheme(&self) -> &'static str {
        #[cfg(feature = "native-tls")]
        let secure = self.tls.is_some();
        #[cfg(not(feature = "native-tls"))]
        let secure = false;

        if secure {
            "wss"
        } else {
            "ws"
        }
    }

    /// Bind the configured signaling address
    pub async fn bind(&self) -> Result<TcpListener, TransportError> {
        Ok(TcpListener::bind(self.state.config.server_addr()).await?)
    }

    /// Run the accept loop on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<(), TransportError> {
        info!(
            "Signaling server listening on {}://{}",
            self.scheme(),
            listener.local_addr()?
        );
        let backoff = Duration::from_millis(self.state.config.server.accept_backoff_ms);

        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            };
            info!("New connection from {}", addr);
            self.state.stats.record_connection();

            let state = self.state.clone();
            #[cfg(feature = "native-tls")]
            let tls = self.tls.clone();

            tokio::spawn(async move {
                #[cfg(feature = "native-tls")]
                let result = match tls {
                    Some(acceptor) => accept_tls(stream, addr, state.clone(), acceptor).await,
                    None => accept_plain(stream, addr, state.clone()).await,
                };
                #[cfg(not(feature = "native-tls"))]
                let result = accept_plain(stream, addr, state.clone()).await;

                if let Err(e) = result {
                    state.stats.record_handshake_failure();
                    error!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}

#[cfg(not(feature = "native-tls"))]
fn ensure_plain(state: &SharedState) -> Result<(), TransportError> {
    if state.config.tls.enabled {
        return Err(TransportError::Tls(
            "built without the native-tls feature".to_string(),
        ));
    }
    Ok(())
}

async fn accept_plain(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<SharedState>,
) -> Result<(), TransportError> {
    let _ = stream.set_nodelay(true);
    upgrade(stream, addr, state).await
}

#[cfg(feature = "native-tls")]
async fn accept_tls(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<SharedState>,
    acceptor: TlsAcceptor,
) -> Result<(), TransportError> {
    let _ = stream.set_nodelay(true);
    let tls_stream = acceptor
        .accept(stream)
        .await
        .map_err(|e| TransportError::Tls(e.to_string()))?;
    upgrade(tls_stream, addr, state).await
}

async fn upgrade<S>(stream: S, addr: SocketAddr, state: Arc<SharedState>) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let ws_stream = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))?;

    info!("WebSocket handshake completed for {}", addr);
    handle_signaling_connection(ws_stream, addr, state).await;
    Ok(())
}
