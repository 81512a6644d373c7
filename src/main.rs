//! signal-relay - Main entry point
//!
//! WebRTC signaling relay: every message a peer sends over its WebSocket is
//! forwarded verbatim to all other connected peers.

mod args;

use args::Args;
use clap::Parser;
use log::{error, info, warn};
use signal_relay::transport::WebSocketServer;
use signal_relay::web::{self, SharedState};
use std::sync::Arc;
use tokio::signal;
use tokio::task;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration before logging so the file can set the level.
    // Only a missing file falls back to defaults; a broken one is fatal.
    let mut config = match args.load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load config {:?}: {}", args.config, e);
            return Err(e);
        }
    };
    args.apply_overrides(&mut config);

    // Initialize logging; RELAY_LOG takes precedence over the configured level
    env_logger::Builder::new()
        .parse_filters(&std::env::var("RELAY_LOG").unwrap_or_else(|_| config.logging.level.clone()))
        .filter_module("tungstenite", log::LevelFilter::Warn)
        .filter_module("tokio_tungstenite", log::LevelFilter::Warn)
        .init();

    info!("signal-relay v{}", env!("CARGO_PKG_VERSION"));
    if args.config.exists() {
        info!("Loaded configuration from {:?}", args.config);
    } else {
        warn!("Config file {:?} not found, using defaults", args.config);
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e);
    }

    let http_enabled = config.http.enabled;
    let state = Arc::new(SharedState::new(config));

    // Bind before spawning so that an unavailable port is fatal
    let server = WebSocketServer::new(state.clone())?;
    let listener = server.bind().await?;

    let mut relay_handle = task::spawn(async move {
        if let Err(e) = server.serve(listener).await {
            error!("Signaling server error: {}", e);
        }
    });

    let mut http_handle = if http_enabled {
        let http_state = state.clone();
        Some(task::spawn(async move {
            if let Err(e) = web::run_http_server(http_state).await {
                error!("HTTP server error: {}", e);
            }
        }))
    } else {
        info!("HTTP health/metrics server disabled");
        None
    };

    // Wait for shutdown signal
    let shutdown = async {
        let _ = signal::ctrl_c().await;
        info!("Shutdown signal received");
    };

    let stopped_unexpectedly = {
        let http_wait = async {
            match http_handle.as_mut() {
                Some(handle) => handle.await,
                None => futures::future::pending().await,
            }
        };

        tokio::select! {
            _ = shutdown => {
                info!("Initiating shutdown...");
                false
            }
            result = &mut relay_handle => {
                log_async_task_result("Signaling server", result);
                true
            }
            result = http_wait => {
                log_async_task_result("HTTP server", result);
                true
            }
        }
    };

    // Open connections are abandoned; peers see their socket close
    info!(
        "Stopping servers ({} peers connected)",
        state.connection_count()
    );
    relay_handle.abort();
    if let Some(handle) = http_handle {
        handle.abort();
    }

    if stopped_unexpectedly {
        return Err("a server task stopped unexpectedly".into());
    }

    info!("signal-relay stopped");
    Ok(())
}

fn log_async_task_result(task: &str, result: Result<(), tokio::task::JoinError>) {
    match result {
        Ok(()) => warn!("{} stopped unexpectedly", task),
        Err(err) => error!("{} join error: {}", task, err),
    }
}
