use clap::Parser;
use std::path::PathBuf;

use signal_relay::config;

#[derive(Parser, Debug)]
#[command(name = "signal-relay")]
#[command(author = "Signal Relay Team")]
#[command(version)]
#[command(about = "WebRTC signaling relay over WebSocket", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/signal-relay.toml")]
    pub config: PathBuf,

    /// Signaling bind address
    #[arg(long)]
    pub host: Option<String>,

    /// Signaling WebSocket port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// HTTP port for health/metrics
    #[arg(long)]
    pub http_port: Option<u16>,

    /// Disable the HTTP health/metrics server
    #[arg(long, action)]
    pub no_http: bool,

    /// Serve wss:// using the configured certificate
    #[arg(long, action)]
    pub tls: bool,

    /// TLS certificate (PEM)
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// TLS private key (PKCS#8 PEM)
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action)]
    pub verbose: bool,
}

impl Args {
    pub fn load_config(&self) -> Result<config::Config, Box<dyn std::error::Error>> {
        config::Config::load(&self.config)
    }

    /// Apply command line overrides on top of the file configuration
    pub fn apply_overrides(&self, config: &mut config::Config) {
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(port) = self.http_port {
            config.http.port = port;
        }
        if self.no_http {
            config.http.enabled = false;
        }
        if self.tls {
            config.tls.enabled = true;
        }
        if let Some(ref cert) = self.cert {
            config.tls.cert_path = cert.clone();
        }
        if let Some(ref key) = self.key {
            config.tls.key_path = key.clone();
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
    }
}
