//! Configuration management for signal-relay

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Signaling WebSocket listener
    #[serde(default)]
    pub server: ServerConfig,

    /// TLS for wss://
    #[serde(default)]
    pub tls: TlsConfig,

    /// HTTP health/metrics server
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// WebSocket port
    pub port: u16,

    /// Backoff after a failed accept, in milliseconds
    pub accept_backoff_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8765,
            accept_backoff_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Serve wss:// instead of ws://
    pub enabled: bool,

    /// PEM certificate chain
    pub cert_path: PathBuf,

    /// PEM private key (PKCS#8)
    pub key_path: PathBuf,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cert_path: PathBuf::from("certs/cert.pem"),
            key_path: PathBuf::from("certs/key.pem"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Enable the health/metrics server
    pub enabled: bool,

    /// HTTP bind address
    pub host: String,

    /// HTTP port
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8766,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or env_logger filter string
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file, falling back to defaults if it is missing
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Signaling listener address, `host:port`
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// HTTP listener address, `host:port`
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.server.host.trim().is_empty() {
            return Err("Server host must not be empty".into());
        }

        if self.server.port == 0 {
            return Err("Server port must be non-zero".into());
        }

        if self.http.enabled {
            if self.http.port == 0 {
                return Err("HTTP port must be non-zero".into());
            }
            if self.http.port == self.server.port && self.http.host == self.server.host {
                return Err("HTTP and signaling servers cannot share the same address".into());
            }
        }

        if self.tls.enabled {
            if !self.tls.cert_path.exists() {
                return Err(format!("TLS certificate not found: {}", self.tls.cert_path.display()).into());
            }
            if !self.tls.key_path.exists() {
                return Err(format!("TLS key not found: {}", self.tls.key_path.display()).into());
            }
        }

        Ok(())
    }
}
