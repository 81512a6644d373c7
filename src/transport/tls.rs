//! TLS acceptor for wss://
//!
//! Loads a PEM certificate chain and a PKCS#8 PEM private key once at
//! startup. Each accepted TCP stream is wrapped before the WebSocket upgrade.

use super::TransportError;
use log::info;
use std::path::Path;
use tokio_native_tls::TlsAcceptor;

/// Build a TLS acceptor from PEM files
pub fn load_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, TransportError> {
    let cert = std::fs::read(cert_path).map_err(|e| {
        TransportError::Tls(format!("cannot read certificate {}: {}", cert_path.display(), e))
    })?;
    let key = std::fs::read(key_path).map_err(|e| {
        TransportError::Tls(format!("cannot read key {}: {}", key_path.display(), e))
    })?;

    let identity = native_tls::Identity::from_pkcs8(&cert, &key)
        .map_err(|e| TransportError::Tls(format!("invalid certificate/key pair: {}", e)))?;
    let acceptor = native_tls::TlsAcceptor::new(identity)
        .map_err(|e| TransportError::Tls(e.to_string()))?;

    info!("TLS certificate loaded from {}", cert_path.display());
    Ok(TlsAcceptor::from(acceptor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "signal-relay-{}-{}",
            std::process::id(),
            name
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_certificate() {
        let err = load_acceptor(
            Path::new("/nonexistent/cert.pem"),
            Path::new("/nonexistent/key.pem"),
        )
        .unwrap_err();
        assert!(matches!(err, TransportError::Tls(_)));
        assert!(err.to_string().contains("cert.pem"));
    }

    #[test]
    fn test_garbage_pem_is_rejected() {
        let cert = temp_file("cert.pem", "not a certificate");
        let key = temp_file("key.pem", "not a key");
        let result = load_acceptor(&cert, &key);
        let _ = std::fs::remove_file(&cert);
        let _ = std::fs::remove_file(&key);
        assert!(matches!(result, Err(TransportError::Tls(_))));
    }
}
