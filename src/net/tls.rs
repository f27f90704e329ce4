//! TLS certificate loading.

use std::io;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

/// Load the rustls server config named by `tls`.
pub async fn load_tls_config(tls: &TlsConfig) -> io::Result<RustlsConfig> {
    ensure_exists(Path::new(&tls.cert_path), "Certificate")?;
    ensure_exists(Path::new(&tls.key_path), "Private key")?;

    let config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
    tracing::info!(cert = %tls.cert_path, "TLS certificate loaded");
    Ok(config)
}

fn ensure_exists(path: &Path, what: &str) -> io::Result<()> {
    if path.exists() {
        return Ok(());
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("{what} file not found: {}", path.display()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_certificate() {
        let tls = TlsConfig {
            cert_path: "/nonexistent/gateway.crt".into(),
            key_path: "/nonexistent/gateway.key".into(),
        };
        let err = load_tls_config(&tls).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains("Certificate"));
    }
}
