//! TLS termination for the bridge socket.

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use rustls_pemfile::{certs, private_key};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read PEM material: {0}")]
    PemRead(#[from] std::io::Error),

    #[error("certificate file contains no certificates")]
    NoCertificates,

    #[error("key file contains no private key")]
    NoPrivateKey,

    #[error("TLS configuration rejected: {0}")]
    Config(String),
}

#[derive(Clone, Debug, Default)]
pub struct TlsSettings {
    pub enabled: bool,
    /// Server certificate chain, PEM.
    pub cert_path: String,
    /// Server private key, PEM.
    pub key_path: String,
}

impl TlsSettings {
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.cert_path.is_empty() && !self.key_path.is_empty()
    }
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let loaded: Result<Vec<_>, _> = certs(&mut reader).collect();
    let loaded = loaded.map_err(TlsError::PemRead)?;
    if loaded.is_empty() {
        return Err(TlsError::NoCertificates);
    }
    Ok(loaded)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    private_key(&mut reader)
        .map_err(TlsError::PemRead)?
        .ok_or(TlsError::NoPrivateKey)
}

/// Build the rustls server config from the PEM files in `settings`.
pub fn build_server_config(settings: &TlsSettings) -> Result<Arc<ServerConfig>, TlsError> {
    let certs = load_certs(Path::new(&settings.cert_path))?;
    let key = load_key(Path::new(&settings.key_path))?;
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| TlsError::Config(e.to_string()))?;
    Ok(Arc::new(config))
}
