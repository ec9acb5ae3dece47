//! Shared TLS context: certificate loading and rustls configuration.
//!
//! # Responsibilities
//! - Load certificate, private key, and trust roots from PEM files once at
//!   startup (and again on reload)
//! - Build the rustls server config (client certificates required) and the
//!   matching client config for initiator-role sessions
//!
//! # Design Decisions
//! - One `TlsContext` per process, shared read-only by every session
//! - Mutual TLS is not optional: a client without a certificate chaining to
//!   the configured CA never completes the handshake

use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use thiserror::Error;

use crate::config::schema::TlsConfig;

/// Errors raised while building the shared TLS context.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("private key error: {0}")]
    PrivateKey(String),

    #[error("TLS configuration error: {0}")]
    Config(String),
}

/// Shared TLS configuration, prepared once and reused by all sessions.
#[derive(Clone)]
pub struct TlsContext {
    server_config: Arc<ServerConfig>,
    client_config: Arc<ClientConfig>,
}

impl TlsContext {
    /// Build the context from the configured PEM files.
    pub fn from_config(config: &TlsConfig) -> Result<Self, TlsError> {
        let cert_pem = read_pem(&config.certificate_file)?;
        let key_pem = read_pem(&config.private_key_file)?;
        let ca_pem = read_pem(&config.trusted_cas_file)?;
        Self::from_pem(&cert_pem, &key_pem, &ca_pem)
    }

    /// Build the context from in-memory PEM blobs.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8], ca_pem: &[u8]) -> Result<Self, TlsError> {
        let ca_certs = parse_certificates(ca_pem)?;
        if ca_certs.is_empty() {
            return Err(TlsError::Certificate("no CA certificates found".into()));
        }

        let mut root_store = RootCertStore::empty();
        for cert in &ca_certs {
            root_store.add(cert.clone()).map_err(|e| {
                TlsError::Certificate(format!("failed to add CA certificate: {e}"))
            })?;
        }

        let certs = parse_certificates(cert_pem)?;
        if certs.is_empty() {
            return Err(TlsError::Certificate("no certificates found".into()));
        }

        let key = parse_private_key(key_pem)?;

        // Client config for initiator-role sessions: present our certificate
        // and trust the same roots.
        let client_config = ClientConfig::builder()
            .with_root_certificates(root_store.clone())
            .with_client_auth_cert(certs.clone(), key.clone_key())
            .map_err(|e| TlsError::Config(format!("client config error: {e}")))?;

        // Server config: require client certificates chaining to our roots.
        let client_cert_verifier =
            rustls::server::WebPkiClientVerifier::builder(Arc::new(root_store))
                .build()
                .map_err(|e| TlsError::Config(format!("client verifier error: {e}")))?;

        let server_config = ServerConfig::builder()
            .with_client_cert_verifier(client_cert_verifier)
            .with_single_cert(certs, key)
            .map_err(|e| TlsError::Config(format!("server config error: {e}")))?;

        Ok(Self {
            server_config: Arc::new(server_config),
            client_config: Arc::new(client_config),
        })
    }

    /// The rustls server configuration, for acceptor-role sessions.
    pub fn server_config(&self) -> Arc<ServerConfig> {
        self.server_config.clone()
    }

    /// The rustls client configuration, for initiator-role sessions.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }
}

impl std::fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsContext").finish_non_exhaustive()
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, TlsError> {
    std::fs::read(path).map_err(|source| TlsError::ReadFile {
        path: path.display().to_string(),
        source,
    })
}

/// Parse PEM-encoded certificates.
fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::Certificate(format!("failed to parse certificates: {e}")))
}

/// Parse a PEM-encoded private key.
fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, TlsError> {
    PrivateKeyDer::from_pem_slice(pem)
        .map_err(|e| TlsError::PrivateKey(format!("failed to parse private key: {e}")))
}
