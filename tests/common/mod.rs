//! Shared test helpers: throwaway PKI and socket plumbing.
#![allow(dead_code)]

use rcgen::{BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair};
use tokio::net::{TcpListener, TcpStream};

use backstore::net::tls::TlsContext;

/// A throwaway CA with a server certificate, able to mint client
/// certificates with arbitrary common names.
pub struct TestPki {
    ca_cert_pem: String,
    ca_key: KeyPair,
    ca_cert: rcgen::Certificate,
    server_cert_pem: String,
    server_key_pem: String,
}

impl TestPki {
    /// Build a CA and a server certificate valid for "localhost".
    pub fn new() -> Self {
        let mut ca_params = CertificateParams::default();
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "backstore test CA");
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca_key = KeyPair::generate().expect("CA key generation");
        let ca_cert = ca_params.self_signed(&ca_key).expect("CA self-signing");
        let ca_cert_pem = ca_cert.pem();

        let mut server_params =
            CertificateParams::new(vec!["localhost".to_string()]).expect("server cert params");
        server_params
            .distinguished_name
            .push(DnType::CommonName, "backstore test server");
        server_params
            .extended_key_usages
            .push(ExtendedKeyUsagePurpose::ServerAuth);
        let server_key = KeyPair::generate().expect("server key generation");
        let server_cert = server_params
            .signed_by(&server_key, &ca_cert, &ca_key)
            .expect("server cert signing");

        Self {
            ca_cert_pem,
            ca_key,
            ca_cert,
            server_cert_pem: server_cert.pem(),
            server_key_pem: server_key.serialize_pem(),
        }
    }

    /// TLS context for the daemon side.
    pub fn server_context(&self) -> TlsContext {
        TlsContext::from_pem(
            self.server_cert_pem.as_bytes(),
            self.server_key_pem.as_bytes(),
            self.ca_cert_pem.as_bytes(),
        )
        .expect("server TLS context")
    }

    /// Mint a client certificate with the given common name.
    /// Returns (certificate PEM, key PEM).
    pub fn client_cert(&self, common_name: &str) -> (String, String) {
        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        params
            .extended_key_usages
            .push(ExtendedKeyUsagePurpose::ClientAuth);
        let key = KeyPair::generate().expect("client key generation");
        let cert = params
            .signed_by(&key, &self.ca_cert, &self.ca_key)
            .expect("client cert signing");
        (cert.pem(), key.serialize_pem())
    }

    /// TLS context for a client whose certificate carries `common_name`.
    pub fn client_context(&self, common_name: &str) -> TlsContext {
        let (cert_pem, key_pem) = self.client_cert(common_name);
        TlsContext::from_pem(
            cert_pem.as_bytes(),
            key_pem.as_bytes(),
            self.ca_cert_pem.as_bytes(),
        )
        .expect("client TLS context")
    }

    /// PEM text of the CA certificate.
    pub fn ca_pem(&self) -> &str {
        &self.ca_cert_pem
    }
}

/// A connected TCP socket pair over loopback.
pub async fn socket_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (accepted, connected) = tokio::join!(listener.accept(), TcpStream::connect(addr));
    (accepted.expect("accept").0, connected.expect("connect"))
}
