//! Self-signed certificates and TLS acceptors for the fake servers.
//!
//! Certificates are generated with `rcgen` at startup and cover
//! `localhost` and `127.0.0.1`, so no cert files are needed.

use rcgen::{CertifiedKey, generate_simple_self_signed};
use rustls::RootCertStore;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// A certificate with its private key, in DER and PEM form.
pub struct SelfSigned {
    pub cert_der: CertificateDer<'static>,
    pub key_der: PrivateKeyDer<'static>,
    pub cert_pem: String,
    pub key_pem: String,
}

impl SelfSigned {
    pub fn generate() -> Self {
        // Multiple tests may race to install the provider; the loser's
        // error is harmless.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let CertifiedKey { cert, key_pair } =
            generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
                .expect("generate self-signed cert");

        Self {
            cert_der: cert.der().clone(),
            key_der: PrivatePkcs8KeyDer::from(key_pair.serialize_der()).into(),
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
        }
    }

    /// An acceptor presenting this certificate.
    ///
    /// With `client_root`, clients must present a certificate that
    /// chains to it; otherwise no client certificate is requested.
    pub fn acceptor(&self, client_root: Option<&Self>) -> TlsAcceptor {
        let builder = rustls::ServerConfig::builder();
        let builder = match client_root {
            Some(root) => {
                let mut roots = RootCertStore::empty();
                roots
                    .add(root.cert_der.clone())
                    .expect("add client root");
                let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
                    .build()
                    .expect("build client verifier");
                builder.with_client_cert_verifier(verifier)
            }
            None => builder.with_no_client_auth(),
        };

        let config = builder
            .with_single_cert(vec![self.cert_der.clone()], self.key_der.clone_key())
            .expect("build server TLS config");
        TlsAcceptor::from(Arc::new(config))
    }
}
