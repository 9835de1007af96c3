//! TLS client sockets layered on [`crate::tcp`]
//!
//! Provides `connect()` and `session()`; the handshake, certificate
//! checks and record layer all belong to rustls.

use crate::config::TlsOptions;
use crate::error::{Error, Result};
use crate::session::scoped;
use crate::tcp;
use crate::verify::{self, CertVerification};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

/// A TLS stream that owns its TCP socket; closing one closes both.
pub type TlsSocket = tokio_rustls::client::TlsStream<TcpStream>;

/// Build the rustls client config for `options`.
///
/// Verification follows the mode table in [`crate::verify`]. A client
/// certificate is presented when both `cert` and `key` are set.
///
/// # Errors
///
/// Fails if only one of `cert`/`key` is set, if either file cannot be
/// read, or if rustls rejects the key.
pub fn client_config(options: &TlsOptions) -> Result<ClientConfig> {
    let builder = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?;

    let verification = verify::resolve(options.verify);
    debug!("Using {:?} certificate verification", verification);

    let builder = match verification {
        CertVerification::AcceptAny => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyVerifier)),
        CertVerification::WebPki => {
            let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            builder.with_root_certificates(roots)
        }
    };

    let config = match (&options.cert, &options.key) {
        (Some(cert), Some(key)) => {
            builder.with_client_auth_cert(load_certs(cert)?, load_key(key)?)?
        }
        (None, None) => builder.with_no_client_auth(),
        _ => {
            return Err(Error::Config(
                "client cert and key must be given together".into(),
            ));
        }
    };
    Ok(config)
}

/// Open a TCP socket and run a TLS handshake over it.
///
/// # Errors
///
/// Returns TCP errors, an invalid server name, or the handshake error.
pub async fn connect(options: &TlsOptions) -> Result<TlsSocket> {
    let config = client_config(options)?;
    let name = options
        .sni
        .clone()
        .unwrap_or_else(|| options.tcp.host.clone());
    let server_name =
        ServerName::try_from(name).map_err(|e| Error::InvalidServerName(e.to_string()))?;

    let tcp_stream = tcp::connect(&options.tcp).await?;
    let tls_stream = TlsConnector::from(Arc::new(config))
        .connect(server_name, tcp_stream)
        .await?;

    info!(
        "TLS established with {}:{}",
        options.tcp.host, options.tcp.port
    );
    Ok(tls_stream)
}

/// Connect, hand the TLS stream to `body`, then close it.
///
/// # Errors
///
/// Returns connect errors, the body's error, or the close error.
pub async fn session<T, F>(options: &TlsOptions, body: F) -> Result<T>
where
    F: AsyncFnOnce(&mut TlsSocket) -> Result<T>,
{
    let stream = connect(options).await?;
    scoped(stream, body).await
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader).collect::<std::io::Result<Vec<_>>>()?;
    if certs.is_empty() {
        return Err(Error::Config(format!(
            "No certificates in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| Error::Config(format!("No private key in {}", path.display())))
}

/// Certificate verifier that accepts all certificates.
///
/// Selected only by [`crate::VerifyMode::None`].
#[derive(Debug)]
struct AcceptAnyVerifier;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
