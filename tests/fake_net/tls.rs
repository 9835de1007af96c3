//! In-process TLS echo server
//!
//! Presents a self-signed [`SelfSigned`] certificate. Each client gets a
//! greeting line, then every line it sends is echoed back with an
//! `echo: ` prefix until it closes the stream.
//!
//! [`FakeTlsServer::start_requiring_client_cert`] additionally demands a
//! client certificate signed by [`FakeTlsServer::client`].

use super::cert::SelfSigned;
use super::io::write_line;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

pub const GREETING: &str = "hello over tls";

pub struct FakeTlsServer {
    port: u16,
    /// The certificate the server presents.
    pub server: SelfSigned,
    /// A client identity the server trusts when it requires client
    /// certificates.
    pub client: SelfSigned,
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeTlsServer {
    pub async fn start() -> Self {
        Self::spawn(false).await
    }

    /// Like [`Self::start`], but the handshake fails unless the client
    /// presents the certificate in [`Self::client`].
    pub async fn start_requiring_client_cert() -> Self {
        Self::spawn(true).await
    }

    async fn spawn(require_client_cert: bool) -> Self {
        let server = SelfSigned::generate();
        let client = SelfSigned::generate();
        let acceptor = server.acceptor(require_client_cert.then_some(&client));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(accept_loop(listener, acceptor));

        Self {
            port,
            server,
            client,
            _handle: handle,
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }
}

async fn accept_loop(listener: TcpListener, acceptor: TlsAcceptor) {
    loop {
        let Ok((stream, _addr)) = listener.accept().await else {
            break;
        };
        let acceptor = acceptor.clone();
        tokio::spawn(async move {
            let Ok(tls_stream) = acceptor.accept(stream).await else {
                return;
            };
            echo(tls_stream).await;
        });
    }
}

async fn echo<S>(stream: S)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);
    if write_line(&mut reader, &format!("{GREETING}\r\n"))
        .await
        .is_err()
    {
        return;
    }

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let reply = format!("echo: {}\r\n", line.trim_end());
        if write_line(&mut reader, &reply).await.is_err() {
            break;
        }
    }
}
