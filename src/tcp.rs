//! TCP client and listener helpers
//!
//! Thin wrappers over `tokio::net`. Connection errors are returned as
//! the platform reports them.

use crate::config::{ListenOptions, TcpOptions};
use crate::error::{Error, Result};
use crate::session::scoped;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpSocket, TcpStream, lookup_host};
use tracing::{debug, info};

/// Open a client socket to `options.host:options.port`.
///
/// When a local host or port is given, the socket is bound to it
/// before connecting.
///
/// # Errors
///
/// Returns the resolver or connect error unchanged.
pub async fn connect(options: &TcpOptions) -> Result<TcpStream> {
    let target = (options.host.as_str(), options.port);
    debug!("Connecting to {}:{}", options.host, options.port);

    if options.local_host.is_none() && options.local_port.is_none() {
        return Ok(TcpStream::connect(target).await?);
    }

    let local = local_addr(options).await?;
    let remote = lookup_host(target)
        .await?
        .find(|addr| addr.is_ipv4() == local.is_ipv4())
        .ok_or_else(|| Error::NoAddress(format!("{}:{}", options.host, options.port)))?;

    let socket = new_socket(local)?;
    socket.bind(local)?;
    debug!("Bound local address {}", local);

    Ok(socket.connect(remote).await?)
}

/// Connect, then write `data` once.
///
/// # Errors
///
/// Returns connect or write errors unchanged.
pub async fn connect_and_send(data: &[u8], options: &TcpOptions) -> Result<TcpStream> {
    let mut stream = connect(options).await?;
    stream.write_all(data).await?;
    Ok(stream)
}

/// Connect, hand the socket to `body`, and close it afterwards.
///
/// The socket is shut down on every exit path of `body`.
///
/// # Errors
///
/// Returns connect errors, the body's error, or the shutdown error.
pub async fn session<T, F>(options: &TcpOptions, body: F) -> Result<T>
where
    F: AsyncFnOnce(&mut TcpStream) -> Result<T>,
{
    let stream = connect(options).await?;
    scoped(stream, body).await
}

/// Read the first line the server sends, without line terminators.
///
/// # Errors
///
/// Returns connect or read errors unchanged. A server that closes
/// before sending anything yields an `UnexpectedEof` I/O error.
pub async fn banner(options: &TcpOptions) -> Result<String> {
    session(options, async |stream: &mut TcpStream| -> Result<String> {
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        Ok(line.trim().to_string())
    })
    .await
}

/// Bind a listening socket with `SO_REUSEADDR` and the given backlog.
///
/// # Errors
///
/// Returns resolve, bind or listen errors unchanged.
pub async fn listen(options: &ListenOptions) -> Result<TcpListener> {
    let addr = lookup_host((options.host.as_str(), options.port))
        .await?
        .next()
        .ok_or_else(|| Error::NoAddress(options.host.clone()))?;

    let socket = new_socket(addr)?;
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(options.backlog)?;

    info!("Listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Listen with a backlog of one and serve a single client.
///
/// # Errors
///
/// See [`listen`] and [`serve_once`].
pub async fn listen_once<T, F>(options: &ListenOptions, body: F) -> Result<T>
where
    F: AsyncFnOnce(&mut TcpStream, SocketAddr) -> Result<T>,
{
    let listener = listen(&ListenOptions {
        backlog: 1,
        ..options.clone()
    })
    .await?;
    serve_once(listener, body).await
}

/// Accept exactly one client, run `body`, then close the client and the
/// listener.
///
/// # Errors
///
/// Returns the accept error, the body's error, or the client shutdown
/// error.
pub async fn serve_once<T, F>(listener: TcpListener, body: F) -> Result<T>
where
    F: AsyncFnOnce(&mut TcpStream, SocketAddr) -> Result<T>,
{
    let (client, peer) = listener.accept().await?;
    debug!("Accepted connection from {}", peer);

    let result = scoped(client, async move |client: &mut TcpStream| {
        body(client, peer).await
    })
    .await;

    drop(listener);
    result
}

async fn local_addr(options: &TcpOptions) -> Result<SocketAddr> {
    let port = options.local_port.unwrap_or(0);
    match options.local_host.as_deref() {
        Some(host) => lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| Error::NoAddress(host.to_string())),
        None => Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))),
    }
}

fn new_socket(addr: SocketAddr) -> Result<TcpSocket> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    Ok(socket)
}
