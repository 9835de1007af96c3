//! Scoped connect/use/close
//!
//! Every `session` helper in this crate funnels through [`scoped`], so a
//! socket or protocol session is released exactly once no matter how the
//! caller's body returns.

use crate::error::Result;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::warn;

/// A resource that needs an explicit, awaited close.
pub(crate) trait Release {
    async fn release(&mut self) -> Result<()>;
}

impl Release for TcpStream {
    async fn release(&mut self) -> Result<()> {
        self.shutdown().await?;
        Ok(())
    }
}

impl Release for tokio_rustls::client::TlsStream<TcpStream> {
    async fn release(&mut self) -> Result<()> {
        // Sends close_notify, then shuts down the owned TCP socket.
        self.shutdown().await?;
        Ok(())
    }
}

/// Run `body` against `resource`, then release it.
///
/// The body's error takes precedence over a release error; the latter
/// is only logged in that case.
pub(crate) async fn scoped<R, T, F>(mut resource: R, body: F) -> Result<T>
where
    R: Release,
    F: AsyncFnOnce(&mut R) -> Result<T>,
{
    let outcome = body(&mut resource).await;
    let released = resource.release().await;

    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!("Close after failed session body also failed: {}", close_err);
            Err(e)
        }
    }
}
