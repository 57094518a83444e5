use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Byte transport a session talks through.
///
/// Implementations are owned by exactly one session, so the methods take
/// `&mut self` and need no internal locking.
#[async_trait]
pub trait Transport: Send {
    /// Receive up to `buf.len()` bytes, waiting until at least one is
    /// available. Returns `Ok(0)` once the peer has closed the connection.
    ///
    /// Must be cancel safe: the session polls the returned future once
    /// during an opportunistic refill and drops it when it is not ready.
    /// An implementation that takes bytes off the wire before its future
    /// completes would lose them there.
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Send all of `data`.
    async fn send(&mut self, data: &[u8]) -> io::Result<()>;
}

#[async_trait]
impl Transport for TcpStream {
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf).await
    }

    async fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_all(data).await?;
        self.flush().await
    }
}
