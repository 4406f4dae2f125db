//! Datagram transport abstraction for the command listener

use anyhow::Result;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;

/// A bound datagram endpoint
#[async_trait]
pub trait DatagramSocket: Send + 'static {
    /// Wait for the next datagram, returning its length and source
    ///
    /// Must be cancel-safe: the listener races it against the receive
    /// timeout and the shutdown signal.
    async fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Send one datagram to `target`
    async fn send_to(&mut self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;

    /// Address the socket is bound to
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Factory for creating bound sockets
#[async_trait]
pub trait DatagramBinder: Send + Sync {
    /// The socket type this binder produces
    type Socket: DatagramSocket;

    /// Create a socket and bind it to `addr`
    async fn bind(&self, addr: SocketAddr) -> Result<Self::Socket>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
