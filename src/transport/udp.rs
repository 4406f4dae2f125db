//! UDP transport implementation backed by tokio

use crate::transport::traits::{DatagramBinder, DatagramSocket};
use anyhow::{Context, Result};
use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// UDP socket wrapper implementing DatagramSocket
pub struct UdpTransport {
    inner: UdpSocket,
}

impl UdpTransport {
    pub fn new(socket: UdpSocket) -> Self {
        Self { inner: socket }
    }
}

#[async_trait]
impl DatagramSocket for UdpTransport {
    async fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }

    async fn send_to(&mut self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.inner.send_to(buf, target).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

/// Binds tokio UDP sockets
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpBinder;

impl UdpBinder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatagramBinder for UdpBinder {
    type Socket = UdpTransport;

    async fn bind(&self, addr: SocketAddr) -> Result<Self::Socket> {
        let socket =
            bind_socket(addr).with_context(|| format!("Unable to bind UDP socket to {}", addr))?;
        Ok(UdpTransport::new(socket))
    }

    fn name(&self) -> &'static str {
        "UDP"
    }
}

/// Bind a non-blocking UDP socket; IPv6 sockets never accept IPv4 traffic so
/// each family keeps its own listener on the same port
fn bind_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}
