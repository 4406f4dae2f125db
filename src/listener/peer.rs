//! Source address of a received datagram

use std::fmt;
use std::net::{SocketAddr, SocketAddrV4, SocketAddrV6};

/// Peer address, tagged by the family of the datagram's source
///
/// A dual-stack socket can receive from either family, so this is built
/// from the source address itself, never from the listener's family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerAddress {
    V4(SocketAddrV4),
    V6(SocketAddrV6),
}

impl PeerAddress {
    /// Textual host address, without the port
    pub fn host(&self) -> String {
        match self {
            PeerAddress::V4(addr) => addr.ip().to_string(),
            PeerAddress::V6(addr) => addr.ip().to_string(),
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            PeerAddress::V4(addr) => addr.port(),
            PeerAddress::V6(addr) => addr.port(),
        }
    }

    /// Address to send the reply to
    pub fn socket_addr(&self) -> SocketAddr {
        match *self {
            PeerAddress::V4(addr) => SocketAddr::V4(addr),
            PeerAddress::V6(addr) => SocketAddr::V6(addr),
        }
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(addr) => PeerAddress::V4(addr),
            SocketAddr::V6(addr) => PeerAddress::V6(addr),
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerAddress::V4(_) => write!(f, "{}:{}", self.host(), self.port()),
            PeerAddress::V6(_) => write!(f, "[{}]:{}", self.host(), self.port()),
        }
    }
}
