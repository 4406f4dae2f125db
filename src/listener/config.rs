//! Listener configuration

use bytes::Bytes;
use microinvader_shared::codec::{CommandDecoder, NumberParsing};
use microinvader_shared::protocol;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

/// Address family served by one listener instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Wildcard address of this family on `port`
    pub fn wildcard(&self, port: u16) -> SocketAddr {
        match self {
            AddressFamily::Ipv4 => SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            AddressFamily::Ipv6 => SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// Configuration for a command listener
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Port to bind on the wildcard address
    pub port: u16,
    /// Bounded wait for a single receive
    pub recv_timeout: Duration,
    /// Separator bytes between the two speed tokens
    pub delimiter: Bytes,
    /// Numeric token conversion
    pub parsing: NumberParsing,
    /// Datagrams longer than this are truncated
    pub max_payload: usize,
    /// Delay before rebuilding a faulted session (initial)
    pub restart_delay: Duration,
    /// Maximum restart delay
    pub max_restart_delay: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: protocol::UDP_PORT,
            recv_timeout: protocol::RECV_TIMEOUT,
            delimiter: Bytes::from_static(protocol::COMMAND_DELIMITER),
            parsing: NumberParsing::Lenient,
            max_payload: protocol::MAX_PAYLOAD_LEN,
            restart_delay: Duration::from_millis(250),
            max_restart_delay: Duration::from_secs(5),
        }
    }
}

impl ListenerConfig {
    /// Decoder matching this configuration
    pub fn decoder(&self) -> CommandDecoder {
        CommandDecoder::new(self.delimiter.clone(), self.parsing)
    }
}
