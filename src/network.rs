//! Local network address lookup

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::debug;

/// Address used only to pick the outbound interface; nothing is sent
const ROUTE_PROBE: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 9);

/// The robot's own IPv4 address on the network, if it has one
pub async fn get_local_address() -> Option<String> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.ok()?;
    if let Err(e) = socket.connect(ROUTE_PROBE).await {
        debug!("No route for local address lookup: {}", e);
        return None;
    }

    let ip = socket.local_addr().ok()?.ip();
    if ip.is_unspecified() {
        None
    } else {
        Some(ip.to_string())
    }
}
