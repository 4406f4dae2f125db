pub mod traits;
pub mod udp;

#[cfg(test)]
pub mod mock;

pub use traits::{DatagramBinder, DatagramSocket};
pub use udp::UdpBinder;
