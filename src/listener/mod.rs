//! Command listener
//!
//! This module handles:
//! - The UDP socket session lifecycle, one listener per address family
//! - Receiving, decoding and dispatching motor commands
//! - Replying with a status token for every datagram
//! - Rebuilding the session after socket faults, with backoff

mod config;
mod peer;
mod server;

pub use config::{AddressFamily, ListenerConfig};
pub use server::{CommandListener, ListenerEvent};
