//! MicroInvader Shared Protocol Types
//!
//! This crate provides the command protocol types and codec shared between
//! the robot-side listener and the operator-side teleop client.

pub mod codec;
pub mod state_machine;

use std::fmt;

/// Protocol parameters for the command link
pub mod protocol {
    use std::time::Duration;

    /// Well-known UDP port the robot listens on
    pub const UDP_PORT: u16 = 3333;

    /// Separator between the left and right speed tokens
    pub const COMMAND_DELIMITER: &[u8] = b",";

    /// Size of the receive buffer, including the terminating NUL slot
    pub const RX_BUFFER_SIZE: usize = 128;

    /// Largest payload the listener will look at; longer datagrams are truncated
    pub const MAX_PAYLOAD_LEN: usize = RX_BUFFER_SIZE - 1;

    /// Bounded wait for a single receive before looping again
    pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);
}

/// A decoded motor-speed command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    pub left_speed: i32,
    pub right_speed: i32,
}

impl Command {
    /// Create a new command
    pub fn new(left_speed: i32, right_speed: i32) -> Self {
        Self {
            left_speed,
            right_speed,
        }
    }

    /// The all-stop command
    pub fn stop() -> Self {
        Self::new(0, 0)
    }

    /// Speeds as handed to the motor layer
    pub fn motor_values(&self) -> (f32, f32) {
        (self.left_speed as f32, self.right_speed as f32)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "left={} right={}", self.left_speed, self.right_speed)
    }
}

/// Status token sent back for every received datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyToken {
    Ok,
    Error,
}

impl ReplyToken {
    /// Wire representation (ASCII, no terminator)
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            ReplyToken::Ok => b"OK",
            ReplyToken::Error => b"Error",
        }
    }

    /// Parse a reply datagram. Returns `None` for anything that is not a token.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"OK" => Some(ReplyToken::Ok),
            b"Error" => Some(ReplyToken::Error),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ReplyToken::Ok)
    }
}

impl fmt::Display for ReplyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyToken::Ok => write!(f, "OK"),
            ReplyToken::Error => write!(f, "Error"),
        }
    }
}
