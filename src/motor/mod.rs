//! Motor dispatch boundary
//!
//! The actuation layer is external; the listener only reaches it through
//! `MotorDispatcher`, which serializes calls coming from every listener
//! instance and from the command watchdog.

mod dispatcher;
mod driver;

pub use dispatcher::MotorDispatcher;
pub use driver::LoggingMotorDriver;

#[cfg(test)]
pub use driver::RecordingMotorDriver;
