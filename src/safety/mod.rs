//! Safety Module
//!
//! Stops the motors when the command stream goes quiet while the robot
//! is still moving.

mod watchdog;

pub use watchdog::{CommandWatchdog, SafetyAction};
