//! Motor driver trait and the default logging driver

use async_trait::async_trait;
use tracing::info;

/// The `set_motor_values` entry point of the actuation layer
///
/// Fire-and-forget: implementations must return within a bounded time.
#[async_trait]
pub trait MotorDriver: Send + 'static {
    async fn set_motor_values(&mut self, left: f32, right: f32);

    /// Human-readable name for this driver
    fn name(&self) -> &'static str;
}

/// Driver that only records the requested values in the log
#[derive(Debug, Default)]
pub struct LoggingMotorDriver {
    left: f32,
    right: f32,
}

impl LoggingMotorDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MotorDriver for LoggingMotorDriver {
    async fn set_motor_values(&mut self, left: f32, right: f32) {
        if (left, right) != (self.left, self.right) {
            info!("[Motor] left={:.1} right={:.1}", left, right);
        }
        self.left = left;
        self.right = right;
    }

    fn name(&self) -> &'static str {
        "logging"
    }
}

#[cfg(test)]
pub use recording::RecordingMotorDriver;

#[cfg(test)]
mod recording {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Driver that keeps every call for inspection
    #[derive(Debug, Clone, Default)]
    pub struct RecordingMotorDriver {
        calls: Arc<Mutex<Vec<(f32, f32)>>>,
    }

    impl RecordingMotorDriver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<(f32, f32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MotorDriver for RecordingMotorDriver {
        async fn set_motor_values(&mut self, left: f32, right: f32) {
            self.calls.lock().unwrap().push((left, right));
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }
}
