//! Serialized access to the motor driver

use super::driver::MotorDriver;
use microinvader_shared::Command;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

struct DispatchState {
    driver: Box<dyn MotorDriver>,
    last_command: Option<Command>,
    last_dispatch: Option<Instant>,
    dispatched: u64,
}

/// Shared handle to the motor driver
///
/// Cloning is cheap; every clone talks to the same driver and every call
/// holds the lock for the duration of the driver call.
#[derive(Clone)]
pub struct MotorDispatcher {
    state: Arc<Mutex<DispatchState>>,
    driver_name: &'static str,
}

impl MotorDispatcher {
    /// Wrap a driver
    pub fn new(driver: impl MotorDriver) -> Self {
        let driver_name = driver.name();
        Self {
            state: Arc::new(Mutex::new(DispatchState {
                driver: Box::new(driver),
                last_command: None,
                last_dispatch: None,
                dispatched: 0,
            })),
            driver_name,
        }
    }

    pub fn driver_name(&self) -> &'static str {
        self.driver_name
    }

    /// Apply a command to the motors
    pub async fn dispatch(&self, command: Command) {
        let (left, right) = command.motor_values();
        let mut state = self.state.lock().await;
        state.driver.set_motor_values(left, right).await;
        state.last_command = Some(command);
        state.last_dispatch = Some(Instant::now());
        state.dispatched += 1;
    }

    /// Stop the motors if they are moving and nothing arrived within `timeout`
    ///
    /// Returns how long the motors had been left unattended when a stop was issued.
    pub async fn stop_if_idle(&self, timeout: Duration) -> Option<Duration> {
        let mut state = self.state.lock().await;

        let moving = matches!(state.last_command, Some(cmd) if cmd != Command::stop());
        let idle_for = state.last_dispatch.map(|at| at.elapsed())?;
        if !moving || idle_for < timeout {
            return None;
        }

        debug!("Stopping motors after {:?} without a command", idle_for);
        state.driver.set_motor_values(0.0, 0.0).await;
        state.last_command = Some(Command::stop());
        state.last_dispatch = Some(Instant::now());
        state.dispatched += 1;
        Some(idle_for)
    }

    /// Last command applied to the motors
    pub async fn last_command(&self) -> Option<Command> {
        self.state.lock().await.last_command
    }

    /// Number of driver calls made so far
    pub async fn dispatch_count(&self) -> u64 {
        self.state.lock().await.dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::RecordingMotorDriver;

    #[tokio::test]
    async fn test_dispatch_reaches_driver() {
        let driver = RecordingMotorDriver::new();
        let dispatcher = MotorDispatcher::new(driver.clone());

        dispatcher.dispatch(Command::new(10, 20)).await;

        assert_eq!(driver.calls(), vec![(10.0, 20.0)]);
        assert_eq!(dispatcher.last_command().await, Some(Command::new(10, 20)));
        assert_eq!(dispatcher.dispatch_count().await, 1);
        assert_eq!(dispatcher.driver_name(), "recording");
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_is_serialized() {
        let driver = RecordingMotorDriver::new();
        let dispatcher = MotorDispatcher::new(driver.clone());

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.dispatch(Command::new(i, -i)).await })
            })
            .collect();
        for task in tasks {
            task.await.expect("dispatch task panicked");
        }

        assert_eq!(driver.calls().len(), 16);
        assert_eq!(dispatcher.dispatch_count().await, 16);
    }

    #[tokio::test]
    async fn test_stop_if_idle() {
        let driver = RecordingMotorDriver::new();
        let dispatcher = MotorDispatcher::new(driver.clone());

        // Never commanded: nothing to stop
        assert!(dispatcher.stop_if_idle(Duration::ZERO).await.is_none());

        dispatcher.dispatch(Command::new(50, 50)).await;
        assert!(dispatcher.stop_if_idle(Duration::from_secs(60)).await.is_none());

        assert!(dispatcher.stop_if_idle(Duration::ZERO).await.is_some());
        assert_eq!(dispatcher.last_command().await, Some(Command::stop()));

        // Already stopped: no second stop
        assert!(dispatcher.stop_if_idle(Duration::ZERO).await.is_none());
        assert_eq!(driver.calls(), vec![(50.0, 50.0), (0.0, 0.0)]);
    }
}
