//! Command Watchdog
//!
//! Runs a background task that checks how long ago the motors last received
//! a command and issues a stop when the operator has gone silent.

use crate::motor::MotorDispatcher;
use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};

/// Actions that the watchdog can trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyAction {
    /// Motors were stopped after no command arrived in time
    CommandTimeout { idle_for: Duration },
}

/// Stops moving motors when commands stop arriving
pub struct CommandWatchdog {
    dispatcher: MotorDispatcher,
    timeout: Duration,
    check_interval: Duration,
    action_tx: mpsc::UnboundedSender<SafetyAction>,
}

impl CommandWatchdog {
    /// Create a watchdog and the channel its actions are reported on
    pub fn new(
        dispatcher: MotorDispatcher,
        timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SafetyAction>) {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let check_interval = (timeout / 4).max(Duration::from_millis(10));

        let watchdog = Self {
            dispatcher,
            timeout,
            check_interval,
            action_tx,
        };
        (watchdog, action_rx)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start the watchdog background task; it stops with `shutdown`
    pub fn start(self, shutdown: watch::Receiver<bool>) -> WatchdogHandle {
        WatchdogHandle {
            task: tokio::spawn(self.run(shutdown)),
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("[SAFETY] Command watchdog started, timeout {:?}", self.timeout);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            if let Some(idle_for) = self.dispatcher.stop_if_idle(self.timeout).await {
                warn!("[SAFETY] No command for {:?}, motors stopped", idle_for);
                let _ = self.action_tx.send(SafetyAction::CommandTimeout { idle_for });
            }
        }

        info!("[SAFETY] Command watchdog stopped");
    }
}

/// Handle to a running watchdog
pub struct WatchdogHandle {
    task: tokio::task::JoinHandle<()>,
}

impl WatchdogHandle {
    /// Wait for the watchdog to stop
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| anyhow!("Command watchdog task failed: {}", e))
    }
}
