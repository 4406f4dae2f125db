mod listener;
mod motor;
mod network;
mod safety;
mod transport;

use anyhow::{Context, Result};
use listener::{AddressFamily, CommandListener, ListenerConfig, ListenerEvent};
use microinvader_shared::{protocol, Command};
use motor::{LoggingMotorDriver, MotorDispatcher};
use safety::{CommandWatchdog, SafetyAction};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::watch;
use transport::UdpBinder;

use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default command watchdog timeout; 0 disables it
const DEFAULT_WATCHDOG_MS: u64 = 1000;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = ListenerConfig {
        port: env_or("MICROINVADER_PORT", protocol::UDP_PORT)?,
        ..Default::default()
    };

    let mut families = vec![AddressFamily::Ipv4];
    if env_or("MICROINVADER_IPV6", 0u8)? != 0 {
        families.push(AddressFamily::Ipv6);
    }

    info!("MicroInvader command link starting");
    info!("  UDP port: {}", config.port);
    info!("  Families: {:?}", families);
    match network::get_local_address().await {
        Some(ip) => info!("  IP address: {}", ip),
        None => warn!("  Failed to get IP address"),
    }

    let dispatcher = MotorDispatcher::new(LoggingMotorDriver::new());
    info!("Motor driver: {}", dispatcher.driver_name());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn command watchdog
    let watchdog_ms = env_or("MICROINVADER_WATCHDOG_MS", DEFAULT_WATCHDOG_MS)?;
    let watchdog = if watchdog_ms > 0 {
        let (watchdog, mut actions) =
            CommandWatchdog::new(dispatcher.clone(), Duration::from_millis(watchdog_ms));
        info!("Command watchdog timeout: {:?}", watchdog.timeout());
        tokio::spawn(async move {
            while let Some(action) = actions.recv().await {
                match action {
                    SafetyAction::CommandTimeout { idle_for } => {
                        warn!("[MAIN] Command stream lost for {:?}, robot stopped", idle_for);
                    }
                }
            }
        });
        Some(watchdog.start(shutdown_rx.clone()))
    } else {
        info!("Command watchdog disabled");
        None
    };

    // One listener per address family
    let monitors: Vec<_> = families
        .into_iter()
        .map(|family| {
            let listener = CommandListener::spawn(
                config.clone(),
                family,
                UdpBinder::new(),
                dispatcher.clone(),
                shutdown_rx.clone(),
            );
            tokio::spawn(handle_listener_events(listener))
        })
        .collect();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutdown requested");
    shutdown_tx.send_replace(true);

    for result in futures::future::join_all(monitors).await {
        if let Err(e) = result {
            error!("Listener monitor failed: {}", e);
        }
    }
    if let Some(watchdog) = watchdog {
        if let Err(e) = watchdog.join().await {
            error!("{}", e);
        }
    }

    if let Some(last) = dispatcher.last_command().await {
        debug!("Last command before shutdown: {}", last);
    }
    dispatcher.dispatch(Command::stop()).await;
    info!(
        "Shutdown complete ({} motor updates)",
        dispatcher.dispatch_count().await
    );
    Ok(())
}

/// Report listener events until the listener stops
async fn handle_listener_events(mut listener: CommandListener) {
    let family = listener.family();

    while let Some(event) = listener.recv().await {
        match event {
            ListenerEvent::StateChanged { from, to } => {
                info!("[{}] Session {} -> {}", family, from, to);
            }
            ListenerEvent::Bound { local_addr } => {
                debug!("[{}] Bound to {}", family, local_addr);
            }
            ListenerEvent::Served { peer, reply } => {
                debug!("[{}] Replied {} to {}", family, reply, peer);
            }
            ListenerEvent::ReceiveTimedOut => {}
            ListenerEvent::Faulted { reason } => {
                warn!("[{}] Session faulted: {}", family, reason);
            }
        }
    }

    debug!("[{}] Listener finished in state {}", family, listener.state());
    if let Err(e) = listener.join().await {
        error!("{}", e);
    }
}

/// Read an override from the environment, falling back to `default`
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", name, value)),
        Err(_) => Ok(default),
    }
}
