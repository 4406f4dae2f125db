//! Teleop client
//!
//! Sends left/right motor speeds to the robot's command port and reports
//! the reply token for each command.

mod client;

use anyhow::{bail, Context, Result};
use clap::Parser;
use client::{ClientConfig, CommandOutcome, TeleopClient};
use microinvader_shared::{protocol, Command};
use std::net::{Ipv6Addr, SocketAddr};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "teleop")]
#[command(about = "Send motor speed commands to a MicroInvader robot")]
#[command(version)]
#[command(allow_negative_numbers = true)]
struct Args {
    /// Robot address as host or host:port
    #[arg(short, long)]
    target: String,

    /// Left motor speed
    left: i32,

    /// Right motor speed
    right: i32,

    /// Number of times to send the command
    #[arg(long, default_value = "1")]
    repeat: u32,

    /// Delay between repeated commands in milliseconds
    #[arg(long, default_value = "100")]
    interval_ms: u64,

    /// How long to wait for each reply in milliseconds
    #[arg(long, default_value = "500")]
    timeout_ms: u64,

    /// Extra attempts when the robot does not answer
    #[arg(long, default_value = "2")]
    retries: u32,

    /// Send a stop command after the last repeat
    #[arg(long)]
    stop: bool,
}

impl Args {
    async fn target_addr(&self) -> Result<SocketAddr> {
        let with_port = if self.target.parse::<SocketAddr>().is_ok() || has_port(&self.target) {
            self.target.clone()
        } else if self.target.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]:{}", self.target, protocol::UDP_PORT)
        } else {
            format!("{}:{}", self.target, protocol::UDP_PORT)
        };

        tokio::net::lookup_host(with_port)
            .await
            .with_context(|| format!("Cannot resolve {}", self.target))?
            .next()
            .with_context(|| format!("No address for {}", self.target))
    }
}

/// `host:port` with a plain host name or IPv4 address
fn has_port(target: &str) -> bool {
    match target.rsplit_once(':') {
        Some((host, port)) => !host.contains(':') && port.parse::<u16>().is_ok(),
        None => false,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let target = args.target_addr().await?;
    let config = ClientConfig {
        reply_timeout: Duration::from_millis(args.timeout_ms),
        retries: args.retries,
    };
    let client = TeleopClient::connect(target, config).await?;
    info!("Sending to {}", client.target());

    let command = Command::new(args.left, args.right);
    let mut failures = 0u32;
    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));

    for i in 1..=args.repeat {
        ticker.tick().await;
        if !report(i, command, client.send_command(command).await?) {
            failures += 1;
        }
    }

    if args.stop {
        let outcome = client.send_command(Command::stop()).await?;
        if !report(args.repeat + 1, Command::stop(), outcome) {
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{} command(s) not acknowledged", failures);
    }
    Ok(())
}

/// Log one outcome; returns whether the command was acknowledged
fn report(index: u32, command: Command, outcome: CommandOutcome) -> bool {
    match outcome {
        CommandOutcome::Acknowledged { attempts } => {
            info!("#{} {} -> OK ({} attempt(s))", index, command, attempts);
        }
        CommandOutcome::Rejected { attempts } => {
            warn!("#{} {} -> Error ({} attempt(s))", index, command, attempts);
        }
        CommandOutcome::NoReply { attempts } => {
            error!("#{} {} -> no reply after {} attempt(s)", index, command, attempts);
        }
    }
    outcome.is_acknowledged()
}
