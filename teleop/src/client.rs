//! UDP client for the robot command link

use anyhow::{Context, Result};
use microinvader_shared::{codec, protocol, Command, ReplyToken};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::time::{timeout, Duration, Instant};
use tracing::{debug, warn};

/// What happened to one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Robot answered "OK"
    Acknowledged { attempts: u32 },
    /// Robot answered "Error"
    Rejected { attempts: u32 },
    /// No reply after all attempts
    NoReply { attempts: u32 },
}

impl CommandOutcome {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, CommandOutcome::Acknowledged { .. })
    }
}

/// Client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long to wait for a reply per attempt
    pub reply_timeout: Duration,
    /// Extra attempts after the first one goes unanswered
    pub retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_millis(500),
            retries: 2,
        }
    }
}

/// Sends commands to one robot and waits for its reply tokens
pub struct TeleopClient {
    socket: UdpSocket,
    target: SocketAddr,
    config: ClientConfig,
}

impl TeleopClient {
    /// Bind a local socket of the target's family and associate it with the robot
    pub async fn connect(target: SocketAddr, config: ClientConfig) -> Result<Self> {
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)
            .await
            .context("Unable to bind local socket")?;
        socket
            .connect(target)
            .await
            .with_context(|| format!("Unable to reach {}", target))?;

        Ok(Self {
            socket,
            target,
            config,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Send a command, retrying while the robot stays silent
    pub async fn send_command(&self, command: Command) -> Result<CommandOutcome> {
        let request = codec::encode(&command, protocol::COMMAND_DELIMITER);
        let attempts = self.config.retries + 1;

        for attempt in 1..=attempts {
            debug!("Sending {} to {} (attempt {})", command, self.target, attempt);
            self.socket
                .send(&request)
                .await
                .with_context(|| format!("Failed to send to {}", self.target))?;

            match self.wait_reply().await? {
                Some(ReplyToken::Ok) => {
                    return Ok(CommandOutcome::Acknowledged { attempts: attempt })
                }
                Some(ReplyToken::Error) => {
                    return Ok(CommandOutcome::Rejected { attempts: attempt })
                }
                None => warn!(
                    "No reply from {} (attempt {}/{})",
                    self.target, attempt, attempts
                ),
            }
        }

        Ok(CommandOutcome::NoReply { attempts })
    }

    /// Wait for a reply token, skipping anything that is not one
    async fn wait_reply(&self) -> Result<Option<ReplyToken>> {
        let deadline = Instant::now() + self.config.reply_timeout;
        let mut buf = [0u8; protocol::RX_BUFFER_SIZE];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let len = match timeout(remaining, self.socket.recv(&mut buf)).await {
                Err(_) => return Ok(None),
                Ok(Ok(len)) => len,
                // An ICMP unreachable from a previous send shows up here
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                    debug!("Robot port unreachable: {}", e);
                    continue;
                }
                Ok(Err(e)) => return Err(e).context("Failed to receive reply"),
            };

            match ReplyToken::from_bytes(&buf[..len]) {
                Some(token) => return Ok(Some(token)),
                None => debug!(
                    "Ignoring unexpected reply: {:?}",
                    String::from_utf8_lossy(&buf[..len])
                ),
            }
        }
    }
}
