//! Listener task: socket session lifecycle and the receive/reply loop

use super::config::{AddressFamily, ListenerConfig};
use super::peer::PeerAddress;
use crate::motor::MotorDispatcher;
use crate::transport::{DatagramBinder, DatagramSocket};
use anyhow::{anyhow, Result};
use microinvader_shared::{
    codec::CommandDecoder,
    state_machine::{SessionEvent, SessionState, SessionStateMachine, TransitionResult},
    ReplyToken,
};
use std::net::SocketAddr;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Events emitted by a listener
#[derive(Debug, Clone)]
pub enum ListenerEvent {
    /// Session state changed
    StateChanged { from: SessionState, to: SessionState },
    /// Socket bound
    Bound { local_addr: SocketAddr },
    /// A datagram was answered
    Served { peer: PeerAddress, reply: ReplyToken },
    /// Receive wait expired without data
    ReceiveTimedOut,
    /// Session torn down after a socket error
    Faulted { reason: String },
}

/// Handle to a running listener task
pub struct CommandListener {
    family: AddressFamily,
    event_rx: mpsc::Receiver<ListenerEvent>,
    state_rx: watch::Receiver<SessionState>,
    task: JoinHandle<()>,
}

impl CommandListener {
    /// Spawn a listener for `family`; it runs until `shutdown` carries `true`
    /// or its sender is dropped
    pub fn spawn<B>(
        config: ListenerConfig,
        family: AddressFamily,
        binder: B,
        dispatcher: MotorDispatcher,
        shutdown: watch::Receiver<bool>,
    ) -> Self
    where
        B: DatagramBinder + 'static,
    {
        let (event_tx, event_rx) = mpsc::channel::<ListenerEvent>(100);
        let (state_tx, state_rx) = watch::channel(SessionState::Unbound);

        let task = ListenerTask {
            decoder: config.decoder(),
            config,
            family,
            binder,
            dispatcher,
            shutdown,
            fsm: SessionStateMachine::new(),
            event_tx,
            state_tx,
        };
        let task = tokio::spawn(task.run());

        Self {
            family,
            event_rx,
            state_rx,
            task,
        }
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Receive the next listener event; `None` once the listener has stopped
    pub async fn recv(&mut self) -> Option<ListenerEvent> {
        self.event_rx.recv().await
    }

    /// Wait for the listener task to finish
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| anyhow!("{} listener task failed: {}", self.family, e))
    }
}

/// Why a serving session ended
enum SessionEnd {
    Shutdown,
    Fault(String),
}

struct ListenerTask<B> {
    config: ListenerConfig,
    family: AddressFamily,
    binder: B,
    decoder: CommandDecoder,
    dispatcher: MotorDispatcher,
    shutdown: watch::Receiver<bool>,
    fsm: SessionStateMachine,
    event_tx: mpsc::Sender<ListenerEvent>,
    state_tx: watch::Sender<SessionState>,
}

impl<B: DatagramBinder> ListenerTask<B> {
    /// Session loop: bind, serve, and on fault release and rebuild
    async fn run(mut self) {
        let bind_addr = self.family.wildcard(self.config.port);
        let mut restart_delay = self.config.restart_delay;

        info!(
            "[{}] Listener starting on {} ({})",
            self.family,
            bind_addr,
            self.binder.name()
        );

        while !self.shutdown_requested() {
            match self.binder.bind(bind_addr).await {
                Ok(mut socket) => {
                    restart_delay = self.config.restart_delay;
                    self.transition(SessionEvent::SocketBound);
                    let local_addr = socket.local_addr().unwrap_or(bind_addr);
                    info!("[{}] Socket bound, port {}", self.family, local_addr.port());
                    self.emit(ListenerEvent::Bound { local_addr });

                    match self.serve(&mut socket).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Fault(reason) => self.fault(reason),
                    }
                }
                Err(e) => {
                    error!("[{}] Socket unable to bind: {:#}", self.family, e);
                    self.fault(format!("bind failed: {:#}", e));
                }
            }

            // The socket is dropped by now
            error!("[{}] Shutting down socket and restarting...", self.family);
            self.transition(SessionEvent::SessionReleased);

            debug!("[{}] Restarting in {:?}", self.family, restart_delay);
            tokio::select! {
                _ = sleep(restart_delay) => {}
                _ = self.shutdown.changed() => {}
            }
            restart_delay = std::cmp::min(restart_delay * 2, self.config.max_restart_delay);
        }

        self.transition(SessionEvent::ShutdownRequested);
        info!("[{}] Listener stopped", self.family);
    }

    /// Receive/decode/dispatch/reply until a socket error or shutdown
    async fn serve(&mut self, socket: &mut B::Socket) -> SessionEnd {
        self.transition(SessionEvent::ServingStarted);

        // One extra slot so the payload is always followed by a NUL
        let mut buf = vec![0u8; self.config.max_payload + 1];

        loop {
            if self.shutdown_requested() {
                return SessionEnd::Shutdown;
            }

            debug!("[{}] Waiting for data", self.family);
            let recv_timeout = self.config.recv_timeout;
            let max_payload = self.config.max_payload;
            let received = tokio::select! {
                _ = self.shutdown.changed() => continue,
                result = timeout(recv_timeout, socket.recv_from(&mut buf[..max_payload])) => result,
            };

            let (len, source) = match received {
                Err(_) => {
                    debug!("[{}] Receive timed out", self.family);
                    self.transition(SessionEvent::ReceiveTimedOut);
                    self.emit(ListenerEvent::ReceiveTimedOut);
                    continue;
                }
                Ok(Err(e)) => {
                    error!("[{}] recvfrom failed: {}", self.family, e);
                    return SessionEnd::Fault(format!("recvfrom failed: {}", e));
                }
                Ok(Ok(received)) => received,
            };

            buf[len] = 0;
            let peer = PeerAddress::from(source);
            let reply = self.handle_datagram(&buf[..len], &peer).await;

            if let Err(e) = socket.send_to(reply.as_bytes(), peer.socket_addr()).await {
                error!("[{}] Error occurred during sending: {}", self.family, e);
                return SessionEnd::Fault(format!("send failed: {}", e));
            }

            self.transition(SessionEvent::PacketServed);
            self.emit(ListenerEvent::Served { peer, reply });
        }
    }

    /// Decode one payload, dispatch it if valid, and pick the reply token
    async fn handle_datagram(&self, payload: &[u8], peer: &PeerAddress) -> ReplyToken {
        info!(
            "[{}] Received {} bytes from {}",
            self.family,
            payload.len(),
            peer.host()
        );
        debug!("[{}] {}", self.family, String::from_utf8_lossy(payload));

        match self.decoder.decode(payload) {
            Ok(command) => {
                info!("[{}] Decoded values {}", self.family, command);
                self.dispatcher.dispatch(command).await;
                ReplyToken::Ok
            }
            Err(e) => {
                warn!("[{}] {} (from {})", self.family, e, peer);
                ReplyToken::Error
            }
        }
    }

    fn fault(&mut self, reason: String) {
        self.transition(SessionEvent::TransportFault);
        self.emit(ListenerEvent::Faulted { reason });
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow() || self.shutdown.has_changed().is_err()
    }

    fn transition(&mut self, event: SessionEvent) {
        let from = self.fsm.state();
        match self.fsm.process_event(event) {
            TransitionResult::Success(to) if to != from => {
                debug!("[{}] {} -> {}", self.family, from, to);
                self.state_tx.send_replace(to);
                self.emit(ListenerEvent::StateChanged { from, to });
            }
            TransitionResult::Success(_) => {}
            TransitionResult::Invalid { from, event } => {
                warn!("[{}] Ignoring {:?} in state {}", self.family, event, from);
            }
        }
    }

    /// Events are best-effort; a slow consumer never stalls the loop
    fn emit(&self, event: ListenerEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            debug!("[{}] Listener event dropped: {}", self.family, e);
        }
    }
}
