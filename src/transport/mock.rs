//! In-memory datagram transport for listener tests
//!
//! The test side (`MockPeer`) scripts inbound datagrams and receive errors,
//! collects replies, and can make the next binds or sends fail.

use crate::transport::traits::{DatagramBinder, DatagramSocket};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

enum Inbound {
    Datagram(Vec<u8>, SocketAddr),
    Error(io::ErrorKind),
}

#[derive(Default)]
struct Controls {
    fail_binds: AtomicUsize,
    fail_sends: AtomicUsize,
    binds: AtomicUsize,
}

/// Take one unit from a failure budget
fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Create a connected binder/peer pair
pub fn mock_network() -> (MockBinder, MockPeer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    let controls = Arc::new(Controls::default());

    let binder = MockBinder {
        inbound_rx: Arc::new(Mutex::new(inbound_rx)),
        reply_tx,
        controls: controls.clone(),
    };
    let peer = MockPeer {
        inbound_tx,
        reply_rx,
        controls,
    };
    (binder, peer)
}

pub struct MockBinder {
    inbound_rx: Arc<Mutex<mpsc::UnboundedReceiver<Inbound>>>,
    reply_tx: mpsc::UnboundedSender<(Vec<u8>, SocketAddr)>,
    controls: Arc<Controls>,
}

#[async_trait]
impl DatagramBinder for MockBinder {
    type Socket = MockSocket;

    async fn bind(&self, addr: SocketAddr) -> Result<Self::Socket> {
        if take_failure(&self.controls.fail_binds) {
            return Err(anyhow!("Address already in use: {}", addr));
        }
        self.controls.binds.fetch_add(1, Ordering::SeqCst);
        Ok(MockSocket {
            local_addr: addr,
            inbound_rx: self.inbound_rx.clone(),
            reply_tx: self.reply_tx.clone(),
            controls: self.controls.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "Mock"
    }
}

pub struct MockSocket {
    local_addr: SocketAddr,
    inbound_rx: Arc<Mutex<mpsc::UnboundedReceiver<Inbound>>>,
    reply_tx: mpsc::UnboundedSender<(Vec<u8>, SocketAddr)>,
    controls: Arc<Controls>,
}

#[async_trait]
impl DatagramSocket for MockSocket {
    async fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let next = self.inbound_rx.lock().await.recv().await;
        match next {
            Some(Inbound::Datagram(bytes, from)) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok((len, from))
            }
            Some(Inbound::Error(kind)) => Err(io::Error::new(kind, "injected receive error")),
            None => std::future::pending::<io::Result<(usize, SocketAddr)>>().await,
        }
    }

    async fn send_to(&mut self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        if take_failure(&self.controls.fail_sends) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "injected send error",
            ));
        }
        let _ = self.reply_tx.send((buf.to_vec(), target));
        Ok(buf.len())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

/// Test-side handle of the mock network
pub struct MockPeer {
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    reply_rx: mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>,
    controls: Arc<Controls>,
}

impl MockPeer {
    /// Queue a datagram from `from`
    pub fn send(&self, bytes: &[u8], from: SocketAddr) {
        let _ = self.inbound_tx.send(Inbound::Datagram(bytes.to_vec(), from));
    }

    /// Queue a receive error
    pub fn inject_recv_error(&self, kind: io::ErrorKind) {
        let _ = self.inbound_tx.send(Inbound::Error(kind));
    }

    /// Make the next `n` binds fail
    pub fn fail_next_binds(&self, n: usize) {
        self.controls.fail_binds.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` sends fail
    pub fn fail_next_sends(&self, n: usize) {
        self.controls.fail_sends.store(n, Ordering::SeqCst);
    }

    /// Number of successful binds so far
    pub fn bind_count(&self) -> usize {
        self.controls.binds.load(Ordering::SeqCst)
    }

    /// Wait up to a second for the next reply
    pub async fn next_reply(&mut self) -> Option<(Vec<u8>, SocketAddr)> {
        tokio::time::timeout(Duration::from_secs(1), self.reply_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Wait briefly and return a reply only if one shows up
    pub async fn try_reply(&mut self, wait: Duration) -> Option<(Vec<u8>, SocketAddr)> {
        tokio::time::timeout(wait, self.reply_rx.recv())
            .await
            .ok()
            .flatten()
    }
}
