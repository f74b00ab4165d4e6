//! Datagram transport.
//!
//! The tick never awaits on the network. [`UdpTransport`] runs a receive
//! task that forwards datagrams into a bounded mailbox; the tick drains it
//! with [`Transport::try_recv`] and sends with a non-blocking `try_send_to`.
//! A full mailbox drops the datagram (the protocol tolerates loss).

use std::{
    collections::VecDeque,
    io,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use anyhow::Context;
use bytes::Bytes;
use tokio::{
    net::UdpSocket,
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tracing::{debug, warn};

/// Largest datagram the receive task accepts.
pub const MAX_DATAGRAM: usize = 1500;

/// One inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub from: SocketAddr,
    pub bytes: Bytes,
}

/// Non-blocking datagram I/O as seen by the tick.
pub trait Transport: Send {
    /// Next queued datagram, if any. Never blocks.
    fn try_recv(&mut self) -> Option<Datagram>;

    /// Sends one datagram without blocking.
    fn send(&mut self, to: SocketAddr, bytes: &[u8]) -> io::Result<()>;
}

/// UDP socket with a background receive task.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    mailbox: mpsc::Receiver<Datagram>,
    dropped: Arc<AtomicU64>,
    recv_task: JoinHandle<()>,
}

impl UdpTransport {
    /// Binds the socket and starts the receive task.
    pub async fn bind(addr: SocketAddr, mailbox_capacity: usize) -> anyhow::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await.context("udp bind")?);
        let (tx, mailbox) = mpsc::channel(mailbox_capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let recv_task = tokio::spawn(recv_loop(socket.clone(), tx, dropped.clone()));
        Ok(Self {
            socket,
            mailbox,
            dropped,
            recv_task,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Datagrams discarded because the mailbox was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

async fn recv_loop(socket: Arc<UdpSocket>, tx: mpsc::Sender<Datagram>, dropped: Arc<AtomicU64>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (n, from) = match socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                // ICMP port-unreachable from a vanished client surfaces here
                // on some platforms; the socket itself is still usable.
                debug!(error = %e, "udp recv");
                continue;
            }
        };
        let datagram = Datagram {
            from,
            bytes: Bytes::copy_from_slice(&buf[..n]),
        };
        match tx.try_send(datagram) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(%from, total, "Mailbox full, dropping datagram");
            }
            Err(TrySendError::Closed(_)) => break,
        }
    }
}

impl Transport for UdpTransport {
    fn try_recv(&mut self) -> Option<Datagram> {
        self.mailbox.try_recv().ok()
    }

    fn send(&mut self, to: SocketAddr, bytes: &[u8]) -> io::Result<()> {
        self.socket.try_send_to(bytes, to).map(|_| ())
    }
}

/// In-process transport for tests: inject inbound datagrams, inspect what
/// the server sent.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: VecDeque<Datagram>,
    sent: Vec<(SocketAddr, Bytes)>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, from: SocketAddr, bytes: impl Into<Bytes>) {
        self.inbound.push_back(Datagram {
            from,
            bytes: bytes.into(),
        });
    }

    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    /// Takes everything sent since the last call, in send order.
    pub fn take_sent(&mut self) -> Vec<(SocketAddr, Bytes)> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for MemoryTransport {
    fn try_recv(&mut self) -> Option<Datagram> {
        self.inbound.pop_front()
    }

    fn send(&mut self, to: SocketAddr, bytes: &[u8]) -> io::Result<()> {
        self.sent.push((to, Bytes::copy_from_slice(bytes)));
        Ok(())
    }
}
