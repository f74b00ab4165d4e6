//! Client implementation.
//!
//! The client maintains:
//! - One UDP socket connected to the server
//! - The join handshake (`PlayerInfo` out, `Heartbeat` with our id back)
//! - An outbound sequence counter
//! - A [`Replica`] fed by every decoded server packet
//!
//! Malformed datagrams from the server are logged and skipped, never fatal.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::{Duration, Instant},
};

use anyhow::Context;
use chrono::Utc;
use rtype_shared::{
    config::GameConfig,
    packet::{
        ChatMessage, ChatText, Fixed, Heartbeat, Message, Packet, PlayerDisconnect, PlayerInfo,
        PlayerName, PositionUpdate,
    },
};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::{
    input::{build_commands, InputState},
    replica::Replica,
};

/// How long one join attempt waits for the server's id echo.
const JOIN_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(500);
const JOIN_ATTEMPTS: u32 = 6;

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Joined, ship alive or waiting for it.
    Playing,
    /// Our ship was destroyed; still receiving updates.
    Dead,
    /// Left, or the server said we are gone.
    Disconnected,
}

/// High-level game client.
pub struct GameClient {
    pub player_id: u32,
    pub state: ClientState,
    pub replica: Replica,

    socket: UdpSocket,
    server: SocketAddr,
    sequence: u32,
    started: Instant,
}

impl GameClient {
    /// Connects to `cfg.server_addr` and joins as `cfg.player_name`.
    pub async fn connect(cfg: &GameConfig) -> anyhow::Result<Self> {
        let server: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        info!(%server, name = %cfg.player_name, "Connecting to server");

        let bind = match server.ip() {
            IpAddr::V4(ip) if ip.is_loopback() => {
                SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            }
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => "[::]:0".parse().context("parse bind addr")?,
        };
        let socket = UdpSocket::bind(bind).await.context("udp bind")?;
        socket.connect(server).await.context("udp connect")?;

        let mut client = Self {
            player_id: 0,
            state: ClientState::Playing,
            replica: Replica::new(&cfg.gameplay),
            socket,
            server,
            sequence: 0,
            started: Instant::now(),
        };
        client.join(PlayerName::new(&cfg.player_name)).await?;
        Ok(client)
    }

    /// Sends `PlayerInfo` until the server echoes a `Heartbeat` with our id.
    /// Packets that arrive before the echo are kept and applied after it.
    async fn join(&mut self, name: PlayerName) -> anyhow::Result<()> {
        let mut early = Vec::new();
        for attempt in 1..=JOIN_ATTEMPTS {
            self.send(Message::PlayerInfo(PlayerInfo { name })).await?;
            let deadline = Instant::now() + JOIN_ATTEMPT_TIMEOUT;

            while let Some(left) = deadline.checked_duration_since(Instant::now()) {
                let Some(packet) = self.recv_timeout(left).await? else {
                    break;
                };
                if let Message::Heartbeat(Heartbeat { player_id }) = packet.message {
                    self.player_id = player_id;
                    self.replica.set_local_player(player_id);
                    info!(player_id, attempt, "Joined game");
                    let now = self.clock();
                    for message in early {
                        self.replica.apply(&message, now);
                    }
                    return Ok(());
                }
                early.push(packet.message);
            }
            debug!(attempt, "No join reply yet");
        }
        anyhow::bail!("server {} did not answer the join", self.server)
    }

    /// Seconds since the client started.
    pub fn clock(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Encodes and sends one message with the next sequence number.
    pub async fn send(&mut self, message: Message) -> anyhow::Result<()> {
        let packet = Packet::new(self.sequence, message);
        self.sequence = self.sequence.wrapping_add(1);
        self.socket
            .send(&packet.encode())
            .await
            .with_context(|| format!("send {}", packet.packet_type()))?;
        Ok(())
    }

    /// Sends the packets for one frame of input.
    pub async fn send_input(&mut self, input: InputState) -> anyhow::Result<()> {
        let at = self.replica.local_position().unwrap_or_default();
        for message in build_commands(input, at) {
            self.send(message).await?;
        }
        Ok(())
    }

    /// Reports an absolute position for our ship.
    pub async fn send_position(&mut self, x: f32, y: f32) -> anyhow::Result<()> {
        self.send(Message::Position(PositionUpdate {
            x: Fixed::from_f32(x),
            y: Fixed::from_f32(y),
        }))
        .await
    }

    pub async fn heartbeat(&mut self) -> anyhow::Result<()> {
        let player_id = self.player_id;
        self.send(Message::Heartbeat(Heartbeat { player_id })).await
    }

    /// Sends a chat line stamped with the current wall clock.
    pub async fn say(&mut self, text: &str) -> anyhow::Result<()> {
        let timestamp = u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX);
        let player_id = self.player_id;
        self.send(Message::ChatMessage(ChatMessage {
            player_id,
            timestamp,
            text: ChatText::new(text),
        }))
        .await
    }

    /// Leaves the game.
    pub async fn disconnect(&mut self) -> anyhow::Result<()> {
        let player_id = self.player_id;
        self.send(Message::PlayerDisconnect(PlayerDisconnect { player_id }))
            .await?;
        self.state = ClientState::Disconnected;
        info!(player_id, "Disconnected");
        Ok(())
    }

    /// Waits up to `timeout` for one packet. Malformed datagrams are skipped.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> anyhow::Result<Option<Packet>> {
        let mut buf = [0u8; 1500];
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let n = match tokio::time::timeout_at(deadline, self.socket.recv(&mut buf)).await {
                Ok(res) => res.context("udp recv")?,
                Err(_) => return Ok(None),
            };
            match Packet::decode(&buf[..n]) {
                Ok(packet) => return Ok(Some(packet)),
                Err(e) => debug!(error = %e, "Dropping malformed packet from server"),
            }
        }
    }

    /// Receives for up to `timeout` and applies everything to the replica.
    /// Returns the decoded packets in arrival order.
    pub async fn poll(&mut self, timeout: Duration) -> anyhow::Result<Vec<Packet>> {
        let mut got = Vec::new();
        let deadline = Instant::now() + timeout;
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            let Some(packet) = self.recv_timeout(left).await? else {
                break;
            };
            self.observe(&packet.message);
            let now = self.clock();
            self.replica.apply(&packet.message, now);
            got.push(packet);
        }
        Ok(got)
    }

    fn observe(&mut self, message: &Message) {
        let me = self.player_id;
        match *message {
            Message::PlayerDeath(d) if d.player_id == me => {
                info!(player_id = me, "Our ship was destroyed");
                self.state = ClientState::Dead;
            }
            Message::PlayerDisconnect(d) if d.player_id == me => {
                self.state = ClientState::Disconnected;
            }
            _ => {}
        }
    }

    /// Advances the replica by one frame.
    pub fn update(&mut self, dt: f32) {
        let now = self.clock();
        self.replica.update(now, dt);
    }
}
