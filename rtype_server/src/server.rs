//! Server tick loop.
//!
//! Every tick runs the same phases in the same order:
//! - Drain the mailbox (bounded by count and time), decode, dispatch
//! - Send unicast replies queued by handlers
//! - Step the simulation with a fixed `dt`
//! - Broadcast the tick's events to every session
//! - Expire silent sessions
//! - Sweep destroyed entities and check for game over
//!
//! Determinism notes:
//! - `dt` never depends on wall-clock time; only session expiry does.
//! - Sessions are iterated in player id order.
//! - Bad input is logged and dropped; it never stops the tick.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Instant,
};

use anyhow::Context;
use rtype_shared::{
    codec::stamp_sequence,
    config::GameConfig,
    packet::{Message, Packet},
    resources::GamePhase,
};
use tracing::{debug, info, trace, warn};

use crate::{
    dispatch::{Dispatcher, Outbound, SessionContext},
    game::Game,
    session::Sessions,
    transport::{Transport, UdpTransport},
};

/// What one tick did. Mostly for tests and trace logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub received: usize,
    pub malformed: usize,
    pub rejected: usize,
    pub unicast: usize,
    pub events: usize,
    pub sent: usize,
    pub send_failures: usize,
    pub expired: usize,
    pub faults: usize,
}

/// Authoritative game server.
pub struct GameServer<T: Transport = UdpTransport> {
    cfg: GameConfig,
    transport: T,
    dispatcher: Dispatcher,
    game: Game,
    sessions: Sessions,
    tick: u64,
}

impl<T: Transport> GameServer<T> {
    pub fn with_transport(cfg: GameConfig, transport: T) -> Self {
        Self {
            game: Game::new(cfg.gameplay.clone()),
            cfg,
            transport,
            dispatcher: Dispatcher::new(),
            sessions: Sessions::new(),
            tick: 0,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.cfg
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut Game {
        &mut self.game
    }

    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Executes one fixed simulation tick. `now` only drives session
    /// liveness and the inbound time budget.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };
        let outbox = self.receive(now, &mut report);
        self.send_unicast(outbox, &mut report);

        report.faults = self.game.step(self.cfg.tick_duration().as_secs_f32());
        self.broadcast(&mut report);

        for session in self.sessions.expire(now, self.cfg.heartbeat_timeout()) {
            info!(
                player_id = session.player_id,
                endpoint = %session.endpoint,
                "Session timed out"
            );
            self.game.remove_player(session.entity, session.player_id);
            report.expired += 1;
        }

        self.game.maintain();
        self.game.check_game_over();
        if self.game.phase() == GamePhase::Ended && self.sessions.is_empty() {
            info!("All players gone, resetting game");
            self.game.reset();
        }

        self.tick += 1;
        trace!(?report, "Tick");
        report
    }

    fn receive(&mut self, now: Instant, report: &mut TickReport) -> Vec<Outbound> {
        let started = Instant::now();
        let budget = self.cfg.inbound_budget();
        let mut outbox = Vec::new();

        while report.received < self.cfg.max_packets_per_tick {
            if report.received > 0 && started.elapsed() >= budget {
                debug!(received = report.received, "Inbound budget spent");
                break;
            }
            let Some(datagram) = self.transport.try_recv() else {
                break;
            };
            report.received += 1;

            let packet = match Packet::decode(&datagram.bytes) {
                Ok(p) => p,
                Err(e) => {
                    debug!(from = %datagram.from, error = %e, "Dropping malformed packet");
                    report.malformed += 1;
                    continue;
                }
            };

            let mut ctx = SessionContext {
                endpoint: datagram.from,
                now,
                max_clients: self.cfg.max_clients,
                sessions: &mut self.sessions,
                outbox: &mut outbox,
            };
            match self.dispatcher.dispatch(&packet, &mut self.game, &mut ctx) {
                Ok(()) => {
                    if let Some(session) = self.sessions.get_mut(&datagram.from) {
                        session.touch(now, packet.sequence);
                    }
                }
                Err(e) => {
                    debug!(
                        from = %datagram.from,
                        kind = %packet.packet_type(),
                        error = %e,
                        "Packet rejected"
                    );
                    report.rejected += 1;
                }
            }
        }
        outbox
    }

    fn send_unicast(&mut self, outbox: Vec<Outbound>, report: &mut TickReport) {
        for Outbound { to, message } in outbox {
            let Some(session) = self.sessions.get_mut(&to) else {
                continue;
            };
            let bytes = Packet::new(session.next_sequence(), message).encode();
            report.unicast += 1;
            if let Err(e) = self.transport.send(to, &bytes) {
                warn!(%to, error = %e, "Unicast send failed");
                report.send_failures += 1;
            }
        }
    }

    /// Encodes each event once and restamps the sequence per recipient.
    fn broadcast(&mut self, report: &mut TickReport) {
        let events = self.game.drain_events();
        report.events = events.len();
        let mut buf = Vec::new();

        for event in &events {
            let message: Message = event.to_message();
            buf.clear();
            buf.extend_from_slice(&Packet::from(message).encode());

            for session in self.sessions.iter_mut() {
                stamp_sequence(&mut buf, session.next_sequence());
                match self.transport.send(session.endpoint, &buf) {
                    Ok(()) => report.sent += 1,
                    Err(e) => {
                        warn!(to = %session.endpoint, error = %e, "Broadcast send failed");
                        report.send_failures += 1;
                    }
                }
            }
        }
    }

    /// Runs a fixed number of ticks at the configured rate.
    pub async fn run_for_ticks(&mut self, ticks: u32) -> anyhow::Result<()> {
        let dt = self.cfg.tick_duration();
        let mut next = tokio::time::Instant::now();

        for _ in 0..ticks {
            next += dt;
            self.tick(Instant::now());
            tokio::time::sleep_until(next).await;
        }
        Ok(())
    }

    /// Runs until the task is cancelled.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let dt = self.cfg.tick_duration();
        let mut next = tokio::time::Instant::now();

        loop {
            next += dt;
            let report = self.tick(Instant::now());
            if report.faults > 0 {
                debug!(tick = report.tick, faults = report.faults, "Systems faulted");
            }
            tokio::time::sleep_until(next).await;
        }
    }
}

impl GameServer<UdpTransport> {
    /// Binds the UDP socket named by `cfg.server_addr`.
    pub async fn bind(cfg: GameConfig) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        let transport = UdpTransport::bind(addr, cfg.mailbox_capacity).await?;
        Ok(Self::with_transport(cfg, transport))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.transport.local_addr()
    }
}

/// Helper for tests: bind to an ephemeral port.
pub async fn bind_ephemeral(tick_hz: u32) -> anyhow::Result<(GameServer, GameConfig)> {
    let mut cfg = GameConfig {
        server_addr: format!("{}:{}", IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        tick_hz,
        ..Default::default()
    };
    let mut server = GameServer::bind(cfg.clone()).await?;
    cfg.server_addr = server.local_addr()?.to_string();
    server.cfg.server_addr = cfg.server_addr.clone();
    Ok((server, cfg))
}
