//! Packet dispatch.
//!
//! A table from [`PacketType`] to a plain handler function. Only
//! client-to-server types are registered; anything else from a client is
//! rejected. Handlers run synchronously inside the tick, mutate the [`Game`]
//! and the session registry, and may queue unicast replies.

use std::{collections::HashMap, net::SocketAddr, time::Instant};

use thiserror::Error;
use tracing::info;

use rtype_shared::{
    components::PendingInput,
    ecs::EntityId,
    event::GameEvent,
    math::Vec2,
    packet::{Flow, Heartbeat, Message, Packet, PacketType, ProjectileType},
    resources::GamePhase,
};

use crate::{
    game::Game,
    session::{Session, Sessions},
};

/// Why a well-formed packet was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectedPacket {
    #[error("{0} is not accepted from clients")]
    WrongDirection(PacketType),
    #[error("no session for this endpoint")]
    UnknownSession,
    #[error("player {0} has no live ship")]
    NoLiveEntity(u32),
    #[error("weapon cooling down")]
    Cooldown,
    #[error("server full ({0} players)")]
    ServerFull(usize),
    #[error("packet claims player {claimed}, session is player {actual}")]
    PlayerIdMismatch { claimed: u32, actual: u32 },
    #[error("{0:?} projectiles cannot be fired by players")]
    ForbiddenProjectile(ProjectileType),
    #[error("game over, waiting for all players to leave")]
    GameOver,
}

/// Reply addressed to one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub to: SocketAddr,
    pub message: Message,
}

/// Per-packet view of the server state a handler may touch besides the game.
pub struct SessionContext<'a> {
    pub endpoint: SocketAddr,
    pub now: Instant,
    pub max_clients: usize,
    pub sessions: &'a mut Sessions,
    pub outbox: &'a mut Vec<Outbound>,
}

impl SessionContext<'_> {
    fn session(&mut self) -> Result<&mut Session, RejectedPacket> {
        self.sessions
            .get_mut(&self.endpoint)
            .ok_or(RejectedPacket::UnknownSession)
    }

    fn reply(&mut self, message: Message) {
        self.outbox.push(Outbound {
            to: self.endpoint,
            message,
        });
    }
}

pub type Handler = fn(&Packet, &mut Game, &mut SessionContext<'_>) -> Result<(), RejectedPacket>;

pub struct Dispatcher {
    handlers: HashMap<PacketType, Handler>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let mut d = Self {
            handlers: HashMap::new(),
        };
        d.register(PacketType::PlayerInfo, on_player_info);
        d.register(PacketType::Position, on_position);
        d.register(PacketType::PlayerInput, on_player_input);
        d.register(PacketType::PlayerShoot, on_player_shoot);
        d.register(PacketType::Heartbeat, on_heartbeat);
        d.register(PacketType::PlayerDisconnect, on_player_disconnect);
        d.register(PacketType::ChatMessage, on_chat);
        d
    }

    /// Registers a handler. Server-to-client types cannot be registered.
    pub fn register(&mut self, kind: PacketType, handler: Handler) {
        if kind.flow() != Flow::ToClient {
            self.handlers.insert(kind, handler);
        }
    }

    pub fn handles(&self, kind: PacketType) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Routes one decoded packet to its handler.
    pub fn dispatch(
        &self,
        packet: &Packet,
        game: &mut Game,
        ctx: &mut SessionContext<'_>,
    ) -> Result<(), RejectedPacket> {
        let kind = packet.packet_type();
        let handler = self
            .handlers
            .get(&kind)
            .ok_or(RejectedPacket::WrongDirection(kind))?;
        handler(packet, game, ctx)
    }
}

fn live_entity(
    game: &Game,
    ctx: &mut SessionContext<'_>,
) -> Result<(EntityId, u32), RejectedPacket> {
    let session = ctx.session()?;
    let player_id = session.player_id;
    session
        .entity
        .filter(|e| game.is_alive(*e))
        .map(|e| (e, player_id))
        .ok_or(RejectedPacket::NoLiveEntity(player_id))
}

/// Lowest spawn lane not held by a living ship.
fn free_lane(game: &Game, sessions: &Sessions, lanes: usize) -> usize {
    let taken: Vec<usize> = sessions
        .iter()
        .filter(|s| s.entity.is_some_and(|e| game.is_alive(e)))
        .map(|s| s.lane)
        .collect();
    (0..lanes).find(|lane| !taken.contains(lane)).unwrap_or(0)
}

fn on_player_info(
    packet: &Packet,
    game: &mut Game,
    ctx: &mut SessionContext<'_>,
) -> Result<(), RejectedPacket> {
    let Message::PlayerInfo(info) = packet.message else {
        return Ok(());
    };

    // A repeated join means our id echo may have been lost: answer again.
    if let Ok(session) = ctx.session() {
        session.name = info.name;
        let (entity, player_id) = (session.entity, session.player_id);
        info!(player_id, name = %info.name, "Player rejoined from known endpoint");
        game.rename_player(entity, info.name);
        ctx.reply(Message::Heartbeat(Heartbeat { player_id }));
        for message in game.snapshot_for(player_id) {
            ctx.reply(message);
        }
        return Ok(());
    }

    if ctx.sessions.len() >= ctx.max_clients {
        return Err(RejectedPacket::ServerFull(ctx.max_clients));
    }
    if game.phase() == GamePhase::Ended {
        return Err(RejectedPacket::GameOver);
    }

    let lane = free_lane(game, ctx.sessions, ctx.max_clients);
    let (entity, player_id) = game.spawn_player(info.name, lane, ctx.max_clients);
    let mut session = Session::new(ctx.endpoint, player_id, info.name, ctx.now);
    session.entity = Some(entity);
    session.lane = lane;
    session.last_inbound_sequence = Some(packet.sequence);
    ctx.sessions.insert(session);
    info!(player_id, endpoint = %ctx.endpoint, name = %info.name, "Player joined");

    game.start_if_idle();

    ctx.reply(Message::Heartbeat(Heartbeat { player_id }));
    for message in game.snapshot_for(player_id) {
        ctx.reply(message);
    }
    Ok(())
}

fn on_position(
    packet: &Packet,
    game: &mut Game,
    ctx: &mut SessionContext<'_>,
) -> Result<(), RejectedPacket> {
    let Message::Position(pos) = packet.message else {
        return Ok(());
    };
    let (entity, _) = live_entity(game, ctx)?;
    if let Some(input) = game.world_mut().get_mut::<PendingInput>(entity) {
        input.target = Some(Vec2::new(pos.x.to_f32(), pos.y.to_f32()));
    }
    Ok(())
}

fn on_player_input(
    packet: &Packet,
    game: &mut Game,
    ctx: &mut SessionContext<'_>,
) -> Result<(), RejectedPacket> {
    let Message::PlayerInput(input) = packet.message else {
        return Ok(());
    };
    let (entity, _) = live_entity(game, ctx)?;
    if let Some(pending) = game.world_mut().get_mut::<PendingInput>(entity) {
        pending.push_direction(input.direction);
    }
    Ok(())
}

fn on_player_shoot(
    packet: &Packet,
    game: &mut Game,
    ctx: &mut SessionContext<'_>,
) -> Result<(), RejectedPacket> {
    let Message::PlayerShoot(shot) = packet.message else {
        return Ok(());
    };
    let (entity, player_id) = live_entity(game, ctx)?;
    if shot.projectile_type != ProjectileType::PlayerBasic {
        return Err(RejectedPacket::ForbiddenProjectile(shot.projectile_type));
    }
    game.fire_player_shot(entity, player_id)
        .map(|_| ())
        .ok_or(RejectedPacket::Cooldown)
}

fn on_heartbeat(
    packet: &Packet,
    _game: &mut Game,
    ctx: &mut SessionContext<'_>,
) -> Result<(), RejectedPacket> {
    let Message::Heartbeat(hb) = packet.message else {
        return Ok(());
    };
    let actual = ctx.session()?.player_id;
    if hb.player_id != actual {
        return Err(RejectedPacket::PlayerIdMismatch {
            claimed: hb.player_id,
            actual,
        });
    }
    Ok(())
}

fn on_player_disconnect(
    packet: &Packet,
    game: &mut Game,
    ctx: &mut SessionContext<'_>,
) -> Result<(), RejectedPacket> {
    let Message::PlayerDisconnect(bye) = packet.message else {
        return Ok(());
    };
    let actual = ctx.session()?.player_id;
    if bye.player_id != actual {
        return Err(RejectedPacket::PlayerIdMismatch {
            claimed: bye.player_id,
            actual,
        });
    }
    if let Some(session) = ctx.sessions.remove(&ctx.endpoint) {
        info!(player_id = session.player_id, endpoint = %ctx.endpoint, "Player left");
        game.remove_player(session.entity, session.player_id);
    }
    Ok(())
}

fn on_chat(
    packet: &Packet,
    game: &mut Game,
    ctx: &mut SessionContext<'_>,
) -> Result<(), RejectedPacket> {
    let Message::ChatMessage(chat) = packet.message else {
        return Ok(());
    };
    let player_id = ctx.session()?.player_id;
    game.events_mut().push(GameEvent::ChatPosted {
        player_id,
        timestamp: chat.timestamp,
        text: chat.text,
    });
    Ok(())
}
