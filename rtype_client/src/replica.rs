//! Client replica.
//!
//! A local [`World`] mirrored from decoded server messages. The server is
//! authoritative; the replica only:
//! - spawns and despawns objects by network id
//! - attaches sprites, animations and render layers for a renderer to read
//! - extrapolates enemies and projectiles along their last known velocity
//! - interpolates remote players between position updates
//!
//! No renderer is included; anything that can read a `World` can draw it.

use std::collections::HashMap;

use rtype_shared::{
    components::{
        Background, Enemy, Health, LocalPlayer, Player, Position, Projectile, RenderMeta, Score,
        Speed, Sprite, SpriteAnimation, Velocity,
    },
    config::GameplayConfig,
    ecs::{EntityId, Schedule, World},
    event::EventQueue,
    math::Vec2,
    packet::{Fixed, Message, PlayerName},
    resources::GamePhase,
    systems::client_schedule,
};
use tracing::{debug, info};

use crate::interp::PositionHistory;

const BACKGROUND_SCROLL: f32 = -50.0;
const HISTORY_LEN: usize = 16;

const LAYER_BACKGROUND: i32 = -10;
const LAYER_PROJECTILE: i32 = 1;
const LAYER_SHIP: i32 = 2;
const LAYER_EFFECT: i32 = 3;

/// One-shot explosion left where something died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Explosion;

/// A chat line as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub player_id: u32,
    pub timestamp: u32,
    pub text: String,
}

fn vec2(x: Fixed, y: Fixed) -> Vec2 {
    Vec2::new(x.to_f32(), y.to_f32())
}

pub struct Replica {
    world: World,
    events: EventQueue,
    schedule: Schedule,
    local_player: Option<u32>,
    players: HashMap<u32, EntityId>,
    enemies: HashMap<u32, EntityId>,
    projectiles: HashMap<u32, EntityId>,
    histories: HashMap<u32, PositionHistory>,
    phase: GamePhase,
    final_score: Option<u32>,
    chat: Vec<ChatLine>,
}

impl Replica {
    pub fn new(cfg: &GameplayConfig) -> Self {
        let mut world = World::new();
        for i in 0..2 {
            let tile = world.create_entity();
            world.insert(tile, Position(Vec2::new(cfg.field_width * i as f32, 0.0)));
            world.insert(
                tile,
                Background {
                    scroll_speed: BACKGROUND_SCROLL,
                    width: cfg.field_width,
                },
            );
            world.insert(
                tile,
                Sprite::new("background", cfg.field_width, cfg.field_height),
            );
            world.insert(
                tile,
                RenderMeta {
                    layer: LAYER_BACKGROUND,
                    visible: true,
                },
            );
        }

        Self {
            world,
            events: EventQueue::new(),
            schedule: client_schedule(),
            local_player: None,
            players: HashMap::new(),
            enemies: HashMap::new(),
            projectiles: HashMap::new(),
            histories: HashMap::new(),
            phase: GamePhase::Idle,
            final_score: None,
            chat: Vec::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Total score announced by `GameEnd`.
    pub fn final_score(&self) -> Option<u32> {
        self.final_score
    }

    pub fn chat(&self) -> &[ChatLine] {
        &self.chat
    }

    pub fn local_player(&self) -> Option<u32> {
        self.local_player
    }

    /// Tags our own ship, now or when it is spawned.
    pub fn set_local_player(&mut self, player_id: u32) {
        self.local_player = Some(player_id);
        self.histories.remove(&player_id);
        if let Some(&e) = self.players.get(&player_id) {
            self.world.insert(e, LocalPlayer);
        }
    }

    pub fn player(&self, player_id: u32) -> Option<EntityId> {
        self.players.get(&player_id).copied()
    }

    pub fn enemy(&self, enemy_id: u32) -> Option<EntityId> {
        self.enemies.get(&enemy_id).copied()
    }

    pub fn projectile(&self, projectile_id: u32) -> Option<EntityId> {
        self.projectiles.get(&projectile_id).copied()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn enemy_count(&self) -> usize {
        self.enemies.len()
    }

    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    pub fn position(&self, entity: EntityId) -> Option<Vec2> {
        self.world.get::<Position>(entity).map(|p| p.0)
    }

    /// Position of our own ship.
    pub fn local_position(&self) -> Option<Vec2> {
        let id = self.local_player?;
        self.position(self.player(id)?)
    }

    /// Applies one server message. `now` is the receive time in seconds.
    pub fn apply(&mut self, message: &Message, now: f64) {
        match *message {
            Message::NewPlayer(p) => {
                let at = vec2(p.x, p.y);
                let e = match self.players.get(&p.player_id) {
                    Some(&e) => e,
                    None => self.world.create_entity(),
                };
                self.world.insert(
                    e,
                    Player {
                        player_id: p.player_id,
                        name: PlayerName::default(),
                    },
                );
                self.world.insert(e, Position(at));
                self.world.insert(e, Speed(p.speed.to_f32()));
                self.world.insert(e, Health::full(p.max_health));
                self.world.insert(e, Score::default());
                self.world.insert(e, Sprite::new("player_ships", 33.0, 17.0));
                self.world.insert(e, SpriteAnimation::looping(5, 0, 4, 0.1));
                self.world.insert(
                    e,
                    RenderMeta {
                        layer: LAYER_SHIP,
                        visible: true,
                    },
                );
                if self.local_player == Some(p.player_id) {
                    self.world.insert(e, LocalPlayer);
                } else {
                    let mut history = PositionHistory::new(HISTORY_LEN);
                    history.push(now, at);
                    self.histories.insert(p.player_id, history);
                }
                self.players.insert(p.player_id, e);
                debug!(player_id = p.player_id, "Player appeared");
            }
            Message::PlayerMove(m) => {
                let Some(&e) = self.players.get(&m.player_id) else {
                    return;
                };
                let at = vec2(m.x, m.y);
                match self.histories.get_mut(&m.player_id) {
                    Some(history) => history.push(now, at),
                    None => self.world.insert(e, Position(at)),
                }
            }
            Message::PlayerHit(h) => {
                if let Some(health) = self
                    .players
                    .get(&h.player_id)
                    .and_then(|&e| self.world.get_mut::<Health>(e))
                {
                    health.current = h.health;
                }
            }
            Message::PlayerDeath(d) => {
                self.remove_player(d.player_id);
                self.explode(vec2(d.x, d.y));
            }
            Message::PlayerDisconnect(d) => self.remove_player(d.player_id),

            Message::EnemySpawn(s) => {
                let e = match self.enemies.get(&s.enemy_id) {
                    Some(&e) => e,
                    None => self.world.create_entity(),
                };
                self.world.insert(
                    e,
                    Enemy {
                        enemy_id: s.enemy_id,
                        kind: s.enemy_type,
                    },
                );
                self.world.insert(e, Position(vec2(s.x, s.y)));
                self.world.insert(e, Velocity(vec2(s.vx, s.vy)));
                self.world.insert(
                    e,
                    Health {
                        current: s.health,
                        max: s.max_health,
                    },
                );
                self.world.insert(e, Sprite::new("enemy_fighter", 33.0, 36.0));
                self.world.insert(e, SpriteAnimation::looping(8, 0, 7, 0.1));
                self.world.insert(
                    e,
                    RenderMeta {
                        layer: LAYER_SHIP,
                        visible: true,
                    },
                );
                self.enemies.insert(s.enemy_id, e);
            }
            Message::EnemyMove(m) => {
                if let Some(&e) = self.enemies.get(&m.enemy_id) {
                    self.world.insert(e, Position(vec2(m.x, m.y)));
                    self.world.insert(e, Velocity(vec2(m.vx, m.vy)));
                }
            }
            Message::EnemyHit(h) => {
                if let Some(health) = self
                    .enemies
                    .get(&h.enemy_id)
                    .and_then(|&e| self.world.get_mut::<Health>(e))
                {
                    health.current = h.health;
                }
            }
            Message::EnemyDeath(d) => {
                if let Some(e) = self.enemies.remove(&d.enemy_id) {
                    self.world.destroy_entity(e);
                }
                if let Some(score) = self
                    .players
                    .get(&d.killer_id)
                    .and_then(|&e| self.world.get_mut::<Score>(e))
                {
                    score.0 = score.0.saturating_add(d.score);
                }
                self.explode(vec2(d.x, d.y));
            }

            Message::ProjectileSpawn(s) => {
                let e = match self.projectiles.get(&s.projectile_id) {
                    Some(&e) => e,
                    None => self.world.create_entity(),
                };
                self.world.insert(
                    e,
                    Projectile {
                        projectile_id: s.projectile_id,
                        kind: s.projectile_type,
                        owner_id: s.owner_id,
                        damage: s.damage,
                        hostile: s.hostile,
                        lifetime: f32::INFINITY,
                    },
                );
                self.world.insert(e, Position(vec2(s.x, s.y)));
                self.world.insert(e, Velocity(vec2(s.vx, s.vy)));
                let texture = if s.hostile { "enemy_shot" } else { "player_shot" };
                self.world.insert(e, Sprite::new(texture, 16.0, 8.0));
                self.world.insert(
                    e,
                    RenderMeta {
                        layer: LAYER_PROJECTILE,
                        visible: true,
                    },
                );
                self.projectiles.insert(s.projectile_id, e);
            }
            Message::ProjectileHit(h) => self.remove_projectile(h.projectile_id),
            Message::ProjectileDestroy(d) => self.remove_projectile(d.projectile_id),

            Message::GameStart(g) => {
                info!(player_count = g.player_count, "Game started");
                self.phase = GamePhase::Running;
                self.final_score = None;
            }
            Message::GameEnd(g) => {
                info!(total_score = g.total_score, "Game over");
                self.phase = GamePhase::Ended;
                self.final_score = Some(g.total_score);
            }
            Message::ChatMessage(c) => {
                info!(player_id = c.player_id, text = %c.text, "Chat");
                self.chat.push(ChatLine {
                    player_id: c.player_id,
                    timestamp: c.timestamp,
                    text: c.text.as_str().to_owned(),
                });
            }

            Message::Heartbeat(_)
            | Message::PlayerInfo(_)
            | Message::Position(_)
            | Message::PlayerShoot(_)
            | Message::PlayerInput(_) => {}
        }
    }

    fn remove_player(&mut self, player_id: u32) {
        self.histories.remove(&player_id);
        if let Some(e) = self.players.remove(&player_id) {
            self.world.destroy_entity(e);
        }
    }

    fn remove_projectile(&mut self, projectile_id: u32) {
        if let Some(e) = self.projectiles.remove(&projectile_id) {
            self.world.destroy_entity(e);
        }
    }

    fn explode(&mut self, at: Vec2) {
        let e = self.world.create_entity();
        self.world.insert(e, Explosion);
        self.world.insert(e, Position(at));
        self.world.insert(e, Sprite::new("explosion", 32.0, 32.0));
        self.world.insert(e, SpriteAnimation::once(6, 0, 5, 0.08));
        self.world.insert(
            e,
            RenderMeta {
                layer: LAYER_EFFECT,
                visible: true,
            },
        );
    }

    /// Advances the local simulation by `dt` and places remote players at
    /// their interpolated positions for `now`.
    pub fn update(&mut self, now: f64, dt: f32) {
        self.schedule.run(&mut self.world, &mut self.events, dt);
        self.events.drain();

        for (player_id, history) in &self.histories {
            let Some(&e) = self.players.get(player_id) else {
                continue;
            };
            if let Some(at) = history.render_position(now) {
                self.world.insert(e, Position(at));
            }
        }

        for e in self.world.entities_with::<Explosion>() {
            let finished = self
                .world
                .get::<SpriteAnimation>(e)
                .map_or(true, |a| !a.playing);
            if finished {
                self.world.destroy_entity(e);
            }
        }
        self.world.maintain();
    }
}
