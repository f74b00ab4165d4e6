//! Server-side simulation state.
//!
//! [`Game`] owns the world, the event queue and the system schedule. The
//! tick loop and the dispatch handlers mutate it; nothing else does.

use std::collections::HashSet;

use rtype_shared::{
    components::{Enemy, Health, Player, Position, Projectile, ShootCooldown, Speed, Velocity},
    config::GameplayConfig,
    ecs::{EntityId, Schedule, World},
    event::{EventQueue, GameEvent, Lifecycle, ObjectRef},
    math::Vec2,
    packet::{
        EnemySpawn, EnemyType, Fixed, Message, NewPlayer, PlayerName, ProjectileSpawn,
        ProjectileType,
    },
    resources::{Clock, GamePhase, GameRng, IdAllocator, PlayField, Scoreboard},
    spawn::{spawn_enemy, spawn_player, spawn_projectile},
    systems::server_schedule,
};
use tracing::info;

pub struct Game {
    cfg: GameplayConfig,
    world: World,
    events: EventQueue,
    schedule: Schedule,
}

fn fresh_world(cfg: &GameplayConfig) -> World {
    let mut world = World::new();
    world.insert_resource(PlayField::new(
        cfg.field_width,
        cfg.field_height,
        cfg.field_margin,
    ));
    world.insert_resource(GameRng::seeded(cfg.rng_seed));
    world.insert_resource(IdAllocator::default());
    world.insert_resource(GamePhase::Idle);
    world.insert_resource(Scoreboard::default());
    world.insert_resource(Clock::default());
    world
}

fn fx(v: f32) -> Fixed {
    Fixed::from_f32(v)
}

impl Game {
    pub fn new(cfg: GameplayConfig) -> Self {
        Self {
            world: fresh_world(&cfg),
            events: EventQueue::new(),
            schedule: server_schedule(&cfg),
            cfg,
        }
    }

    /// Throws away all game state; the next join starts a new game.
    pub fn reset(&mut self) {
        *self = Self::new(self.cfg.clone());
    }

    pub fn config(&self) -> &GameplayConfig {
        &self.cfg
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    pub fn phase(&self) -> GamePhase {
        self.world
            .resource::<GamePhase>()
            .copied()
            .unwrap_or_default()
    }

    fn set_phase(&mut self, phase: GamePhase) {
        self.world.insert_resource(phase);
    }

    pub fn clock(&self) -> Clock {
        self.world.resource::<Clock>().copied().unwrap_or_default()
    }

    /// Runs every system once with a fixed step. Returns the fault count.
    pub fn step(&mut self, dt: f32) -> usize {
        let faults = self.schedule.run(&mut self.world, &mut self.events, dt);
        let clock = self.world.resources_mut().get_or_default::<Clock>();
        clock.tick += 1;
        clock.elapsed += dt;
        faults
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain()
    }

    /// End-of-tick sweep.
    pub fn maintain(&mut self) -> usize {
        self.world.maintain()
    }

    /// Spawns a joining player in lane `slot` of `slots`.
    pub fn spawn_player(&mut self, name: PlayerName, slot: usize, slots: usize) -> (EntityId, u32) {
        let lane = (slot % slots.max(1)) as f32 + 1.0;
        let y = self.cfg.field_height * lane / (slots.max(1) as f32 + 1.0);
        let at = Vec2::new(self.cfg.player_spawn_x, y);
        spawn_player(&mut self.world, &mut self.events, &self.cfg, name, at)
    }

    pub fn spawn_enemy(&mut self, kind: EnemyType, at: Vec2) -> (EntityId, u32) {
        spawn_enemy(&mut self.world, &mut self.events, &self.cfg, kind, at)
    }

    /// Starts the game on first join.
    pub fn start_if_idle(&mut self) {
        if self.phase() != GamePhase::Idle {
            return;
        }
        self.set_phase(GamePhase::Running);
        let player_count = self.living_players() as u32;
        info!(player_count, "Game started");
        self.events.push(GameEvent::GameStarted { player_count });
    }

    pub fn rename_player(&mut self, entity: Option<EntityId>, name: PlayerName) {
        if let Some(player) = entity.and_then(|e| self.world.get_mut::<Player>(e)) {
            player.name = name;
        }
    }

    /// Despawns a leaving player and queues exactly one
    /// `PlayerDisconnected`.
    pub fn remove_player(&mut self, entity: Option<EntityId>, player_id: u32) {
        if let Some(e) = entity {
            self.world.destroy_entity(e);
        }
        self.events
            .push(GameEvent::PlayerDisconnected { player_id });
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.world.is_alive(entity)
    }

    pub fn living_players(&self) -> usize {
        self.world
            .query::<Player>()
            .filter(|(e, _)| self.world.is_alive(*e))
            .count()
    }

    /// Ends a running game with no living players. Returns `true` when the
    /// game ended now.
    pub fn check_game_over(&mut self) -> bool {
        if self.phase() != GamePhase::Running || self.living_players() > 0 {
            return false;
        }
        self.set_phase(GamePhase::Ended);
        let total_score = self
            .world
            .resource::<Scoreboard>()
            .map_or(0, |s| s.total);
        info!(total_score, "Game over");
        self.events.push(GameEvent::GameEnded { total_score });
        true
    }

    /// Fires a player shot from the ship's authoritative position. Returns
    /// the projectile id, or `None` while the weapon is cooling down.
    pub fn fire_player_shot(&mut self, entity: EntityId, owner_id: u32) -> Option<u32> {
        let fired = self
            .world
            .get_mut::<ShootCooldown>(entity)
            .is_some_and(|c| c.try_fire());
        if !fired {
            return None;
        }
        let at = self.world.get::<Position>(entity)?.0;
        let (_, id) = spawn_projectile(
            &mut self.world,
            &mut self.events,
            &self.cfg,
            ProjectileType::PlayerBasic,
            owner_id,
            at,
        );
        Some(id)
    }

    /// Messages that bring a late joiner up to date: every other living
    /// player, every live enemy and every projectile in flight.
    ///
    /// Objects whose spawn event is still queued are left out; the joiner
    /// receives those in this tick's broadcast.
    pub fn snapshot_for(&self, joiner: u32) -> Vec<Message> {
        let w = &self.world;
        let pos = |e: EntityId| w.get::<Position>(e).map_or(Vec2::ZERO, |p| p.0);
        let vel = |e: EntityId| w.get::<Velocity>(e).map_or(Vec2::ZERO, |v| v.0);
        let queued: HashSet<ObjectRef> = self
            .events
            .iter()
            .filter_map(GameEvent::lifecycle)
            .filter(|(_, stage)| *stage == Lifecycle::Spawn)
            .map(|(object, _)| object)
            .collect();
        let mut out = Vec::new();

        for (e, player) in w.query::<Player>() {
            if !w.is_alive(e)
                || player.player_id == joiner
                || queued.contains(&ObjectRef::Player(player.player_id))
            {
                continue;
            }
            let p = pos(e);
            out.push(Message::NewPlayer(NewPlayer {
                player_id: player.player_id,
                x: fx(p.x),
                y: fx(p.y),
                speed: fx(w.get::<Speed>(e).map_or(self.cfg.player_speed, |s| s.0)),
                max_health: w.get::<Health>(e).map_or(self.cfg.player_max_health, |h| h.max),
            }));
        }
        for (e, enemy) in w.query::<Enemy>() {
            if !w.is_alive(e) || queued.contains(&ObjectRef::Enemy(enemy.enemy_id)) {
                continue;
            }
            let (p, v) = (pos(e), vel(e));
            let health = w
                .get::<Health>(e)
                .copied()
                .unwrap_or_else(|| Health::full(self.cfg.enemy_max_health));
            out.push(Message::EnemySpawn(EnemySpawn {
                enemy_id: enemy.enemy_id,
                enemy_type: enemy.kind,
                x: fx(p.x),
                y: fx(p.y),
                vx: fx(v.x),
                vy: fx(v.y),
                health: health.current,
                max_health: health.max,
            }));
        }
        for (e, shot) in w.query::<Projectile>() {
            if !w.is_alive(e) || queued.contains(&ObjectRef::Projectile(shot.projectile_id))
            {
                continue;
            }
            let (p, v) = (pos(e), vel(e));
            out.push(Message::ProjectileSpawn(ProjectileSpawn {
                projectile_id: shot.projectile_id,
                projectile_type: shot.kind,
                owner_id: shot.owner_id,
                hostile: shot.hostile,
                x: fx(p.x),
                y: fx(p.y),
                vx: fx(v.x),
                vy: fx(v.y),
                damage: shot.damage,
            }));
        }
        out
    }
}
