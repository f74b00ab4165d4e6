//! Gameplay systems.
//!
//! Server order (see [`server_schedule`]): input, enemies, movement,
//! projectile lifetime, collision, boundary, replication. The client replica
//! runs movement for extrapolation plus animation and background scrolling.

use rand::Rng;
use tracing::warn;

use crate::{
    collision::CollisionSystem,
    components::{
        Background, Collider, Enemy, PendingInput, Player, Position, Projectile, ShootCooldown,
        Speed, Sprite, SpriteAnimation, Velocity,
    },
    config::GameplayConfig,
    ecs::{EntityId, Schedule, System, SystemFault, World},
    event::{EventQueue, GameEvent},
    math::Vec2,
    packet::{EnemyType, ProjectileType},
    resources::{GamePhase, GameRng, PlayField},
    spawn::{spawn_enemy, spawn_projectile},
};

fn play_field(world: &World) -> Result<PlayField, SystemFault> {
    world
        .resource::<PlayField>()
        .copied()
        .ok_or_else(SystemFault::missing::<PlayField>)
}

fn position_of(world: &World, e: EntityId) -> Vec2 {
    world.get::<Position>(e).map_or(Vec2::ZERO, |p| p.0)
}

/// Applies queued movement requests to player positions and recharges
/// player weapons.
///
/// The last absolute position reported this tick wins; each queued
/// direction then moves the ship by `speed * dt`. The result is clamped to
/// the play field.
#[derive(Debug, Default)]
pub struct InputSystem;

impl System for InputSystem {
    fn name(&self) -> &'static str {
        "input"
    }

    fn run(&mut self, world: &mut World, _: &mut EventQueue, dt: f32) -> Result<(), SystemFault> {
        let field = play_field(world)?;
        for e in world.entities_with::<PendingInput>() {
            if !world.is_alive(e) {
                continue;
            }
            if let Some(cooldown) = world.get_mut::<ShootCooldown>(e) {
                cooldown.tick(dt);
            }
            let input = match world.get_mut::<PendingInput>(e) {
                Some(pending) if !pending.is_empty() => std::mem::take(pending),
                _ => continue,
            };
            let speed = world.get::<Speed>(e).map_or(0.0, |s| s.0);
            let Some(Position(pos)) = world.get_mut::<Position>(e) else {
                continue;
            };
            let mut next = match input.target {
                Some(target) if target.is_finite() => target,
                Some(_) => {
                    warn!(entity = %e, "Ignoring non-finite position report");
                    *pos
                }
                None => *pos,
            };
            for direction in input.directions {
                next = next.add(direction.unit().scale(speed * dt));
            }
            *pos = field.bounds.clamp_point(next);
        }
        Ok(())
    }
}

/// Spawns enemies on a timer while a game runs, and lets them fire.
pub struct EnemySystem {
    cfg: GameplayConfig,
    spawn_timer: f32,
}

impl EnemySystem {
    pub fn new(cfg: GameplayConfig) -> Self {
        Self {
            cfg,
            spawn_timer: 0.0,
        }
    }

    fn spawn_row(&self, world: &mut World, field: &PlayField) -> Result<f32, SystemFault> {
        let half = self.cfg.enemy_half_size[1];
        let (lo, hi) = (field.bounds.min.y + half, field.bounds.max.y - half);
        let rng = world
            .resource_mut::<GameRng>()
            .ok_or_else(SystemFault::missing::<GameRng>)?;
        if lo < hi {
            Ok(rng.0.gen_range(lo..=hi))
        } else {
            Ok((field.bounds.min.y + field.bounds.max.y) / 2.0)
        }
    }
}

impl System for EnemySystem {
    fn name(&self) -> &'static str {
        "enemy"
    }

    fn run(
        &mut self,
        world: &mut World,
        events: &mut EventQueue,
        dt: f32,
    ) -> Result<(), SystemFault> {
        if world.resource::<GamePhase>().copied().unwrap_or_default() != GamePhase::Running {
            return Ok(());
        }
        let field = play_field(world)?;

        if self.cfg.enemy_spawn_interval > 0.0 {
            self.spawn_timer += dt;
            while self.spawn_timer >= self.cfg.enemy_spawn_interval {
                self.spawn_timer -= self.cfg.enemy_spawn_interval;
                let y = self.spawn_row(world, &field)?;
                let at = Vec2::new(self.cfg.enemy_spawn_x, y);
                spawn_enemy(world, events, &self.cfg, EnemyType::BasicFighter, at);
            }
        }

        for e in world.entities_with::<Enemy>() {
            if !world.is_alive(e) {
                continue;
            }
            let fired = match world.get_mut::<ShootCooldown>(e) {
                Some(cooldown) => {
                    cooldown.tick(dt);
                    cooldown.try_fire()
                }
                None => false,
            };
            if !fired {
                continue;
            }
            let owner = world.get::<Enemy>(e).map_or(0, |en| en.enemy_id);
            let at = position_of(world, e);
            spawn_projectile(world, events, &self.cfg, ProjectileType::EnemyBasic, owner, at);
        }
        Ok(())
    }
}

/// Integrates velocity into position.
#[derive(Debug, Default)]
pub struct MovementSystem;

impl System for MovementSystem {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn run(&mut self, world: &mut World, _: &mut EventQueue, dt: f32) -> Result<(), SystemFault> {
        let moving: Vec<(EntityId, Vec2)> = world
            .query::<Velocity>()
            .map(|(e, v)| (e, v.0))
            .collect();
        for (e, velocity) in moving {
            if !velocity.is_finite() {
                warn!(entity = %e, "Skipping non-finite velocity");
                continue;
            }
            if let Some(Position(pos)) = world.get_mut::<Position>(e) {
                *pos = pos.add(velocity.scale(dt));
            }
        }
        Ok(())
    }
}

/// Expires projectiles whose lifetime ran out.
#[derive(Debug, Default)]
pub struct ProjectileSystem;

impl System for ProjectileSystem {
    fn name(&self) -> &'static str {
        "projectile"
    }

    fn run(
        &mut self,
        world: &mut World,
        events: &mut EventQueue,
        dt: f32,
    ) -> Result<(), SystemFault> {
        for e in world.entities_with::<Projectile>() {
            if !world.is_alive(e) {
                continue;
            }
            let Some(projectile) = world.get_mut::<Projectile>(e) else {
                continue;
            };
            projectile.lifetime -= dt;
            if projectile.lifetime > 0.0 {
                continue;
            }
            let projectile_id = projectile.projectile_id;
            if world.destroy_entity(e) {
                events.push(GameEvent::ProjectileDestroyed {
                    projectile_id,
                    position: position_of(world, e),
                });
            }
        }
        Ok(())
    }
}

/// Keeps players on screen and culls enemies and projectiles that left it.
#[derive(Debug, Default)]
pub struct BoundarySystem;

impl BoundarySystem {
    fn off_field(world: &World, e: EntityId, field: &PlayField) -> bool {
        let pos = position_of(world, e);
        let cull = field.cull_bounds();
        match world.get::<Collider>(e).and_then(|c| c.bounds(pos)) {
            Some(bounds) => !bounds.overlaps(&cull),
            None => !cull.contains_point(pos),
        }
    }
}

impl System for BoundarySystem {
    fn name(&self) -> &'static str {
        "boundary"
    }

    fn run(
        &mut self,
        world: &mut World,
        events: &mut EventQueue,
        _: f32,
    ) -> Result<(), SystemFault> {
        let field = play_field(world)?;

        for e in world.entities_with::<Player>() {
            if let Some(Position(pos)) = world.get_mut::<Position>(e) {
                *pos = field.bounds.clamp_point(*pos);
            }
        }

        for e in world.entities_with::<Enemy>() {
            if !world.is_alive(e) || !Self::off_field(world, e, &field) {
                continue;
            }
            let enemy_id = world.get::<Enemy>(e).map_or(0, |en| en.enemy_id);
            if world.destroy_entity(e) {
                events.push(GameEvent::EnemyDied {
                    enemy_id,
                    position: position_of(world, e),
                    killer_id: 0,
                    score: 0,
                });
            }
        }

        for e in world.entities_with::<Projectile>() {
            if !world.is_alive(e) || !Self::off_field(world, e, &field) {
                continue;
            }
            let projectile_id = world.get::<Projectile>(e).map_or(0, |p| p.projectile_id);
            if world.destroy_entity(e) {
                events.push(GameEvent::ProjectileDestroyed {
                    projectile_id,
                    position: position_of(world, e),
                });
            }
        }
        Ok(())
    }
}

/// Periodically snapshots player and enemy positions for clients.
pub struct ReplicationSystem {
    interval: f32,
    timer: f32,
}

impl ReplicationSystem {
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            timer: 0.0,
        }
    }
}

impl System for ReplicationSystem {
    fn name(&self) -> &'static str {
        "replication"
    }

    fn run(
        &mut self,
        world: &mut World,
        events: &mut EventQueue,
        dt: f32,
    ) -> Result<(), SystemFault> {
        self.timer += dt;
        if self.timer < self.interval {
            return Ok(());
        }
        self.timer = 0.0;

        for (e, player) in world.query::<Player>() {
            if world.is_alive(e) {
                events.push(GameEvent::PlayerMoved {
                    player_id: player.player_id,
                    position: position_of(world, e),
                });
            }
        }
        for (e, enemy) in world.query::<Enemy>() {
            if world.is_alive(e) {
                events.push(GameEvent::EnemyMoved {
                    enemy_id: enemy.enemy_id,
                    position: position_of(world, e),
                    velocity: world.get::<Velocity>(e).map_or(Vec2::ZERO, |v| v.0),
                });
            }
        }
        Ok(())
    }
}

/// Steps sprite animations and updates the sprite source rectangle.
#[derive(Debug, Default)]
pub struct AnimationSystem;

impl System for AnimationSystem {
    fn name(&self) -> &'static str {
        "animation"
    }

    fn run(&mut self, world: &mut World, _: &mut EventQueue, dt: f32) -> Result<(), SystemFault> {
        for e in world.entities_with::<SpriteAnimation>() {
            let Some(frame_size) = world.get::<Sprite>(e).map(|s| s.frame_size) else {
                continue;
            };
            let Some(anim) = world.get_mut::<SpriteAnimation>(e) else {
                continue;
            };
            if !anim.advance(dt) {
                continue;
            }
            let source = anim.frame_rect(frame_size);
            if let Some(sprite) = world.get_mut::<Sprite>(e) {
                sprite.source = source;
            }
        }
        Ok(())
    }
}

/// Scrolls background tiles and wraps them around once fully off screen.
#[derive(Debug, Default)]
pub struct BackgroundSystem;

impl System for BackgroundSystem {
    fn name(&self) -> &'static str {
        "background"
    }

    fn run(&mut self, world: &mut World, _: &mut EventQueue, dt: f32) -> Result<(), SystemFault> {
        let tiles: Vec<(EntityId, Background)> =
            world.query::<Background>().map(|(e, b)| (e, *b)).collect();
        let count = tiles.len() as f32;
        for (e, tile) in tiles {
            if let Some(Position(pos)) = world.get_mut::<Position>(e) {
                pos.x += tile.scroll_speed * dt;
                if pos.x <= -tile.width {
                    pos.x += tile.width * count;
                }
            }
        }
        Ok(())
    }
}

/// Authoritative server systems in execution order.
pub fn server_schedule(cfg: &GameplayConfig) -> Schedule {
    Schedule::new()
        .with_system(InputSystem)
        .with_system(EnemySystem::new(cfg.clone()))
        .with_system(MovementSystem)
        .with_system(ProjectileSystem)
        .with_system(CollisionSystem::new(cfg.collision_damage, cfg.enemy_score))
        .with_system(BoundarySystem)
        .with_system(ReplicationSystem::new(cfg.snapshot_interval))
}

/// Client replica systems in execution order.
pub fn client_schedule() -> Schedule {
    Schedule::new()
        .with_system(MovementSystem)
        .with_system(AnimationSystem)
        .with_system(BackgroundSystem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::{Health, Score},
        packet::{MoveDirection, PlayerName},
        resources::IdAllocator,
        spawn::spawn_player,
    };

    fn world() -> World {
        let mut w = World::new();
        w.insert_resource(PlayField::new(1200.0, 750.0, 30.0));
        w.insert_resource(GameRng::seeded(7));
        w.insert_resource(IdAllocator::default());
        w
    }

    fn player(w: &mut World, at: Vec2) -> EntityId {
        let mut events = EventQueue::new();
        spawn_player(w, &mut events, &GameplayConfig::default(), PlayerName::new("p"), at).0
    }

    #[test]
    fn last_position_report_wins_and_is_clamped() {
        let mut w = world();
        let p = player(&mut w, Vec2::new(100.0, 100.0));
        {
            let input = w.get_mut::<PendingInput>(p).unwrap();
            input.target = Some(Vec2::new(200.0, 200.0));
            input.target = Some(Vec2::new(5000.0, -3.0));
        }
        InputSystem.run(&mut w, &mut EventQueue::new(), 0.1).unwrap();
        assert_eq!(w.get::<Position>(p), Some(&Position(Vec2::new(1200.0, 0.0))));
        assert!(w.get::<PendingInput>(p).unwrap().is_empty());
    }

    #[test]
    fn direction_moves_by_speed_times_dt() {
        let mut w = world();
        let p = player(&mut w, Vec2::new(100.0, 100.0));
        let input = w.get_mut::<PendingInput>(p).unwrap();
        input.push_direction(MoveDirection::Right);
        input.push_direction(MoveDirection::Right);
        InputSystem.run(&mut w, &mut EventQueue::new(), 0.5).unwrap();
        assert_eq!(w.get::<Position>(p), Some(&Position(Vec2::new(300.0, 100.0))));
    }

    #[test]
    fn input_without_play_field_faults() {
        let mut w = World::new();
        let err = InputSystem.run(&mut w, &mut EventQueue::new(), 0.1);
        assert!(matches!(err, Err(SystemFault::MissingResource(_))));
    }

    #[test]
    fn projectile_expires_once() {
        let mut w = world();
        let mut events = EventQueue::new();
        let cfg = GameplayConfig {
            projectile_lifetime: 0.15,
            ..GameplayConfig::default()
        };
        spawn_projectile(
            &mut w,
            &mut events,
            &cfg,
            ProjectileType::PlayerBasic,
            1,
            Vec2::new(50.0, 50.0),
        );
        events.drain();
        let mut sys = ProjectileSystem;
        sys.run(&mut w, &mut events, 0.1).unwrap();
        assert!(events.is_empty());
        sys.run(&mut w, &mut events, 0.1).unwrap();
        sys.run(&mut w, &mut events, 0.1).unwrap();
        let batch = events.drain();
        assert_eq!(batch.len(), 1);
        assert!(matches!(batch[0], GameEvent::ProjectileDestroyed { projectile_id: 1, .. }));
    }

    #[test]
    fn boundary_culls_offscreen_projectile_and_clamps_player() {
        let mut w = world();
        let mut events = EventQueue::new();
        let cfg = GameplayConfig::default();
        let (shot, id) = spawn_projectile(
            &mut w,
            &mut events,
            &cfg,
            ProjectileType::PlayerBasic,
            1,
            Vec2::new(1300.0, 50.0),
        );
        let p = player(&mut w, Vec2::new(100.0, 100.0));
        w.get_mut::<Position>(p).unwrap().0 = Vec2::new(-50.0, 900.0);
        events.drain();

        BoundarySystem.run(&mut w, &mut events, 0.0).unwrap();
        assert!(w.is_marked(shot));
        assert_eq!(
            events.drain(),
            vec![GameEvent::ProjectileDestroyed {
                projectile_id: id,
                position: Vec2::new(1300.0, 50.0),
            }]
        );
        assert_eq!(w.get::<Position>(p), Some(&Position(Vec2::new(0.0, 750.0))));
    }

    #[test]
    fn enemies_spawn_only_while_running() {
        let cfg = GameplayConfig {
            enemy_spawn_interval: 1.0,
            ..GameplayConfig::default()
        };
        let mut w = world();
        let mut events = EventQueue::new();
        let mut sys = EnemySystem::new(cfg);
        sys.run(&mut w, &mut events, 1.0).unwrap();
        assert!(events.is_empty());

        w.insert_resource(GamePhase::Running);
        sys.run(&mut w, &mut events, 1.0).unwrap();
        let batch = events.drain();
        assert_eq!(batch.len(), 1);
        let GameEvent::EnemySpawned { position, .. } = batch[0] else {
            panic!("expected spawn");
        };
        assert_eq!(position.x, 1220.0);
        assert!((32.0..=718.0).contains(&position.y));
    }

    #[test]
    fn enemy_fires_hostile_projectile_on_cooldown() {
        let cfg = GameplayConfig {
            enemy_spawn_interval: 0.0,
            enemy_fire_interval: 1.0,
            ..GameplayConfig::default()
        };
        let mut w = world();
        w.insert_resource(GamePhase::Running);
        let mut events = EventQueue::new();
        let at = Vec2::new(600.0, 300.0);
        let (_, enemy_id) = spawn_enemy(&mut w, &mut events, &cfg, EnemyType::BasicFighter, at);
        events.drain();

        let mut sys = EnemySystem::new(cfg);
        sys.run(&mut w, &mut events, 0.5).unwrap();
        assert!(events.is_empty());
        sys.run(&mut w, &mut events, 0.5).unwrap();
        let batch = events.drain();
        assert!(matches!(
            batch.as_slice(),
            [GameEvent::ProjectileSpawned { hostile: true, owner_id, .. }] if *owner_id == enemy_id
        ));
    }

    #[test]
    fn replication_is_periodic() {
        let mut w = world();
        let p = player(&mut w, Vec2::new(10.0, 20.0));
        w.insert(p, Health::full(1));
        w.insert(p, Score(0));
        let mut events = EventQueue::new();
        let mut sys = ReplicationSystem::new(0.2);
        sys.run(&mut w, &mut events, 0.1).unwrap();
        assert!(events.is_empty());
        sys.run(&mut w, &mut events, 0.1).unwrap();
        assert_eq!(
            events.drain(),
            vec![GameEvent::PlayerMoved {
                player_id: 1,
                position: Vec2::new(10.0, 20.0),
            }]
        );
    }

    #[test]
    fn background_wraps() {
        let mut w = world();
        let a = w.create_entity();
        let b = w.create_entity();
        for (e, x) in [(a, 0.0), (b, 100.0)] {
            w.insert(e, Position(Vec2::new(x, 0.0)));
            w.insert(e, Background { scroll_speed: -50.0, width: 100.0 });
        }
        BackgroundSystem.run(&mut w, &mut EventQueue::new(), 2.0).unwrap();
        assert_eq!(w.get::<Position>(a).unwrap().0.x, 100.0);
        assert_eq!(w.get::<Position>(b).unwrap().0.x, 0.0);
    }

    #[test]
    fn animation_updates_sprite_source() {
        let mut w = world();
        let e = w.create_entity();
        w.insert(e, Sprite::new("ship", 16.0, 16.0));
        w.insert(e, SpriteAnimation::looping(4, 0, 3, 0.1));
        AnimationSystem.run(&mut w, &mut EventQueue::new(), 0.1).unwrap();
        assert_eq!(w.get::<Sprite>(e).unwrap().source.min, Vec2::new(16.0, 0.0));
    }

    #[test]
    fn server_schedule_order() {
        let schedule = server_schedule(&GameplayConfig::default());
        assert_eq!(
            schedule.system_names(),
            vec!["input", "enemy", "movement", "projectile", "collision", "boundary", "replication"]
        );
    }
}
