//! Entity factories.
//!
//! Each factory builds the full component set for one kind of game object,
//! draws its network id and queues the matching spawn event, so an object
//! never exists on the server without clients hearing about it.

use crate::{
    components::{
        Collider, Enemy, Health, PendingInput, Player, Position, Projectile, Score,
        ShootCooldown, Speed, Velocity,
    },
    config::GameplayConfig,
    ecs::{EntityId, World},
    event::{EventQueue, GameEvent},
    math::Vec2,
    packet::{EnemyType, PlayerName, ProjectileType},
    resources::IdAllocator,
};

/// Spawns a player ship and queues `PlayerJoined`.
pub fn spawn_player(
    world: &mut World,
    events: &mut EventQueue,
    cfg: &GameplayConfig,
    name: PlayerName,
    position: Vec2,
) -> (EntityId, u32) {
    let player_id = world.resources_mut().get_or_default::<IdAllocator>().next_player();
    let e = world.create_entity();
    world.insert(e, Player { player_id, name });
    world.insert(e, Position(position));
    world.insert(e, Speed(cfg.player_speed));
    world.insert(e, Health::full(cfg.player_max_health));
    world.insert(e, Score::default());
    world.insert(e, Collider::from_half_size(cfg.player_half_size));
    world.insert(e, ShootCooldown::ready(cfg.shoot_cooldown));
    world.insert(e, PendingInput::default());
    events.push(GameEvent::PlayerJoined {
        player_id,
        position,
        speed: cfg.player_speed,
        max_health: cfg.player_max_health,
    });
    (e, player_id)
}

/// Spawns an enemy moving left and queues `EnemySpawned`.
pub fn spawn_enemy(
    world: &mut World,
    events: &mut EventQueue,
    cfg: &GameplayConfig,
    kind: EnemyType,
    position: Vec2,
) -> (EntityId, u32) {
    let enemy_id = world.resources_mut().get_or_default::<IdAllocator>().next_enemy();
    let velocity = Vec2::new(cfg.enemy_speed, 0.0);
    let e = world.create_entity();
    world.insert(e, Enemy { enemy_id, kind });
    world.insert(e, Position(position));
    world.insert(e, Velocity(velocity));
    world.insert(e, Health::full(cfg.enemy_max_health));
    world.insert(e, Collider::from_half_size(cfg.enemy_half_size));
    world.insert(e, ShootCooldown::charging(cfg.enemy_fire_interval));
    events.push(GameEvent::EnemySpawned {
        enemy_id,
        kind,
        position,
        velocity,
        health: cfg.enemy_max_health,
        max_health: cfg.enemy_max_health,
    });
    (e, enemy_id)
}

/// Spawns a projectile and queues `ProjectileSpawned`. Player projectiles
/// fly right, enemy projectiles fly left.
pub fn spawn_projectile(
    world: &mut World,
    events: &mut EventQueue,
    cfg: &GameplayConfig,
    kind: ProjectileType,
    owner_id: u32,
    position: Vec2,
) -> (EntityId, u32) {
    let projectile_id = world
        .resources_mut()
        .get_or_default::<IdAllocator>()
        .next_projectile();
    let hostile = kind.is_hostile();
    let (dir, damage) = if hostile {
        (-1.0, cfg.enemy_projectile_damage)
    } else {
        (1.0, cfg.player_projectile_damage)
    };
    let velocity = Vec2::new(dir * cfg.projectile_speed, 0.0);
    let e = world.create_entity();
    world.insert(
        e,
        Projectile {
            projectile_id,
            kind,
            owner_id,
            damage,
            hostile,
            lifetime: cfg.projectile_lifetime,
        },
    );
    world.insert(e, Position(position));
    world.insert(e, Velocity(velocity));
    world.insert(e, Collider::from_half_size(cfg.projectile_half_size));
    events.push(GameEvent::ProjectileSpawned {
        projectile_id,
        kind,
        owner_id,
        hostile,
        position,
        velocity,
        damage,
    });
    (e, projectile_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factories_queue_one_spawn_event_each() {
        let cfg = GameplayConfig::default();
        let mut world = World::new();
        let mut events = EventQueue::new();

        let (p, pid) = spawn_player(
            &mut world,
            &mut events,
            &cfg,
            PlayerName::new("a"),
            Vec2::new(100.0, 100.0),
        );
        let (_, eid) = spawn_enemy(
            &mut world,
            &mut events,
            &cfg,
            EnemyType::BasicFighter,
            Vec2::new(1220.0, 100.0),
        );
        let (shot, _) = spawn_projectile(
            &mut world,
            &mut events,
            &cfg,
            ProjectileType::PlayerBasic,
            pid,
            Vec2::new(100.0, 100.0),
        );

        assert_eq!((pid, eid), (1, 1));
        assert_eq!(world.get::<Player>(p).map(|pl| pl.player_id), Some(1));
        let proj = world.get::<Projectile>(shot).copied().unwrap();
        assert!(!proj.hostile);
        assert_eq!(world.get::<Velocity>(shot), Some(&Velocity(Vec2::new(100.0, 0.0))));
        assert_eq!(events.len(), 3);
    }
}
