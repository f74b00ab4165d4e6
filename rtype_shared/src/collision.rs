//! Collision resolution.
//!
//! Pairwise AABB test between projectiles and enemies, projectiles and
//! players, and players and enemies: an O(n·m) scan per pair of sets each
//! tick. Populations are tens of entities, so there is no spatial
//! partitioning.
//!
//! Friendly fire is ignored: player projectiles never hit players and
//! hostile projectiles never hit enemies. A projectile is consumed by its
//! first hit; `ProjectileHit` tells clients to remove it.

use std::collections::HashMap;

use tracing::warn;

use crate::{
    components::{Collider, Enemy, Health, Player, Position, Projectile, Score},
    ecs::{EntityId, System, SystemFault, World},
    event::{EventQueue, GameEvent},
    math::{Rect, Vec2},
    resources::Scoreboard,
};

#[derive(Debug, Clone, Copy)]
struct Body {
    entity: EntityId,
    id: u32,
    bounds: Rect,
}

#[derive(Debug, Clone, Copy)]
struct Shot {
    body: Body,
    owner_id: u32,
    damage: u32,
    hostile: bool,
}

fn bounds_of(world: &World, e: EntityId) -> Option<Rect> {
    let pos = world.get::<Position>(e)?.0;
    let collider = world.get::<Collider>(e)?;
    let bounds = collider.bounds(pos);
    if bounds.is_none() {
        warn!(entity = %e, ?collider, "Skipping degenerate collider");
    }
    bounds
}

fn bodies<T: 'static + Send + Sync>(world: &World, id_of: impl Fn(&T) -> u32) -> Vec<Body> {
    world
        .query::<T>()
        .filter(|(e, _)| world.is_alive(*e))
        .filter_map(|(e, tag)| {
            bounds_of(world, e).map(|bounds| Body {
                entity: e,
                id: id_of(tag),
                bounds,
            })
        })
        .collect()
}

fn center(world: &World, e: EntityId) -> Vec2 {
    world.get::<Position>(e).map_or(Vec2::ZERO, |p| p.0)
}

/// Applies hits and deaths for overlapping bodies.
pub struct CollisionSystem {
    collision_damage: u32,
    enemy_score: u32,
}

impl CollisionSystem {
    pub fn new(collision_damage: u32, enemy_score: u32) -> Self {
        Self {
            collision_damage,
            enemy_score,
        }
    }

    /// Damages an enemy. Returns `true` if this hit killed it.
    fn hurt_enemy(
        &self,
        world: &mut World,
        events: &mut EventQueue,
        players: &HashMap<u32, EntityId>,
        enemy: &Body,
        damage: u32,
        killer_id: u32,
    ) -> bool {
        let Some(health) = world.get_mut::<Health>(enemy.entity) else {
            return false;
        };
        let remaining = health.damage(damage);
        let position = center(world, enemy.entity);
        events.push(GameEvent::EnemyHit {
            enemy_id: enemy.id,
            position,
            damage,
            health: remaining,
        });
        if remaining > 0 || !world.destroy_entity(enemy.entity) {
            return false;
        }
        events.push(GameEvent::EnemyDied {
            enemy_id: enemy.id,
            position,
            killer_id,
            score: self.enemy_score,
        });
        if let Some(score) = players
            .get(&killer_id)
            .and_then(|&e| world.get_mut::<Score>(e))
        {
            score.0 = score.0.saturating_add(self.enemy_score);
        }
        let board = world.resources_mut().get_or_default::<Scoreboard>();
        board.total = board.total.saturating_add(self.enemy_score);
        true
    }

    /// Damages a player. Returns `true` if this hit killed it.
    fn hurt_player(
        &self,
        world: &mut World,
        events: &mut EventQueue,
        player: &Body,
        damage: u32,
    ) -> bool {
        let Some(health) = world.get_mut::<Health>(player.entity) else {
            return false;
        };
        let remaining = health.damage(damage);
        let position = center(world, player.entity);
        events.push(GameEvent::PlayerHit {
            player_id: player.id,
            position,
            damage,
            health: remaining,
        });
        if remaining > 0 || !world.destroy_entity(player.entity) {
            return false;
        }
        events.push(GameEvent::PlayerDied {
            player_id: player.id,
            position,
        });
        true
    }
}

impl System for CollisionSystem {
    fn name(&self) -> &'static str {
        "collision"
    }

    fn run(
        &mut self,
        world: &mut World,
        events: &mut EventQueue,
        _: f32,
    ) -> Result<(), SystemFault> {
        let players = bodies::<Player>(world, |p| p.player_id);
        let enemies = bodies::<Enemy>(world, |e| e.enemy_id);
        let shots: Vec<Shot> = world
            .query::<Projectile>()
            .filter(|(e, _)| world.is_alive(*e))
            .filter_map(|(e, p)| {
                bounds_of(world, e).map(|bounds| Shot {
                    body: Body {
                        entity: e,
                        id: p.projectile_id,
                        bounds,
                    },
                    owner_id: p.owner_id,
                    damage: p.damage,
                    hostile: p.hostile,
                })
            })
            .collect();
        let by_player_id: HashMap<u32, EntityId> =
            players.iter().map(|b| (b.id, b.entity)).collect();

        for shot in &shots {
            let targets = if shot.hostile { &players } else { &enemies };
            let Some(target) = targets
                .iter()
                .find(|t| world.is_alive(t.entity) && t.bounds.overlaps(&shot.body.bounds))
            else {
                continue;
            };
            if shot.hostile {
                self.hurt_player(world, events, target, shot.damage);
            } else {
                self.hurt_enemy(world, events, &by_player_id, target, shot.damage, shot.owner_id);
            }
            events.push(GameEvent::ProjectileHit {
                projectile_id: shot.body.id,
                target_id: target.id,
                target_is_player: shot.hostile,
                position: center(world, shot.body.entity),
            });
            world.destroy_entity(shot.body.entity);
        }

        for player in &players {
            for enemy in &enemies {
                if !world.is_alive(player.entity) {
                    break;
                }
                if !world.is_alive(enemy.entity) || !player.bounds.overlaps(&enemy.bounds) {
                    continue;
                }
                self.hurt_player(world, events, player, self.collision_damage);
                self.hurt_enemy(
                    world,
                    events,
                    &by_player_id,
                    enemy,
                    self.collision_damage,
                    player.id,
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::GameplayConfig,
        packet::{EnemyType, PlayerName, ProjectileType},
        spawn::{spawn_enemy, spawn_player, spawn_projectile},
    };

    struct Arena {
        world: World,
        events: EventQueue,
        cfg: GameplayConfig,
    }

    impl Arena {
        fn new() -> Self {
            Self {
                world: World::new(),
                events: EventQueue::new(),
                cfg: GameplayConfig {
                    enemy_max_health: 20,
                    player_projectile_damage: 10,
                    ..GameplayConfig::default()
                },
            }
        }

        fn player(&mut self, at: Vec2) -> (EntityId, u32) {
            spawn_player(&mut self.world, &mut self.events, &self.cfg, PlayerName::new("p"), at)
        }

        fn enemy(&mut self, at: Vec2) -> (EntityId, u32) {
            spawn_enemy(&mut self.world, &mut self.events, &self.cfg, EnemyType::BasicFighter, at)
        }

        fn shot(&mut self, kind: ProjectileType, owner: u32, at: Vec2) -> (EntityId, u32) {
            spawn_projectile(&mut self.world, &mut self.events, &self.cfg, kind, owner, at)
        }

        fn step(&mut self) -> Vec<GameEvent> {
            self.events.drain();
            let mut sys = CollisionSystem::new(self.cfg.collision_damage, self.cfg.enemy_score);
            sys.run(&mut self.world, &mut self.events, 0.016).unwrap();
            self.events.drain()
        }
    }

    #[test]
    fn lethal_hit_emits_hit_death_then_projectile_hit() {
        let mut a = Arena::new();
        let (player, pid) = a.player(Vec2::new(100.0, 100.0));
        let (enemy, eid) = a.enemy(Vec2::new(600.0, 300.0));
        a.world.get_mut::<Health>(enemy).unwrap().current = 10;
        let (shot, sid) = a.shot(ProjectileType::PlayerBasic, pid, Vec2::new(600.0, 300.0));

        let batch = a.step();
        assert_eq!(batch.len(), 3);
        assert!(matches!(
            batch[0],
            GameEvent::EnemyHit { enemy_id, health: 0, .. } if enemy_id == eid
        ));
        assert!(matches!(
            batch[1],
            GameEvent::EnemyDied { enemy_id, killer_id, score: 100, .. }
                if enemy_id == eid && killer_id == pid
        ));
        assert!(matches!(
            batch[2],
            GameEvent::ProjectileHit { projectile_id, target_id, target_is_player: false, .. }
                if projectile_id == sid && target_id == eid
        ));
        assert!(a.world.is_marked(enemy));
        assert!(a.world.is_marked(shot));
        assert_eq!(a.world.get::<Score>(player), Some(&Score(100)));
        assert_eq!(a.world.resource::<Scoreboard>().map(|s| s.total), Some(100));
    }

    #[test]
    fn two_shots_on_a_dying_enemy_report_one_death() {
        let mut a = Arena::new();
        let (_, pid) = a.player(Vec2::new(100.0, 100.0));
        let (enemy, _) = a.enemy(Vec2::new(600.0, 300.0));
        a.world.get_mut::<Health>(enemy).unwrap().current = 5;
        let (_, first) = a.shot(ProjectileType::PlayerBasic, pid, Vec2::new(600.0, 300.0));
        let (second, _) = a.shot(ProjectileType::PlayerBasic, pid, Vec2::new(601.0, 300.0));

        let batch = a.step();
        let deaths = batch
            .iter()
            .filter(|e| matches!(e, GameEvent::EnemyDied { .. }))
            .count();
        assert_eq!(deaths, 1);
        assert!(matches!(
            batch.last(),
            Some(GameEvent::ProjectileHit { projectile_id, .. }) if *projectile_id == first
        ));
        assert!(a.world.is_alive(second));
    }

    #[test]
    fn friendly_fire_is_ignored() {
        let mut a = Arena::new();
        let (player, pid) = a.player(Vec2::new(100.0, 100.0));
        let (enemy, eid) = a.enemy(Vec2::new(600.0, 300.0));
        a.shot(ProjectileType::PlayerBasic, pid, Vec2::new(100.0, 100.0));
        a.shot(ProjectileType::EnemyBasic, eid, Vec2::new(600.0, 300.0));

        assert!(a.step().is_empty());
        assert_eq!(a.world.get::<Health>(player).unwrap().current, 100);
        assert_eq!(a.world.get::<Health>(enemy).unwrap().current, 20);
    }

    #[test]
    fn ramming_damages_both_sides() {
        let mut a = Arena::new();
        let (player, pid) = a.player(Vec2::new(300.0, 300.0));
        let (enemy, eid) = a.enemy(Vec2::new(310.0, 300.0));

        let batch = a.step();
        assert_eq!(
            batch[0],
            GameEvent::PlayerHit {
                player_id: pid,
                position: Vec2::new(300.0, 300.0),
                damage: 20,
                health: 80,
            }
        );
        assert!(matches!(
            batch[1],
            GameEvent::EnemyHit { enemy_id, damage: 20, health: 0, .. } if enemy_id == eid
        ));
        assert!(matches!(batch[2], GameEvent::EnemyDied { killer_id, .. } if killer_id == pid));
        assert!(a.world.is_alive(player));
        assert!(a.world.is_marked(enemy));
    }

    #[test]
    fn hostile_shot_kills_player() {
        let mut a = Arena::new();
        let (player, pid) = a.player(Vec2::new(300.0, 300.0));
        a.world.get_mut::<Health>(player).unwrap().current = 10;
        a.shot(ProjectileType::EnemyBasic, 9, Vec2::new(300.0, 300.0));

        let batch = a.step();
        assert!(matches!(batch[0], GameEvent::PlayerHit { health: 0, .. }));
        assert_eq!(
            batch[1],
            GameEvent::PlayerDied {
                player_id: pid,
                position: Vec2::new(300.0, 300.0),
            }
        );
        assert!(matches!(batch[2], GameEvent::ProjectileHit { target_is_player: true, .. }));
    }

    #[test]
    fn degenerate_collider_is_skipped() {
        let mut a = Arena::new();
        let (_, pid) = a.player(Vec2::new(100.0, 100.0));
        let (enemy, _) = a.enemy(Vec2::new(600.0, 300.0));
        a.world.insert(enemy, Collider::new(f32::NAN, 1.0));
        a.shot(ProjectileType::PlayerBasic, pid, Vec2::new(600.0, 300.0));
        assert!(a.step().is_empty());
    }
}
