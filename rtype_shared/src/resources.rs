//! World resources.
//!
//! Typed singletons shared between systems (play field, gameplay tunables,
//! network id counters, RNG). At most one value per type.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use rand::{rngs::StdRng, SeedableRng};

use crate::math::{Rect, Vec2};

/// Typed singleton map.
#[derive(Default)]
pub struct Resources {
    by_type: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Resources {
    /// Inserts a resource, returning the one it replaced.
    pub fn insert<R: 'static + Send + Sync>(&mut self, value: R) -> Option<R> {
        self.by_type
            .insert(TypeId::of::<R>(), Box::new(value))
            .and_then(|old| old.downcast::<R>().ok())
            .map(|boxed| *boxed)
    }

    pub fn get<R: 'static + Send + Sync>(&self) -> Option<&R> {
        self.by_type
            .get(&TypeId::of::<R>())
            .and_then(|boxed| boxed.downcast_ref::<R>())
    }

    pub fn get_mut<R: 'static + Send + Sync>(&mut self) -> Option<&mut R> {
        self.by_type
            .get_mut(&TypeId::of::<R>())
            .and_then(|boxed| boxed.downcast_mut::<R>())
    }

    pub fn remove<R: 'static + Send + Sync>(&mut self) -> Option<R> {
        self.by_type
            .remove(&TypeId::of::<R>())
            .and_then(|boxed| boxed.downcast::<R>().ok())
            .map(|boxed| *boxed)
    }

    pub fn contains<R: 'static + Send + Sync>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<R>())
    }

    /// Returns the resource, inserting `R::default()` first if absent.
    pub fn get_or_default<R: 'static + Send + Sync + Default>(&mut self) -> &mut R {
        let boxed = self
            .by_type
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Box::new(R::default()));
        match boxed.downcast_mut::<R>() {
            Some(r) => r,
            None => unreachable!("resource keyed by its own TypeId"),
        }
    }
}

/// Visible play area, origin top-left, y down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayField {
    pub bounds: Rect,
    /// Extra room outside `bounds` before off-screen objects are culled.
    pub cull_margin: f32,
}

impl PlayField {
    pub fn new(width: f32, height: f32, cull_margin: f32) -> Self {
        Self {
            bounds: Rect::new(Vec2::ZERO, Vec2::new(width, height)),
            cull_margin,
        }
    }

    pub fn cull_bounds(&self) -> Rect {
        self.bounds.expand(self.cull_margin)
    }
}

/// Monotonic per-kind network ids. Ids start at 1 and are never reused
/// within a game.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    players: u32,
    enemies: u32,
    projectiles: u32,
}

impl IdAllocator {
    pub fn next_player(&mut self) -> u32 {
        self.players += 1;
        self.players
    }

    pub fn next_enemy(&mut self) -> u32 {
        self.enemies += 1;
        self.enemies
    }

    pub fn next_projectile(&mut self) -> u32 {
        self.projectiles += 1;
        self.projectiles
    }
}

/// Seeded RNG so a run is reproducible from its seed and inputs.
pub struct GameRng(pub StdRng);

impl GameRng {
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

/// Lifecycle of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GamePhase {
    /// Waiting for the first player.
    #[default]
    Idle,
    Running,
    Ended,
}

/// Points scored over the whole game, including by players who have left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scoreboard {
    pub total: u32,
}

/// Simulation clock, advanced once per step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Clock {
    pub tick: u64,
    pub elapsed: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_and_returns_previous() {
        let mut res = Resources::default();
        assert_eq!(res.insert(3u32), None);
        assert_eq!(res.insert(4u32), Some(3));
        assert_eq!(res.get::<u32>(), Some(&4));
        *res.get_mut::<u32>().unwrap() += 1;
        assert_eq!(res.remove::<u32>(), Some(5));
        assert!(!res.contains::<u32>());
        *res.get_or_default::<u32>() += 2;
        assert_eq!(res.get::<u32>(), Some(&2));
    }

    #[test]
    fn ids_are_monotonic_per_kind() {
        let mut ids = IdAllocator::default();
        assert_eq!(ids.next_player(), 1);
        assert_eq!(ids.next_player(), 2);
        assert_eq!(ids.next_enemy(), 1);
        assert_eq!(ids.next_projectile(), 1);
    }
}
