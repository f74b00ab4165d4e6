//! Entity/component system.
//!
//! Small sparse-set ECS for a fixed-step simulation:
//! - entities are generational indices; stale ids never resolve;
//! - each component type lives in its own [`ComponentStorage`] (dense values,
//!   owner list, sparse index by entity index);
//! - destruction is deferred to [`World::maintain`], the end-of-tick sweep,
//!   and released indices sit out one more sweep before being reused;
//! - systems run in registration order through a [`Schedule`].

use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    fmt,
};

use thiserror::Error;
use tracing::warn;

use crate::{event::EventQueue, resources::Resources};

/// Generational entity handle. Never leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

impl EntityId {
    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Dense storage for one component type.
pub struct ComponentStorage<T> {
    dense: Vec<T>,
    owners: Vec<EntityId>,
    sparse: Vec<Option<usize>>,
}

impl<T> Default for ComponentStorage<T> {
    fn default() -> Self {
        Self {
            dense: Vec::new(),
            owners: Vec::new(),
            sparse: Vec::new(),
        }
    }
}

impl<T> ComponentStorage<T> {
    fn slot(&self, entity: EntityId) -> Option<usize> {
        let slot = (*self.sparse.get(entity.index as usize)?)?;
        (self.owners[slot] == entity).then_some(slot)
    }

    /// Inserts or replaces; returns the previous value.
    pub fn insert(&mut self, entity: EntityId, value: T) -> Option<T> {
        let index = entity.index as usize;
        if self.sparse.len() <= index {
            self.sparse.resize(index + 1, None);
        }
        match self.sparse[index] {
            Some(slot) if self.owners[slot] == entity => {
                Some(std::mem::replace(&mut self.dense[slot], value))
            }
            Some(slot) => {
                // Left behind by an older generation of this index.
                self.owners[slot] = entity;
                self.dense[slot] = value;
                None
            }
            None => {
                self.sparse[index] = Some(self.dense.len());
                self.dense.push(value);
                self.owners.push(entity);
                None
            }
        }
    }

    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.slot(entity).map(|slot| &self.dense[slot])
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        let slot = self.slot(entity)?;
        Some(&mut self.dense[slot])
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.slot(entity).is_some()
    }

    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        let slot = self.slot(entity)?;
        self.sparse[entity.index as usize] = None;
        let value = self.dense.swap_remove(slot);
        self.owners.swap_remove(slot);
        if let Some(moved) = self.owners.get(slot) {
            self.sparse[moved.index as usize] = Some(slot);
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Dense-order iteration.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.owners.iter().copied().zip(self.dense.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.owners.iter().copied().zip(self.dense.iter_mut())
    }
}

trait AnyStorage: Send + Sync {
    fn purge(&mut self, entity: EntityId);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static + Send + Sync> AnyStorage for ComponentStorage<T> {
    fn purge(&mut self, entity: EntityId) {
        self.remove(entity);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Alive,
    Marked,
    Free,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    state: SlotState,
}

/// Entities, their components and the world's resources.
#[derive(Default)]
pub struct World {
    slots: Vec<Slot>,
    free: Vec<u32>,
    quarantine: Vec<u32>,
    pending: Vec<EntityId>,
    storages: HashMap<TypeId, Box<dyn AnyStorage>>,
    resources: Resources,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new entity.
    pub fn create_entity(&mut self) -> EntityId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.state = SlotState::Alive;
            return EntityId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            state: SlotState::Alive,
        });
        EntityId {
            index,
            generation: 0,
        }
    }

    fn slot_of(&self, entity: EntityId) -> Option<&Slot> {
        self.slots
            .get(entity.index as usize)
            .filter(|s| s.generation == entity.generation)
    }

    /// Alive and not marked for destruction.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.slot_of(entity)
            .is_some_and(|s| s.state == SlotState::Alive)
    }

    /// Marked this tick; components remain readable until [`World::maintain`].
    pub fn is_marked(&self, entity: EntityId) -> bool {
        self.slot_of(entity)
            .is_some_and(|s| s.state == SlotState::Marked)
    }

    /// Marks an entity for removal at the next sweep.
    ///
    /// Returns `false` when the id is stale or already marked, so a caller
    /// that only emits its death event on `true` emits it exactly once.
    pub fn destroy_entity(&mut self, entity: EntityId) -> bool {
        let Some(slot) = self
            .slots
            .get_mut(entity.index as usize)
            .filter(|s| s.generation == entity.generation && s.state == SlotState::Alive)
        else {
            return false;
        };
        slot.state = SlotState::Marked;
        self.pending.push(entity);
        true
    }

    /// End-of-tick sweep. Purges every component of marked entities and
    /// rotates index quarantine. Returns how many entities were removed.
    pub fn maintain(&mut self) -> usize {
        self.free.append(&mut self.quarantine);
        let removed = self.pending.len();
        for entity in std::mem::take(&mut self.pending) {
            for storage in self.storages.values_mut() {
                storage.purge(entity);
            }
            let slot = &mut self.slots[entity.index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.state = SlotState::Free;
            self.quarantine.push(entity.index);
        }
        removed
    }

    /// Number of entities not yet swept.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state != SlotState::Free)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn storage_mut_or_default<T: 'static + Send + Sync>(&mut self) -> &mut ComponentStorage<T> {
        let storage = self
            .storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(ComponentStorage::<T>::default()));
        match storage.as_any_mut().downcast_mut::<ComponentStorage<T>>() {
            Some(s) => s,
            None => unreachable!("storage keyed by TypeId of {}", type_name::<T>()),
        }
    }

    pub fn storage<T: 'static + Send + Sync>(&self) -> Option<&ComponentStorage<T>> {
        self.storages
            .get(&TypeId::of::<T>())
            .and_then(|s| s.as_any().downcast_ref::<ComponentStorage<T>>())
    }

    pub fn storage_mut<T: 'static + Send + Sync>(&mut self) -> Option<&mut ComponentStorage<T>> {
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|s| s.as_any_mut().downcast_mut::<ComponentStorage<T>>())
    }

    /// Inserts/replaces a component. Ignored for stale or swept entities.
    pub fn insert<T: 'static + Send + Sync>(&mut self, entity: EntityId, component: T) {
        match self.slot_of(entity) {
            Some(slot) if slot.state != SlotState::Free => {}
            _ => return,
        }
        self.storage_mut_or_default::<T>().insert(entity, component);
    }

    pub fn get<T: 'static + Send + Sync>(&self, entity: EntityId) -> Option<&T> {
        self.storage::<T>()?.get(entity)
    }

    pub fn get_mut<T: 'static + Send + Sync>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.storage_mut::<T>()?.get_mut(entity)
    }

    pub fn remove<T: 'static + Send + Sync>(&mut self, entity: EntityId) -> Option<T> {
        self.storage_mut::<T>()?.remove(entity)
    }

    pub fn has<T: 'static + Send + Sync>(&self, entity: EntityId) -> bool {
        self.storage::<T>().is_some_and(|s| s.contains(entity))
    }

    /// Iterates `(entity, component)` pairs in dense order.
    pub fn query<T: 'static + Send + Sync>(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.storage::<T>().into_iter().flat_map(|s| s.iter())
    }

    pub fn query_mut<T: 'static + Send + Sync>(
        &mut self,
    ) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.storage_mut::<T>().into_iter().flat_map(|s| s.iter_mut())
    }

    /// Snapshot of the entities owning a `T`, so the caller may mutate the
    /// world while walking them.
    pub fn entities_with<T: 'static + Send + Sync>(&self) -> Vec<EntityId> {
        self.query::<T>().map(|(e, _)| e).collect()
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    pub fn insert_resource<R: 'static + Send + Sync>(&mut self, value: R) -> Option<R> {
        self.resources.insert(value)
    }

    pub fn resource<R: 'static + Send + Sync>(&self) -> Option<&R> {
        self.resources.get::<R>()
    }

    pub fn resource_mut<R: 'static + Send + Sync>(&mut self) -> Option<&mut R> {
        self.resources.get_mut::<R>()
    }
}

/// A system could not complete its step.
#[derive(Debug, Error)]
pub enum SystemFault {
    #[error("missing resource `{0}`")]
    MissingResource(&'static str),
    #[error("broken invariant: {0}")]
    Invariant(String),
}

impl SystemFault {
    pub fn missing<R>() -> Self {
        SystemFault::MissingResource(type_name::<R>())
    }
}

/// One simulation pass over the world.
pub trait System: Send {
    fn name(&self) -> &'static str;

    fn run(&mut self, world: &mut World, events: &mut EventQueue, dt: f32)
        -> Result<(), SystemFault>;
}

/// Ordered list of systems; order is registration order.
#[derive(Default)]
pub struct Schedule {
    systems: Vec<Box<dyn System>>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_system<S: System + 'static>(&mut self, system: S) -> &mut Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn with_system<S: System + 'static>(mut self, system: S) -> Self {
        self.add_system(system);
        self
    }

    pub fn system_names(&self) -> Vec<&'static str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Runs every system once. A faulting system is logged and skipped for
    /// this step; the rest still run. Returns the number of faults.
    pub fn run(&mut self, world: &mut World, events: &mut EventQueue, dt: f32) -> usize {
        let mut faults = 0;
        for system in &mut self.systems {
            if let Err(err) = system.run(world, events, dt) {
                faults += 1;
                warn!(system = system.name(), error = %err, "System fault");
            }
        }
        faults
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Hp(u32);

    #[derive(Debug, PartialEq)]
    struct Tag;

    #[test]
    fn insert_get_remove() {
        let mut world = World::new();
        let e = world.create_entity();
        world.insert(e, Hp(3));
        assert_eq!(world.get::<Hp>(e), Some(&Hp(3)));
        assert!(world.has::<Hp>(e));
        assert!(!world.has::<Tag>(e));
        world.get_mut::<Hp>(e).unwrap().0 = 5;
        assert_eq!(world.remove::<Hp>(e), Some(Hp(5)));
        assert_eq!(world.get::<Hp>(e), None);
    }

    #[test]
    fn swap_remove_keeps_sparse_index_consistent() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();
        let c = world.create_entity();
        world.insert(a, Hp(1));
        world.insert(b, Hp(2));
        world.insert(c, Hp(3));
        world.remove::<Hp>(a);
        assert_eq!(world.get::<Hp>(c), Some(&Hp(3)));
        assert_eq!(world.get::<Hp>(b), Some(&Hp(2)));
        let owners: Vec<_> = world.entities_with::<Hp>();
        assert_eq!(owners.len(), 2);
    }

    #[test]
    fn destroy_is_deferred_and_reported_once() {
        let mut world = World::new();
        let e = world.create_entity();
        world.insert(e, Hp(1));
        assert!(world.destroy_entity(e));
        assert!(!world.destroy_entity(e));
        assert!(world.is_marked(e));
        assert!(!world.is_alive(e));
        // Still readable until the sweep.
        assert_eq!(world.get::<Hp>(e), Some(&Hp(1)));
        assert_eq!(world.maintain(), 1);
        assert_eq!(world.get::<Hp>(e), None);
        assert!(!world.destroy_entity(e));
    }

    #[test]
    fn index_is_quarantined_for_one_sweep() {
        let mut world = World::new();
        let e = world.create_entity();
        world.destroy_entity(e);
        world.maintain();

        let fresh = world.create_entity();
        assert_ne!(fresh.index(), e.index());

        world.maintain();
        let reused = world.create_entity();
        assert_eq!(reused.index(), e.index());
        assert_eq!(reused.generation(), e.generation() + 1);
        assert!(!world.is_alive(e));
        assert!(world.is_alive(reused));
    }

    #[test]
    fn stale_id_does_not_see_new_components() {
        let mut world = World::new();
        let old = world.create_entity();
        world.destroy_entity(old);
        world.maintain();
        world.maintain();
        let new = world.create_entity();
        world.insert(new, Hp(9));
        assert_eq!(world.get::<Hp>(old), None);
        world.insert(old, Hp(1));
        assert_eq!(world.get::<Hp>(new), Some(&Hp(9)));
    }

    struct Failing;
    impl System for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn run(&mut self, _: &mut World, _: &mut EventQueue, _: f32) -> Result<(), SystemFault> {
            Err(SystemFault::Invariant("boom".into()))
        }
    }

    struct Counter;
    impl System for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }
        fn run(
            &mut self,
            world: &mut World,
            _: &mut EventQueue,
            _: f32,
        ) -> Result<(), SystemFault> {
            let hp = world
                .resource_mut::<Hp>()
                .ok_or_else(SystemFault::missing::<Hp>)?;
            hp.0 += 1;
            Ok(())
        }
    }

    #[test]
    fn fault_does_not_stop_later_systems() {
        let mut world = World::new();
        world.insert_resource(Hp(0));
        let mut events = EventQueue::default();
        let mut schedule = Schedule::new().with_system(Failing).with_system(Counter);
        assert_eq!(schedule.system_names(), vec!["failing", "counter"]);
        assert_eq!(schedule.run(&mut world, &mut events, 0.1), 1);
        assert_eq!(world.resource::<Hp>(), Some(&Hp(1)));
    }
}
