//! Gameplay events.
//!
//! Systems and dispatch handlers push [`GameEvent`]s while a tick runs; the
//! server drains them once per tick and turns each into exactly one outbound
//! [`Message`].
//! - Insertion order is broadcast order.
//! - Within a batch, nothing may refer to an object before its spawn event.

use crate::{
    math::Vec2,
    packet::{
        ChatMessage, ChatText, EnemyDeath, EnemyHit, EnemyMove, EnemySpawn, EnemyType, Fixed,
        GameEnd, GameStart, Message, NewPlayer, PlayerDeath, PlayerDisconnect, PlayerHit,
        PlayerMove, ProjectileDestroy, ProjectileHit, ProjectileSpawn, ProjectileType,
    },
};

/// Something the simulation did that clients must hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    PlayerJoined {
        player_id: u32,
        position: Vec2,
        speed: f32,
        max_health: u32,
    },
    PlayerMoved {
        player_id: u32,
        position: Vec2,
    },
    PlayerHit {
        player_id: u32,
        position: Vec2,
        damage: u32,
        health: u32,
    },
    PlayerDied {
        player_id: u32,
        position: Vec2,
    },
    PlayerDisconnected {
        player_id: u32,
    },
    EnemySpawned {
        enemy_id: u32,
        kind: EnemyType,
        position: Vec2,
        velocity: Vec2,
        health: u32,
        max_health: u32,
    },
    EnemyMoved {
        enemy_id: u32,
        position: Vec2,
        velocity: Vec2,
    },
    EnemyHit {
        enemy_id: u32,
        position: Vec2,
        damage: u32,
        health: u32,
    },
    EnemyDied {
        enemy_id: u32,
        position: Vec2,
        killer_id: u32,
        score: u32,
    },
    ProjectileSpawned {
        projectile_id: u32,
        kind: ProjectileType,
        owner_id: u32,
        hostile: bool,
        position: Vec2,
        velocity: Vec2,
        damage: u32,
    },
    ProjectileHit {
        projectile_id: u32,
        target_id: u32,
        target_is_player: bool,
        position: Vec2,
    },
    ProjectileDestroyed {
        projectile_id: u32,
        position: Vec2,
    },
    GameStarted {
        player_count: u32,
    },
    GameEnded {
        total_score: u32,
    },
    ChatPosted {
        player_id: u32,
        timestamp: u32,
        text: ChatText,
    },
}

/// Network-visible object an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Player(u32),
    Enemy(u32),
    Projectile(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Spawn,
    Update,
    Destroy,
}

fn fx(v: f32) -> Fixed {
    Fixed::from_f32(v)
}

impl GameEvent {
    /// Wire form of the event. Every kind has exactly one message.
    pub fn to_message(&self) -> Message {
        match *self {
            GameEvent::PlayerJoined {
                player_id,
                position,
                speed,
                max_health,
            } => Message::NewPlayer(NewPlayer {
                player_id,
                x: fx(position.x),
                y: fx(position.y),
                speed: fx(speed),
                max_health,
            }),
            GameEvent::PlayerMoved {
                player_id,
                position,
            } => Message::PlayerMove(PlayerMove {
                player_id,
                x: fx(position.x),
                y: fx(position.y),
            }),
            GameEvent::PlayerHit {
                player_id,
                position,
                damage,
                health,
            } => Message::PlayerHit(PlayerHit {
                player_id,
                x: fx(position.x),
                y: fx(position.y),
                damage,
                health,
            }),
            GameEvent::PlayerDied {
                player_id,
                position,
            } => Message::PlayerDeath(PlayerDeath {
                player_id,
                x: fx(position.x),
                y: fx(position.y),
            }),
            GameEvent::PlayerDisconnected { player_id } => {
                Message::PlayerDisconnect(PlayerDisconnect { player_id })
            }
            GameEvent::EnemySpawned {
                enemy_id,
                kind,
                position,
                velocity,
                health,
                max_health,
            } => Message::EnemySpawn(EnemySpawn {
                enemy_id,
                enemy_type: kind,
                x: fx(position.x),
                y: fx(position.y),
                vx: fx(velocity.x),
                vy: fx(velocity.y),
                health,
                max_health,
            }),
            GameEvent::EnemyMoved {
                enemy_id,
                position,
                velocity,
            } => Message::EnemyMove(EnemyMove {
                enemy_id,
                x: fx(position.x),
                y: fx(position.y),
                vx: fx(velocity.x),
                vy: fx(velocity.y),
            }),
            GameEvent::EnemyHit {
                enemy_id,
                position,
                damage,
                health,
            } => Message::EnemyHit(EnemyHit {
                enemy_id,
                x: fx(position.x),
                y: fx(position.y),
                damage,
                health,
            }),
            GameEvent::EnemyDied {
                enemy_id,
                position,
                killer_id,
                score,
            } => Message::EnemyDeath(EnemyDeath {
                enemy_id,
                x: fx(position.x),
                y: fx(position.y),
                killer_id,
                score,
            }),
            GameEvent::ProjectileSpawned {
                projectile_id,
                kind,
                owner_id,
                hostile,
                position,
                velocity,
                damage,
            } => Message::ProjectileSpawn(ProjectileSpawn {
                projectile_id,
                projectile_type: kind,
                owner_id,
                hostile,
                x: fx(position.x),
                y: fx(position.y),
                vx: fx(velocity.x),
                vy: fx(velocity.y),
                damage,
            }),
            GameEvent::ProjectileHit {
                projectile_id,
                target_id,
                target_is_player,
                position,
            } => Message::ProjectileHit(ProjectileHit {
                projectile_id,
                target_id,
                target_is_player,
                x: fx(position.x),
                y: fx(position.y),
            }),
            GameEvent::ProjectileDestroyed {
                projectile_id,
                position,
            } => Message::ProjectileDestroy(ProjectileDestroy {
                projectile_id,
                x: fx(position.x),
                y: fx(position.y),
            }),
            GameEvent::GameStarted { player_count } => {
                Message::GameStart(GameStart { player_count })
            }
            GameEvent::GameEnded { total_score } => Message::GameEnd(GameEnd { total_score }),
            GameEvent::ChatPosted {
                player_id,
                timestamp,
                text,
            } => Message::ChatMessage(ChatMessage {
                player_id,
                timestamp,
                text,
            }),
        }
    }

    /// The object this event is about and what it does to it.
    pub fn lifecycle(&self) -> Option<(ObjectRef, Lifecycle)> {
        use GameEvent as E;
        use Lifecycle::{Destroy, Spawn, Update};
        let entry = match *self {
            E::PlayerJoined { player_id, .. } => (ObjectRef::Player(player_id), Spawn),
            E::PlayerMoved { player_id, .. } | E::PlayerHit { player_id, .. } => {
                (ObjectRef::Player(player_id), Update)
            }
            E::PlayerDied { player_id, .. } | E::PlayerDisconnected { player_id } => {
                (ObjectRef::Player(player_id), Destroy)
            }
            E::EnemySpawned { enemy_id, .. } => (ObjectRef::Enemy(enemy_id), Spawn),
            E::EnemyMoved { enemy_id, .. } | E::EnemyHit { enemy_id, .. } => {
                (ObjectRef::Enemy(enemy_id), Update)
            }
            E::EnemyDied { enemy_id, .. } => (ObjectRef::Enemy(enemy_id), Destroy),
            E::ProjectileSpawned { projectile_id, .. } => {
                (ObjectRef::Projectile(projectile_id), Spawn)
            }
            E::ProjectileHit { projectile_id, .. } => {
                (ObjectRef::Projectile(projectile_id), Update)
            }
            E::ProjectileDestroyed { projectile_id, .. } => {
                (ObjectRef::Projectile(projectile_id), Destroy)
            }
            E::GameStarted { .. } | E::GameEnded { .. } | E::ChatPosted { .. } => return None,
        };
        Some(entry)
    }
}

/// First object in `batch` that is referenced before its own spawn event.
pub fn ordering_violation(batch: &[GameEvent]) -> Option<ObjectRef> {
    let mut seen = std::collections::HashSet::new();
    for (object, stage) in batch.iter().filter_map(GameEvent::lifecycle) {
        match stage {
            Lifecycle::Spawn => {
                if seen.contains(&object) {
                    return Some(object);
                }
            }
            Lifecycle::Update | Lifecycle::Destroy => {
                seen.insert(object);
            }
        }
    }
    None
}

/// Per-tick event buffer.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<GameEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes an event into the queue.
    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Takes every queued event in insertion order, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<GameEvent> {
        let batch = std::mem::take(&mut self.events);
        debug_assert!(
            ordering_violation(&batch).is_none(),
            "event for {:?} precedes its spawn",
            ordering_violation(&batch)
        );
        batch
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Queued events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.iter()
    }
}
