//! Component types.
//!
//! Plain data attached to entities. Server and client share the gameplay
//! components; sprite, animation and background components are only used by
//! the client replica.

use crate::{
    math::{Rect, Vec2},
    packet::{EnemyType, MoveDirection, PlayerName, ProjectileType},
};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position(pub Vec2);

/// Pixels per second.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity(pub Vec2);

/// Movement speed for input-driven entities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Speed(pub f32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale(pub Vec2);

impl Default for Scale {
    fn default() -> Self {
        Self(Vec2::new(1.0, 1.0))
    }
}

/// Axis-aligned hitbox relative to the entity position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub offset: Vec2,
    pub half_extents: Vec2,
}

impl Collider {
    pub fn new(half_width: f32, half_height: f32) -> Self {
        Self {
            offset: Vec2::ZERO,
            half_extents: Vec2::new(half_width, half_height),
        }
    }

    pub fn from_half_size(half: [f32; 2]) -> Self {
        Self::new(half[0], half[1])
    }

    /// World-space bounds, or `None` for a degenerate collider (non-finite
    /// or negative extents) that must not take part in collision.
    pub fn bounds(&self, position: Vec2) -> Option<Rect> {
        let center = position.add(self.offset);
        let valid = center.is_finite()
            && self.half_extents.is_finite()
            && self.half_extents.x >= 0.0
            && self.half_extents.y >= 0.0;
        valid.then(|| Rect::from_center(center, self.half_extents))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    pub current: u32,
    pub max: u32,
}

impl Health {
    pub fn full(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Applies damage, saturating at zero. Returns the remaining health.
    pub fn damage(&mut self, amount: u32) -> u32 {
        self.current = self.current.saturating_sub(amount);
        self.current
    }

    pub fn is_dead(&self) -> bool {
        self.current == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Score(pub u32);

/// Texture region to draw. `frame_size` is the size of one animation cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub texture: &'static str,
    pub frame_size: Vec2,
    pub source: Rect,
}

impl Sprite {
    pub fn new(texture: &'static str, frame_width: f32, frame_height: f32) -> Self {
        Self {
            texture,
            frame_size: Vec2::new(frame_width, frame_height),
            source: Rect::new(Vec2::ZERO, Vec2::new(frame_width, frame_height)),
        }
    }
}

/// Frame-strip animation over a sprite sheet laid out row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteAnimation {
    pub columns: u32,
    pub start_frame: u32,
    pub end_frame: u32,
    pub current_frame: u32,
    /// Seconds per frame.
    pub frame_time: f32,
    pub timer: f32,
    pub playing: bool,
    pub looping: bool,
}

impl SpriteAnimation {
    pub fn looping(columns: u32, start_frame: u32, end_frame: u32, frame_time: f32) -> Self {
        Self {
            columns: columns.max(1),
            start_frame,
            end_frame,
            current_frame: start_frame,
            frame_time,
            timer: 0.0,
            playing: true,
            looping: true,
        }
    }

    pub fn once(columns: u32, start_frame: u32, end_frame: u32, frame_time: f32) -> Self {
        Self {
            looping: false,
            ..Self::looping(columns, start_frame, end_frame, frame_time)
        }
    }

    /// Advances the timer. Returns `true` when the frame changed.
    pub fn advance(&mut self, dt: f32) -> bool {
        if !self.playing {
            return false;
        }
        self.timer += dt;
        if self.timer < self.frame_time {
            return false;
        }
        self.timer = 0.0;
        self.current_frame += 1;
        if self.current_frame > self.end_frame {
            if self.looping {
                self.current_frame = self.start_frame;
            } else {
                self.current_frame = self.end_frame;
                self.playing = false;
            }
        }
        true
    }

    /// Source rectangle of the current frame.
    pub fn frame_rect(&self, frame_size: Vec2) -> Rect {
        let col = self.current_frame % self.columns;
        let row = self.current_frame / self.columns;
        let min = Vec2::new(col as f32 * frame_size.x, row as f32 * frame_size.y);
        Rect::new(min, min.add(frame_size))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderMeta {
    /// Draw order, lower first.
    pub layer: i32,
    pub visible: bool,
}

impl Default for RenderMeta {
    fn default() -> Self {
        Self {
            layer: 0,
            visible: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub player_id: u32,
    pub name: PlayerName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enemy {
    pub enemy_id: u32,
    pub kind: EnemyType,
}

/// Marks the entity controlled by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocalPlayer;

/// Scrolling background tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Background {
    /// Horizontal pixels per second, negative scrolls left.
    pub scroll_speed: f32,
    pub width: f32,
}

/// Fire-rate limiter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShootCooldown {
    pub interval: f32,
    pub remaining: f32,
}

impl ShootCooldown {
    pub fn ready(interval: f32) -> Self {
        Self {
            interval,
            remaining: 0.0,
        }
    }

    /// Starts cooled down by a full interval.
    pub fn charging(interval: f32) -> Self {
        Self {
            interval,
            remaining: interval,
        }
    }

    pub fn tick(&mut self, dt: f32) {
        self.remaining = (self.remaining - dt).max(0.0);
    }

    pub fn is_ready(&self) -> bool {
        self.remaining <= 0.0
    }

    /// Consumes the shot if ready.
    pub fn try_fire(&mut self) -> bool {
        if !self.is_ready() {
            return false;
        }
        self.remaining = self.interval;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projectile {
    pub projectile_id: u32,
    pub kind: ProjectileType,
    /// Network id of the shooter: a player id, or an enemy id when hostile.
    pub owner_id: u32,
    pub damage: u32,
    /// Hostile projectiles hurt players; the others hurt enemies.
    pub hostile: bool,
    /// Seconds left before expiry.
    pub lifetime: f32,
}

/// Movement requests decoded this tick, consumed by the input system.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingInput {
    /// Last reported absolute position; later reports overwrite earlier ones.
    pub target: Option<Vec2>,
    pub directions: Vec<MoveDirection>,
}

impl PendingInput {
    /// Queues a direction once per tick.
    pub fn push_direction(&mut self, direction: MoveDirection) {
        if !self.directions.contains(&direction) {
            self.directions.push(direction);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_none() && self.directions.is_empty()
    }
}
