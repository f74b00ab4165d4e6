//! Configuration.
//!
//! Loads game configuration from JSON strings/files. Every field has a
//! default, so `{}` is a valid config and files only need the overrides.

use std::{path::Path, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Root configuration shared by client/server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Server listen address, e.g. `127.0.0.1:40000`.
    #[serde(default = "default_server_addr")]
    pub server_addr: String,
    /// Fixed simulation tick rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Silence after which a session is dropped.
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    /// Wall-clock budget for draining the inbound mailbox each tick.
    #[serde(default = "default_inbound_budget_ms")]
    pub inbound_budget_ms: u64,
    #[serde(default = "default_max_packets_per_tick")]
    pub max_packets_per_tick: usize,
    /// Bound of the receive task → tick channel.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
    /// Player name (client only).
    #[serde(default = "default_player_name")]
    pub player_name: String,
    #[serde(default)]
    pub gameplay: GameplayConfig,
}

fn default_server_addr() -> String {
    "127.0.0.1:40000".to_string()
}

fn default_tick_hz() -> u32 {
    60
}

fn default_max_clients() -> usize {
    4
}

fn default_heartbeat_timeout_ms() -> u64 {
    5_000
}

fn default_inbound_budget_ms() -> u64 {
    4
}

fn default_max_packets_per_tick() -> usize {
    256
}

fn default_mailbox_capacity() -> usize {
    1024
}

fn default_player_name() -> String {
    "Player".to_string()
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            server_addr: default_server_addr(),
            tick_hz: default_tick_hz(),
            max_clients: default_max_clients(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            inbound_budget_ms: default_inbound_budget_ms(),
            max_packets_per_tick: default_max_packets_per_tick(),
            mailbox_capacity: default_mailbox_capacity(),
            player_name: default_player_name(),
            gameplay: GameplayConfig::default(),
        }
    }
}

impl GameConfig {
    /// Parses config from JSON and rejects values the simulation cannot run
    /// with.
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.gameplay.validate()?;
        Ok(cfg)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    /// Fixed step duration; a zero rate is treated as 1 Hz.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz.max(1)))
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn inbound_budget(&self) -> Duration {
        Duration::from_millis(self.inbound_budget_ms)
    }
}

/// Gameplay tunables. Distances are play-field pixels, times are seconds,
/// speeds are pixels per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplayConfig {
    pub field_width: f32,
    pub field_height: f32,
    /// Room outside the field where enemies spawn and objects survive.
    pub field_margin: f32,

    pub player_speed: f32,
    pub player_max_health: u32,
    pub player_spawn_x: f32,
    pub player_half_size: [f32; 2],

    pub enemy_speed: f32,
    pub enemy_max_health: u32,
    pub enemy_score: u32,
    pub enemy_spawn_x: f32,
    pub enemy_spawn_interval: f32,
    pub enemy_fire_interval: f32,
    pub enemy_half_size: [f32; 2],

    pub projectile_speed: f32,
    pub player_projectile_damage: u32,
    pub enemy_projectile_damage: u32,
    pub projectile_lifetime: f32,
    pub projectile_half_size: [f32; 2],

    /// Damage dealt to both sides when a player rams an enemy.
    pub collision_damage: u32,
    pub shoot_cooldown: f32,
    /// Period of the PlayerMove/EnemyMove position snapshots.
    pub snapshot_interval: f32,
    pub rng_seed: u64,
}

impl GameplayConfig {
    /// The play field must have a positive, finite size.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, v) in [
            ("field_width", self.field_width),
            ("field_height", self.field_height),
        ] {
            anyhow::ensure!(v.is_finite() && v > 0.0, "gameplay.{name} must be positive, got {v}");
        }
        anyhow::ensure!(
            self.field_margin.is_finite() && self.field_margin >= 0.0,
            "gameplay.field_margin must not be negative, got {}",
            self.field_margin
        );
        Ok(())
    }
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            field_width: 1200.0,
            field_height: 750.0,
            field_margin: 30.0,

            player_speed: 400.0,
            player_max_health: 100,
            player_spawn_x: 100.0,
            player_half_size: [32.0, 16.0],

            enemy_speed: -80.0,
            enemy_max_health: 30,
            enemy_score: 100,
            enemy_spawn_x: 1220.0,
            enemy_spawn_interval: 5.0,
            enemy_fire_interval: 3.0,
            enemy_half_size: [32.0, 32.0],

            projectile_speed: 100.0,
            player_projectile_damage: 10,
            enemy_projectile_damage: 10,
            projectile_lifetime: 15.0,
            projectile_half_size: [8.0, 4.0],

            collision_damage: 20,
            shoot_cooldown: 0.25,
            snapshot_interval: 0.1,
            rng_seed: 0x5EED,
        }
    }
}
