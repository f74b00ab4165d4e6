//! Packet definitions.
//!
//! Every packet is an 8-byte header followed by a fixed-layout payload:
//!
//! ```text
//! offset  size  field
//! 0       1     type tag (PacketType)
//! 1       1     reserved, always 0
//! 2       2     total size in bytes (header + payload)
//! 4       4     sequence number
//! 8       ..    payload, packed (no implicit padding)
//! ```
//!
//! All multi-byte fields are big-endian. Coordinates, velocities and speeds
//! are [`Fixed`] (Q16.16); ids, health, damage and score are `u32`; enums and
//! flags are one byte. Text fields have a fixed width and are zero-padded.

use std::fmt;

use crate::math::Vec2;

/// Size of the fixed packet header.
pub const HEADER_SIZE: usize = 8;
/// Width of the player name field.
pub const NAME_LEN: usize = 32;
/// Width of the chat text field.
pub const CHAT_LEN: usize = 256;

/// Packet type tag. The set is closed: any other tag is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PacketType {
    ChatMessage = 0x01,
    PlayerMove = 0x02,
    NewPlayer = 0x03,
    PlayerInfo = 0x04,
    Position = 0x05,
    EnemySpawn = 0x06,
    EnemyMove = 0x07,
    EnemyDeath = 0x08,
    PlayerShoot = 0x09,
    ProjectileSpawn = 0x0A,
    ProjectileHit = 0x0B,
    ProjectileDestroy = 0x0C,
    GameStart = 0x0D,
    GameEnd = 0x0E,
    PlayerDisconnect = 0x0F,
    Heartbeat = 0x10,
    EnemyHit = 0x11,
    PlayerHit = 0x12,
    PlayerDeath = 0x13,
    PlayerInput = 0x14,
}

/// Which side may send a packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    ToServer,
    ToClient,
    Both,
}

impl PacketType {
    pub const ALL: [PacketType; 20] = [
        PacketType::ChatMessage,
        PacketType::PlayerMove,
        PacketType::NewPlayer,
        PacketType::PlayerInfo,
        PacketType::Position,
        PacketType::EnemySpawn,
        PacketType::EnemyMove,
        PacketType::EnemyDeath,
        PacketType::PlayerShoot,
        PacketType::ProjectileSpawn,
        PacketType::ProjectileHit,
        PacketType::ProjectileDestroy,
        PacketType::GameStart,
        PacketType::GameEnd,
        PacketType::PlayerDisconnect,
        PacketType::Heartbeat,
        PacketType::EnemyHit,
        PacketType::PlayerHit,
        PacketType::PlayerDeath,
        PacketType::PlayerInput,
    ];

    pub const fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.tag() == tag)
    }

    /// Payload size in bytes, excluding the header.
    pub const fn payload_len(self) -> usize {
        match self {
            PacketType::ChatMessage => 4 + 4 + CHAT_LEN,
            PacketType::PlayerMove => 4 + 4 + 4,
            PacketType::NewPlayer => 4 + 4 + 4 + 4 + 4,
            PacketType::PlayerInfo => NAME_LEN,
            PacketType::Position => 4 + 4,
            PacketType::EnemySpawn => 4 + 1 + 4 * 4 + 4 + 4,
            PacketType::EnemyMove => 4 + 4 * 4,
            PacketType::EnemyDeath => 4 + 4 + 4 + 4 + 4,
            PacketType::PlayerShoot => 4 + 4 + 1,
            PacketType::ProjectileSpawn => 4 + 1 + 4 + 1 + 4 * 4 + 4,
            PacketType::ProjectileHit => 4 + 4 + 1 + 4 + 4,
            PacketType::ProjectileDestroy => 4 + 4 + 4,
            PacketType::GameStart => 4,
            PacketType::GameEnd => 4,
            PacketType::PlayerDisconnect => 4,
            PacketType::Heartbeat => 4,
            PacketType::EnemyHit => 4 + 4 + 4 + 4 + 4,
            PacketType::PlayerHit => 4 + 4 + 4 + 4 + 4,
            PacketType::PlayerDeath => 4 + 4 + 4,
            PacketType::PlayerInput => 1,
        }
    }

    /// Total packet size on the wire.
    pub const fn wire_len(self) -> usize {
        HEADER_SIZE + self.payload_len()
    }

    pub const fn flow(self) -> Flow {
        match self {
            PacketType::PlayerInfo
            | PacketType::Position
            | PacketType::PlayerShoot
            | PacketType::PlayerInput => Flow::ToServer,
            PacketType::ChatMessage | PacketType::PlayerDisconnect | PacketType::Heartbeat => {
                Flow::Both
            }
            _ => Flow::ToClient,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            PacketType::ChatMessage => "ChatMessage",
            PacketType::PlayerMove => "PlayerMove",
            PacketType::NewPlayer => "NewPlayer",
            PacketType::PlayerInfo => "PlayerInfo",
            PacketType::Position => "Position",
            PacketType::EnemySpawn => "EnemySpawn",
            PacketType::EnemyMove => "EnemyMove",
            PacketType::EnemyDeath => "EnemyDeath",
            PacketType::PlayerShoot => "PlayerShoot",
            PacketType::ProjectileSpawn => "ProjectileSpawn",
            PacketType::ProjectileHit => "ProjectileHit",
            PacketType::ProjectileDestroy => "ProjectileDestroy",
            PacketType::GameStart => "GameStart",
            PacketType::GameEnd => "GameEnd",
            PacketType::PlayerDisconnect => "PlayerDisconnect",
            PacketType::Heartbeat => "Heartbeat",
            PacketType::EnemyHit => "EnemyHit",
            PacketType::PlayerHit => "PlayerHit",
            PacketType::PlayerDeath => "PlayerDeath",
            PacketType::PlayerInput => "PlayerInput",
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Enemy archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EnemyType {
    BasicFighter = 0x01,
}

impl EnemyType {
    pub fn from_wire(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(EnemyType::BasicFighter),
            _ => None,
        }
    }
}

/// Projectile archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProjectileType {
    PlayerBasic = 0x01,
    EnemyBasic = 0x02,
}

impl ProjectileType {
    pub fn from_wire(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(ProjectileType::PlayerBasic),
            0x02 => Some(ProjectileType::EnemyBasic),
            _ => None,
        }
    }

    /// Whether projectiles of this type damage players.
    pub fn is_hostile(self) -> bool {
        self == ProjectileType::EnemyBasic
    }
}

/// Discrete movement input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MoveDirection {
    Up = 0x01,
    Down = 0x02,
    Left = 0x03,
    Right = 0x04,
}

impl MoveDirection {
    pub fn from_wire(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(MoveDirection::Up),
            0x02 => Some(MoveDirection::Down),
            0x03 => Some(MoveDirection::Left),
            0x04 => Some(MoveDirection::Right),
            _ => None,
        }
    }

    /// Unit step in play-field axes.
    pub fn unit(self) -> Vec2 {
        match self {
            MoveDirection::Up => Vec2::new(0.0, -1.0),
            MoveDirection::Down => Vec2::new(0.0, 1.0),
            MoveDirection::Left => Vec2::new(-1.0, 0.0),
            MoveDirection::Right => Vec2::new(1.0, 0.0),
        }
    }
}

/// Signed Q16.16 fixed-point number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Fixed(pub i32);

impl Fixed {
    pub const FRAC_BITS: u32 = 16;
    const SCALE: f64 = (1u32 << Self::FRAC_BITS) as f64;

    /// Rounds to the nearest representable value; saturates out of range
    /// and maps NaN to zero.
    pub fn from_f32(v: f32) -> Self {
        Self((f64::from(v) * Self::SCALE).round() as i32)
    }

    pub fn to_f32(self) -> f32 {
        (f64::from(self.0) / Self::SCALE) as f32
    }

    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl From<f32> for Fixed {
    fn from(v: f32) -> Self {
        Self::from_f32(v)
    }
}

/// Fixed-width, zero-padded UTF-8 text.
///
/// Invariant: the bytes before the first NUL are valid UTF-8 and every byte
/// after it is NUL.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedStr<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> FixedStr<N> {
    /// Builds the field from `s`, cutting at the first NUL and truncating to
    /// `N` bytes on a character boundary.
    pub fn new(s: &str) -> Self {
        let s = s.split('\0').next().unwrap_or_default();
        let mut end = s.len().min(N);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = [0u8; N];
        bytes[..end].copy_from_slice(&s.as_bytes()[..end]);
        Self { bytes }
    }

    /// Validates raw wire bytes.
    pub fn from_wire(bytes: [u8; N]) -> Option<Self> {
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(N);
        if bytes[len..].iter().any(|&b| b != 0) {
            return None;
        }
        std::str::from_utf8(&bytes[..len]).ok()?;
        Some(Self { bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.iter().position(|&b| b == 0).unwrap_or(N)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len()]).unwrap_or_default()
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.bytes
    }
}

impl<const N: usize> Default for FixedStr<N> {
    fn default() -> Self {
        Self { bytes: [0u8; N] }
    }
}

impl<const N: usize> fmt::Debug for FixedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<const N: usize> fmt::Display for FixedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type PlayerName = FixedStr<NAME_LEN>;
pub type ChatText = FixedStr<CHAT_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatMessage {
    pub player_id: u32,
    /// Sender wall clock, seconds since the Unix epoch (truncated).
    pub timestamp: u32,
    pub text: ChatText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerMove {
    pub player_id: u32,
    pub x: Fixed,
    pub y: Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewPlayer {
    pub player_id: u32,
    pub x: Fixed,
    pub y: Fixed,
    pub speed: Fixed,
    pub max_health: u32,
}

/// Join request; resent later to rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerInfo {
    pub name: PlayerName,
}

/// Client-reported position of its own ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionUpdate {
    pub x: Fixed,
    pub y: Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnemySpawn {
    pub enemy_id: u32,
    pub enemy_type: EnemyType,
    pub x: Fixed,
    pub y: Fixed,
    pub vx: Fixed,
    pub vy: Fixed,
    pub health: u32,
    pub max_health: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnemyMove {
    pub enemy_id: u32,
    pub x: Fixed,
    pub y: Fixed,
    pub vx: Fixed,
    pub vy: Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnemyDeath {
    pub enemy_id: u32,
    pub x: Fixed,
    pub y: Fixed,
    /// Player credited with the kill.
    pub killer_id: u32,
    pub score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerShoot {
    pub x: Fixed,
    pub y: Fixed,
    pub projectile_type: ProjectileType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectileSpawn {
    pub projectile_id: u32,
    pub projectile_type: ProjectileType,
    pub owner_id: u32,
    pub hostile: bool,
    pub x: Fixed,
    pub y: Fixed,
    pub vx: Fixed,
    pub vy: Fixed,
    pub damage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectileHit {
    pub projectile_id: u32,
    pub target_id: u32,
    pub target_is_player: bool,
    pub x: Fixed,
    pub y: Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectileDestroy {
    pub projectile_id: u32,
    pub x: Fixed,
    pub y: Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameStart {
    pub player_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameEnd {
    pub total_score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerDisconnect {
    pub player_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub player_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnemyHit {
    pub enemy_id: u32,
    pub x: Fixed,
    pub y: Fixed,
    pub damage: u32,
    /// Health left after the hit.
    pub health: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerHit {
    pub player_id: u32,
    pub x: Fixed,
    pub y: Fixed,
    pub damage: u32,
    pub health: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerDeath {
    pub player_id: u32,
    pub x: Fixed,
    pub y: Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerInput {
    pub direction: MoveDirection,
}

/// Decoded payload, one variant per packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    ChatMessage(ChatMessage),
    PlayerMove(PlayerMove),
    NewPlayer(NewPlayer),
    PlayerInfo(PlayerInfo),
    Position(PositionUpdate),
    EnemySpawn(EnemySpawn),
    EnemyMove(EnemyMove),
    EnemyDeath(EnemyDeath),
    PlayerShoot(PlayerShoot),
    ProjectileSpawn(ProjectileSpawn),
    ProjectileHit(ProjectileHit),
    ProjectileDestroy(ProjectileDestroy),
    GameStart(GameStart),
    GameEnd(GameEnd),
    PlayerDisconnect(PlayerDisconnect),
    Heartbeat(Heartbeat),
    EnemyHit(EnemyHit),
    PlayerHit(PlayerHit),
    PlayerDeath(PlayerDeath),
    PlayerInput(PlayerInput),
}

impl Message {
    pub const fn packet_type(&self) -> PacketType {
        match self {
            Message::ChatMessage(_) => PacketType::ChatMessage,
            Message::PlayerMove(_) => PacketType::PlayerMove,
            Message::NewPlayer(_) => PacketType::NewPlayer,
            Message::PlayerInfo(_) => PacketType::PlayerInfo,
            Message::Position(_) => PacketType::Position,
            Message::EnemySpawn(_) => PacketType::EnemySpawn,
            Message::EnemyMove(_) => PacketType::EnemyMove,
            Message::EnemyDeath(_) => PacketType::EnemyDeath,
            Message::PlayerShoot(_) => PacketType::PlayerShoot,
            Message::ProjectileSpawn(_) => PacketType::ProjectileSpawn,
            Message::ProjectileHit(_) => PacketType::ProjectileHit,
            Message::ProjectileDestroy(_) => PacketType::ProjectileDestroy,
            Message::GameStart(_) => PacketType::GameStart,
            Message::GameEnd(_) => PacketType::GameEnd,
            Message::PlayerDisconnect(_) => PacketType::PlayerDisconnect,
            Message::Heartbeat(_) => PacketType::Heartbeat,
            Message::EnemyHit(_) => PacketType::EnemyHit,
            Message::PlayerHit(_) => PacketType::PlayerHit,
            Message::PlayerDeath(_) => PacketType::PlayerDeath,
            Message::PlayerInput(_) => PacketType::PlayerInput,
        }
    }
}

/// A full packet: header sequence plus payload. The type tag and size are
/// derived from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub sequence: u32,
    pub message: Message,
}

impl Packet {
    pub const fn new(sequence: u32, message: Message) -> Self {
        Self { sequence, message }
    }

    pub const fn packet_type(&self) -> PacketType {
        self.message.packet_type()
    }
}

impl From<Message> for Packet {
    fn from(message: Message) -> Self {
        Self::new(0, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_unique_and_resolve() {
        for t in PacketType::ALL {
            assert_eq!(PacketType::from_tag(t.tag()), Some(t));
        }
        assert_eq!(PacketType::from_tag(0x00), None);
        assert_eq!(PacketType::from_tag(0x15), None);
    }

    #[test]
    fn fixed_point_precision() {
        let v = Fixed::from_f32(1199.75);
        assert_eq!(v.to_f32(), 1199.75);
        assert_eq!(Fixed::from_f32(-80.5).raw(), -80 * 65536 - 32768);
        assert_eq!(Fixed::from_f32(f32::NAN), Fixed(0));
        assert_eq!(Fixed::from_f32(1.0e9), Fixed(i32::MAX));
    }

    #[test]
    fn fixed_str_truncates_on_char_boundary() {
        // 31 ASCII bytes followed by a 2-byte character: the character does not fit.
        let s = format!("{}é", "a".repeat(31));
        let name = PlayerName::new(&s);
        assert_eq!(name.len(), 31);
        assert_eq!(name.as_str(), "a".repeat(31));
    }

    #[test]
    fn fixed_str_cuts_at_nul() {
        let name = PlayerName::new("ab\0cd");
        assert_eq!(name.as_str(), "ab");
        assert!(PlayerName::from_wire(*name.as_bytes()).is_some());
    }

    #[test]
    fn fixed_str_rejects_garbage_after_terminator() {
        let mut raw = [0u8; NAME_LEN];
        raw[0] = b'a';
        raw[5] = b'b';
        assert!(PlayerName::from_wire(raw).is_none());

        let mut bad_utf8 = [0u8; NAME_LEN];
        bad_utf8[0] = 0xFF;
        assert!(PlayerName::from_wire(bad_utf8).is_none());
    }
}
