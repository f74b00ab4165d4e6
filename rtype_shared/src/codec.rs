//! Binary codec for [`Packet`].
//!
//! Encoding is infallible and always produces exactly
//! [`PacketType::wire_len`] bytes. Decoding validates the whole buffer before
//! returning anything:
//! - header first (tag, reserved byte, declared size);
//! - then exact length (no truncation, no trailing bytes);
//! - then every enum, flag and text field.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::packet::*;

/// Why an inbound buffer could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedPacket {
    #[error("{what} needs {expected} bytes, got {actual}")]
    Truncated {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("unknown packet type tag {0:#04x}")]
    UnknownType(u8),
    #[error("reserved header byte is {0:#04x}")]
    ReservedByte(u8),
    #[error("{kind} declares {declared} bytes, layout is {expected}")]
    SizeMismatch {
        kind: PacketType,
        declared: u16,
        expected: usize,
    },
    #[error("{kind} followed by {extra} trailing bytes")]
    TrailingBytes { kind: PacketType, extra: usize },
    #[error("field `{field}` holds out-of-range value {value:#04x}")]
    InvalidEnum { field: &'static str, value: u8 },
    #[error("field `{field}` is not zero-padded UTF-8")]
    InvalidText { field: &'static str },
}

/// Decoded header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: PacketType,
    pub size: u16,
    pub sequence: u32,
}

impl Header {
    /// Parses and validates the header alone.
    pub fn parse(buf: &[u8]) -> Result<Self, MalformedPacket> {
        if buf.len() < HEADER_SIZE {
            return Err(MalformedPacket::Truncated {
                what: "header",
                expected: HEADER_SIZE,
                actual: buf.len(),
            });
        }
        let mut r = &buf[..HEADER_SIZE];
        let tag = r.get_u8();
        let kind = PacketType::from_tag(tag).ok_or(MalformedPacket::UnknownType(tag))?;
        let reserved = r.get_u8();
        if reserved != 0 {
            return Err(MalformedPacket::ReservedByte(reserved));
        }
        let size = r.get_u16();
        if usize::from(size) != kind.wire_len() {
            return Err(MalformedPacket::SizeMismatch {
                kind,
                declared: size,
                expected: kind.wire_len(),
            });
        }
        let sequence = r.get_u32();
        Ok(Self {
            kind,
            size,
            sequence,
        })
    }
}

/// Overwrites the sequence number of an already encoded packet.
///
/// Buffers shorter than a header are left untouched.
pub fn stamp_sequence(buf: &mut [u8], sequence: u32) {
    if let Some(field) = buf.get_mut(4..HEADER_SIZE) {
        field.copy_from_slice(&sequence.to_be_bytes());
    }
}

impl Packet {
    /// Encodes into a fresh buffer of exactly `wire_len` bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.packet_type().wire_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Appends the encoded packet to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        let kind = self.packet_type();
        buf.reserve(kind.wire_len());
        buf.put_u8(kind.tag());
        buf.put_u8(0);
        // wire_len tops out at a few hundred bytes.
        buf.put_u16(kind.wire_len() as u16);
        buf.put_u32(self.sequence);
        put_message(buf, &self.message);
    }

    /// Decodes one packet occupying the whole of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, MalformedPacket> {
        let header = Header::parse(buf)?;
        let expected = header.kind.wire_len();
        if buf.len() < expected {
            return Err(MalformedPacket::Truncated {
                what: header.kind.name(),
                expected,
                actual: buf.len(),
            });
        }
        if buf.len() > expected {
            return Err(MalformedPacket::TrailingBytes {
                kind: header.kind,
                extra: buf.len() - expected,
            });
        }
        let mut r = &buf[HEADER_SIZE..];
        let message = get_message(header.kind, &mut r)?;
        Ok(Self {
            sequence: header.sequence,
            message,
        })
    }
}

fn put_fixed(buf: &mut BytesMut, v: Fixed) {
    buf.put_i32(v.raw());
}

fn put_bool(buf: &mut BytesMut, v: bool) {
    buf.put_u8(u8::from(v));
}

fn put_message(buf: &mut BytesMut, message: &Message) {
    match message {
        Message::ChatMessage(m) => {
            buf.put_u32(m.player_id);
            buf.put_u32(m.timestamp);
            buf.put_slice(m.text.as_bytes());
        }
        Message::PlayerMove(m) => {
            buf.put_u32(m.player_id);
            put_fixed(buf, m.x);
            put_fixed(buf, m.y);
        }
        Message::NewPlayer(m) => {
            buf.put_u32(m.player_id);
            put_fixed(buf, m.x);
            put_fixed(buf, m.y);
            put_fixed(buf, m.speed);
            buf.put_u32(m.max_health);
        }
        Message::PlayerInfo(m) => buf.put_slice(m.name.as_bytes()),
        Message::Position(m) => {
            put_fixed(buf, m.x);
            put_fixed(buf, m.y);
        }
        Message::EnemySpawn(m) => {
            buf.put_u32(m.enemy_id);
            buf.put_u8(m.enemy_type as u8);
            put_fixed(buf, m.x);
            put_fixed(buf, m.y);
            put_fixed(buf, m.vx);
            put_fixed(buf, m.vy);
            buf.put_u32(m.health);
            buf.put_u32(m.max_health);
        }
        Message::EnemyMove(m) => {
            buf.put_u32(m.enemy_id);
            put_fixed(buf, m.x);
            put_fixed(buf, m.y);
            put_fixed(buf, m.vx);
            put_fixed(buf, m.vy);
        }
        Message::EnemyDeath(m) => {
            buf.put_u32(m.enemy_id);
            put_fixed(buf, m.x);
            put_fixed(buf, m.y);
            buf.put_u32(m.killer_id);
            buf.put_u32(m.score);
        }
        Message::PlayerShoot(m) => {
            put_fixed(buf, m.x);
            put_fixed(buf, m.y);
            buf.put_u8(m.projectile_type as u8);
        }
        Message::ProjectileSpawn(m) => {
            buf.put_u32(m.projectile_id);
            buf.put_u8(m.projectile_type as u8);
            buf.put_u32(m.owner_id);
            put_bool(buf, m.hostile);
            put_fixed(buf, m.x);
            put_fixed(buf, m.y);
            put_fixed(buf, m.vx);
            put_fixed(buf, m.vy);
            buf.put_u32(m.damage);
        }
        Message::ProjectileHit(m) => {
            buf.put_u32(m.projectile_id);
            buf.put_u32(m.target_id);
            put_bool(buf, m.target_is_player);
            put_fixed(buf, m.x);
            put_fixed(buf, m.y);
        }
        Message::ProjectileDestroy(m) => {
            buf.put_u32(m.projectile_id);
            put_fixed(buf, m.x);
            put_fixed(buf, m.y);
        }
        Message::GameStart(m) => buf.put_u32(m.player_count),
        Message::GameEnd(m) => buf.put_u32(m.total_score),
        Message::PlayerDisconnect(m) => buf.put_u32(m.player_id),
        Message::Heartbeat(m) => buf.put_u32(m.player_id),
        Message::EnemyHit(m) => {
            buf.put_u32(m.enemy_id);
            put_fixed(buf, m.x);
            put_fixed(buf, m.y);
            buf.put_u32(m.damage);
            buf.put_u32(m.health);
        }
        Message::PlayerHit(m) => {
            buf.put_u32(m.player_id);
            put_fixed(buf, m.x);
            put_fixed(buf, m.y);
            buf.put_u32(m.damage);
            buf.put_u32(m.health);
        }
        Message::PlayerDeath(m) => {
            buf.put_u32(m.player_id);
            put_fixed(buf, m.x);
            put_fixed(buf, m.y);
        }
        Message::PlayerInput(m) => buf.put_u8(m.direction as u8),
    }
}

// The caller has checked the exact length, so the fixed-size reads below
// cannot run past the end of `r`.

fn get_fixed(r: &mut &[u8]) -> Fixed {
    Fixed(r.get_i32())
}

fn get_bool(r: &mut &[u8], field: &'static str) -> Result<bool, MalformedPacket> {
    match r.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        value => Err(MalformedPacket::InvalidEnum { field, value }),
    }
}

fn get_text<const N: usize>(
    r: &mut &[u8],
    field: &'static str,
) -> Result<FixedStr<N>, MalformedPacket> {
    let mut raw = [0u8; N];
    r.copy_to_slice(&mut raw);
    FixedStr::from_wire(raw).ok_or(MalformedPacket::InvalidText { field })
}

fn get_enemy_type(r: &mut &[u8]) -> Result<EnemyType, MalformedPacket> {
    let value = r.get_u8();
    EnemyType::from_wire(value).ok_or(MalformedPacket::InvalidEnum {
        field: "enemy_type",
        value,
    })
}

fn get_projectile_type(r: &mut &[u8]) -> Result<ProjectileType, MalformedPacket> {
    let value = r.get_u8();
    ProjectileType::from_wire(value).ok_or(MalformedPacket::InvalidEnum {
        field: "projectile_type",
        value,
    })
}

fn get_message(kind: PacketType, r: &mut &[u8]) -> Result<Message, MalformedPacket> {
    let message = match kind {
        PacketType::ChatMessage => Message::ChatMessage(ChatMessage {
            player_id: r.get_u32(),
            timestamp: r.get_u32(),
            text: get_text(r, "text")?,
        }),
        PacketType::PlayerMove => Message::PlayerMove(PlayerMove {
            player_id: r.get_u32(),
            x: get_fixed(r),
            y: get_fixed(r),
        }),
        PacketType::NewPlayer => Message::NewPlayer(NewPlayer {
            player_id: r.get_u32(),
            x: get_fixed(r),
            y: get_fixed(r),
            speed: get_fixed(r),
            max_health: r.get_u32(),
        }),
        PacketType::PlayerInfo => Message::PlayerInfo(PlayerInfo {
            name: get_text(r, "name")?,
        }),
        PacketType::Position => Message::Position(PositionUpdate {
            x: get_fixed(r),
            y: get_fixed(r),
        }),
        PacketType::EnemySpawn => Message::EnemySpawn(EnemySpawn {
            enemy_id: r.get_u32(),
            enemy_type: get_enemy_type(r)?,
            x: get_fixed(r),
            y: get_fixed(r),
            vx: get_fixed(r),
            vy: get_fixed(r),
            health: r.get_u32(),
            max_health: r.get_u32(),
        }),
        PacketType::EnemyMove => Message::EnemyMove(EnemyMove {
            enemy_id: r.get_u32(),
            x: get_fixed(r),
            y: get_fixed(r),
            vx: get_fixed(r),
            vy: get_fixed(r),
        }),
        PacketType::EnemyDeath => Message::EnemyDeath(EnemyDeath {
            enemy_id: r.get_u32(),
            x: get_fixed(r),
            y: get_fixed(r),
            killer_id: r.get_u32(),
            score: r.get_u32(),
        }),
        PacketType::PlayerShoot => Message::PlayerShoot(PlayerShoot {
            x: get_fixed(r),
            y: get_fixed(r),
            projectile_type: get_projectile_type(r)?,
        }),
        PacketType::ProjectileSpawn => Message::ProjectileSpawn(ProjectileSpawn {
            projectile_id: r.get_u32(),
            projectile_type: get_projectile_type(r)?,
            owner_id: r.get_u32(),
            hostile: get_bool(r, "hostile")?,
            x: get_fixed(r),
            y: get_fixed(r),
            vx: get_fixed(r),
            vy: get_fixed(r),
            damage: r.get_u32(),
        }),
        PacketType::ProjectileHit => Message::ProjectileHit(ProjectileHit {
            projectile_id: r.get_u32(),
            target_id: r.get_u32(),
            target_is_player: get_bool(r, "target_is_player")?,
            x: get_fixed(r),
            y: get_fixed(r),
        }),
        PacketType::ProjectileDestroy => Message::ProjectileDestroy(ProjectileDestroy {
            projectile_id: r.get_u32(),
            x: get_fixed(r),
            y: get_fixed(r),
        }),
        PacketType::GameStart => Message::GameStart(GameStart {
            player_count: r.get_u32(),
        }),
        PacketType::GameEnd => Message::GameEnd(GameEnd {
            total_score: r.get_u32(),
        }),
        PacketType::PlayerDisconnect => Message::PlayerDisconnect(PlayerDisconnect {
            player_id: r.get_u32(),
        }),
        PacketType::Heartbeat => Message::Heartbeat(Heartbeat {
            player_id: r.get_u32(),
        }),
        PacketType::EnemyHit => Message::EnemyHit(EnemyHit {
            enemy_id: r.get_u32(),
            x: get_fixed(r),
            y: get_fixed(r),
            damage: r.get_u32(),
            health: r.get_u32(),
        }),
        PacketType::PlayerHit => Message::PlayerHit(PlayerHit {
            player_id: r.get_u32(),
            x: get_fixed(r),
            y: get_fixed(r),
            damage: r.get_u32(),
            health: r.get_u32(),
        }),
        PacketType::PlayerDeath => Message::PlayerDeath(PlayerDeath {
            player_id: r.get_u32(),
            x: get_fixed(r),
            y: get_fixed(r),
        }),
        PacketType::PlayerInput => {
            let value = r.get_u8();
            let direction = MoveDirection::from_wire(value).ok_or(MalformedPacket::InvalidEnum {
                field: "direction",
                value,
            })?;
            Message::PlayerInput(PlayerInput { direction })
        }
    };
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(v: f32) -> Fixed {
        Fixed::from_f32(v)
    }

    fn one_of_each() -> Vec<Message> {
        vec![
            Message::ChatMessage(ChatMessage {
                player_id: 3,
                timestamp: 1_700_000_000,
                text: ChatText::new("gg"),
            }),
            Message::PlayerMove(PlayerMove { player_id: 1, x: f(10.0), y: f(-2.5) }),
            Message::NewPlayer(NewPlayer {
                player_id: 2,
                x: f(100.0),
                y: f(375.0),
                speed: f(400.0),
                max_health: 100,
            }),
            Message::PlayerInfo(PlayerInfo { name: PlayerName::new("ripley") }),
            Message::Position(PositionUpdate { x: f(1.0), y: f(2.0) }),
            Message::EnemySpawn(EnemySpawn {
                enemy_id: 7,
                enemy_type: EnemyType::BasicFighter,
                x: f(1220.0),
                y: f(300.0),
                vx: f(-80.0),
                vy: f(0.0),
                health: 30,
                max_health: 30,
            }),
            Message::EnemyMove(EnemyMove {
                enemy_id: 7,
                x: f(1200.0),
                y: f(300.0),
                vx: f(-80.0),
                vy: f(0.0),
            }),
            Message::EnemyDeath(EnemyDeath {
                enemy_id: 7,
                x: f(600.0),
                y: f(300.0),
                killer_id: 1,
                score: 100,
            }),
            Message::PlayerShoot(PlayerShoot {
                x: f(50.0),
                y: f(60.0),
                projectile_type: ProjectileType::PlayerBasic,
            }),
            Message::ProjectileSpawn(ProjectileSpawn {
                projectile_id: 4,
                projectile_type: ProjectileType::EnemyBasic,
                owner_id: 7,
                hostile: true,
                x: f(1.0),
                y: f(2.0),
                vx: f(-100.0),
                vy: f(0.0),
                damage: 10,
            }),
            Message::ProjectileHit(ProjectileHit {
                projectile_id: 4,
                target_id: 1,
                target_is_player: true,
                x: f(3.0),
                y: f(4.0),
            }),
            Message::ProjectileDestroy(ProjectileDestroy {
                projectile_id: 4,
                x: f(0.0),
                y: f(0.0),
            }),
            Message::GameStart(GameStart { player_count: 2 }),
            Message::GameEnd(GameEnd { total_score: 900 }),
            Message::PlayerDisconnect(PlayerDisconnect { player_id: 2 }),
            Message::Heartbeat(Heartbeat { player_id: 2 }),
            Message::EnemyHit(EnemyHit {
                enemy_id: 7,
                x: f(5.0),
                y: f(6.0),
                damage: 10,
                health: 20,
            }),
            Message::PlayerHit(PlayerHit {
                player_id: 1,
                x: f(5.0),
                y: f(6.0),
                damage: 20,
                health: 80,
            }),
            Message::PlayerDeath(PlayerDeath { player_id: 1, x: f(5.0), y: f(6.0) }),
            Message::PlayerInput(PlayerInput { direction: MoveDirection::Left }),
        ]
    }

    #[test]
    fn every_type_encodes_to_its_fixed_size_and_decodes_back() {
        let messages = one_of_each();
        assert_eq!(messages.len(), PacketType::ALL.len());
        for (seq, message) in messages.into_iter().enumerate() {
            let packet = Packet::new(seq as u32, message);
            let bytes = packet.encode();
            assert_eq!(bytes.len(), packet.packet_type().wire_len(), "{}", packet.packet_type());
            assert_eq!(Packet::decode(&bytes), Ok(packet));
        }
    }

    fn round_trips(message: Message) {
        let packet = Packet::new(u32::MAX, message);
        assert_eq!(Packet::decode(&packet.encode()), Ok(packet));
    }

    #[test]
    fn boundary_values_round_trip() {
        for direction in [
            MoveDirection::Up,
            MoveDirection::Down,
            MoveDirection::Left,
            MoveDirection::Right,
        ] {
            round_trips(Message::PlayerInput(PlayerInput { direction }));
        }

        let (lo, hi) = (Fixed(i32::MIN), Fixed(i32::MAX));
        for projectile_type in [ProjectileType::PlayerBasic, ProjectileType::EnemyBasic] {
            round_trips(Message::PlayerShoot(PlayerShoot {
                x: lo,
                y: hi,
                projectile_type,
            }));
            for hostile in [false, true] {
                round_trips(Message::ProjectileSpawn(ProjectileSpawn {
                    projectile_id: u32::MAX,
                    projectile_type,
                    owner_id: u32::MAX,
                    hostile,
                    x: lo,
                    y: hi,
                    vx: hi,
                    vy: lo,
                    damage: u32::MAX,
                }));
            }
        }

        round_trips(Message::EnemySpawn(EnemySpawn {
            enemy_id: u32::MAX,
            enemy_type: EnemyType::BasicFighter,
            x: lo,
            y: hi,
            vx: lo,
            vy: hi,
            health: u32::MAX,
            max_health: u32::MAX,
        }));
        round_trips(Message::PlayerHit(PlayerHit {
            player_id: u32::MAX,
            x: hi,
            y: lo,
            damage: u32::MAX,
            health: u32::MAX,
        }));
        round_trips(Message::NewPlayer(NewPlayer {
            player_id: 0,
            x: lo,
            y: hi,
            speed: Fixed(0),
            max_health: u32::MAX,
        }));
    }

    #[test]
    fn full_width_text_round_trips_without_terminator() {
        let name = PlayerName::new(&"n".repeat(NAME_LEN));
        assert_eq!(name.len(), NAME_LEN);
        assert!(name.as_bytes().iter().all(|&b| b != 0));
        round_trips(Message::PlayerInfo(PlayerInfo { name }));

        let text = ChatText::new(&"é".repeat(CHAT_LEN / 2));
        assert_eq!(text.len(), CHAT_LEN);
        round_trips(Message::ChatMessage(ChatMessage {
            player_id: u32::MAX,
            timestamp: u32::MAX,
            text,
        }));
    }

    #[test]
    fn enum_tag_past_the_last_variant_is_rejected() {
        let input = Packet::from(Message::PlayerInput(PlayerInput {
            direction: MoveDirection::Right,
        }));
        let mut bytes = input.encode().to_vec();
        bytes[HEADER_SIZE] = 0x05;
        assert_eq!(
            Packet::decode(&bytes),
            Err(MalformedPacket::InvalidEnum { field: "direction", value: 0x05 })
        );

        let shot = Packet::from(Message::PlayerShoot(PlayerShoot {
            x: f(0.0),
            y: f(0.0),
            projectile_type: ProjectileType::EnemyBasic,
        }));
        let mut bytes = shot.encode().to_vec();
        bytes[HEADER_SIZE + 8] = 0x03;
        assert_eq!(
            Packet::decode(&bytes),
            Err(MalformedPacket::InvalidEnum { field: "projectile_type", value: 0x03 })
        );

        let spawn = Packet::from(Message::EnemySpawn(EnemySpawn {
            enemy_id: 1,
            enemy_type: EnemyType::BasicFighter,
            x: f(0.0),
            y: f(0.0),
            vx: f(0.0),
            vy: f(0.0),
            health: 1,
            max_health: 1,
        }));
        let mut bytes = spawn.encode().to_vec();
        bytes[HEADER_SIZE + 4] = 0x02;
        assert_eq!(
            Packet::decode(&bytes),
            Err(MalformedPacket::InvalidEnum { field: "enemy_type", value: 0x02 })
        );
    }

    #[test]
    fn header_golden_bytes() {
        let packet = Packet::new(
            0x0102_0304,
            Message::Position(PositionUpdate { x: f(1.0), y: f(-1.0) }),
        );
        let bytes = packet.encode();
        assert_eq!(
            &bytes[..],
            &[
                0x05, 0x00, 0x00, 0x10, // tag, reserved, size = 16
                0x01, 0x02, 0x03, 0x04, // sequence
                0x00, 0x01, 0x00, 0x00, // x = 1.0
                0xFF, 0xFF, 0x00, 0x00, // y = -1.0
            ]
        );
    }

    #[test]
    fn decode_rejects_truncated_and_trailing() {
        let bytes = Packet::from(Message::GameStart(GameStart { player_count: 1 })).encode();
        assert!(matches!(
            Packet::decode(&bytes[..5]),
            Err(MalformedPacket::Truncated { what: "header", .. })
        ));
        assert!(matches!(
            Packet::decode(&bytes[..bytes.len() - 1]),
            Err(MalformedPacket::Truncated { what: "GameStart", .. })
        ));
        let mut long = bytes.to_vec();
        long.push(0);
        assert_eq!(
            Packet::decode(&long),
            Err(MalformedPacket::TrailingBytes { kind: PacketType::GameStart, extra: 1 })
        );
    }

    #[test]
    fn decode_rejects_bad_header_fields() {
        let mut bytes = Packet::from(Message::Heartbeat(Heartbeat { player_id: 9 }))
            .encode()
            .to_vec();

        let mut unknown = bytes.clone();
        unknown[0] = 0x7F;
        assert_eq!(Packet::decode(&unknown), Err(MalformedPacket::UnknownType(0x7F)));

        let mut reserved = bytes.clone();
        reserved[1] = 1;
        assert_eq!(Packet::decode(&reserved), Err(MalformedPacket::ReservedByte(1)));

        bytes[3] = 13;
        assert_eq!(
            Packet::decode(&bytes),
            Err(MalformedPacket::SizeMismatch {
                kind: PacketType::Heartbeat,
                declared: 13,
                expected: 12,
            })
        );
    }

    #[test]
    fn decode_rejects_bad_flags_and_enums() {
        let hit = Packet::from(Message::ProjectileHit(ProjectileHit {
            projectile_id: 1,
            target_id: 2,
            target_is_player: false,
            x: f(0.0),
            y: f(0.0),
        }));
        let mut bytes = hit.encode().to_vec();
        bytes[HEADER_SIZE + 8] = 2;
        assert_eq!(
            Packet::decode(&bytes),
            Err(MalformedPacket::InvalidEnum { field: "target_is_player", value: 2 })
        );

        let input = Packet::from(Message::PlayerInput(PlayerInput {
            direction: MoveDirection::Up,
        }));
        let mut bytes = input.encode().to_vec();
        bytes[HEADER_SIZE] = 0;
        assert_eq!(
            Packet::decode(&bytes),
            Err(MalformedPacket::InvalidEnum { field: "direction", value: 0 })
        );
    }

    #[test]
    fn decode_rejects_bad_text() {
        let info = Packet::from(Message::PlayerInfo(PlayerInfo { name: PlayerName::new("ab") }));
        let mut bytes = info.encode().to_vec();
        bytes[HEADER_SIZE + 4] = b'x';
        assert_eq!(
            Packet::decode(&bytes),
            Err(MalformedPacket::InvalidText { field: "name" })
        );
    }

    #[test]
    fn stamp_sequence_rewrites_only_the_sequence() {
        let packet = Packet::new(1, Message::GameEnd(GameEnd { total_score: 5 }));
        let mut bytes = packet.encode().to_vec();
        stamp_sequence(&mut bytes, 42);
        let back = Packet::decode(&bytes).expect("decode");
        assert_eq!(back.sequence, 42);
        assert_eq!(back.message, packet.message);

        let mut short = [0u8; 3];
        stamp_sequence(&mut short, 42);
        assert_eq!(short, [0u8; 3]);
    }
}
