//! Input handling.
//!
//! Device polling lives outside this crate. A frontend fills an
//! [`InputState`] once per frame and this module turns it into the packets
//! the server understands: one `PlayerInput` per held direction and a
//! `PlayerShoot` while fire is held (the server enforces the fire rate).

use bitflags::bitflags;
use rtype_shared::{
    math::Vec2,
    packet::{Fixed, Message, MoveDirection, PlayerInput, PlayerShoot, ProjectileType},
};

bitflags! {
    /// Buttons held during one frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InputState: u8 {
        const UP = 1 << 0;
        const DOWN = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        const FIRE = 1 << 4;
    }
}

impl InputState {
    /// Parses a key string such as `"wd "`: `wasd` for movement, space or
    /// `f` for fire. Unknown characters are ignored.
    pub fn from_keys(keys: &str) -> Self {
        keys.chars().fold(Self::empty(), |acc, c| {
            acc | match c.to_ascii_lowercase() {
                'w' => Self::UP,
                's' => Self::DOWN,
                'a' => Self::LEFT,
                'd' => Self::RIGHT,
                ' ' | 'f' => Self::FIRE,
                _ => Self::empty(),
            }
        })
    }

    /// Held directions, opposite pairs cancelled.
    pub fn directions(self) -> Vec<MoveDirection> {
        let mut out = Vec::new();
        match (self.contains(Self::UP), self.contains(Self::DOWN)) {
            (true, false) => out.push(MoveDirection::Up),
            (false, true) => out.push(MoveDirection::Down),
            _ => {}
        }
        match (self.contains(Self::LEFT), self.contains(Self::RIGHT)) {
            (true, false) => out.push(MoveDirection::Left),
            (false, true) => out.push(MoveDirection::Right),
            _ => {}
        }
        out
    }
}

/// Turns one frame of input into outbound messages. `position` is the last
/// known position of the local ship, used as the shot origin hint.
pub fn build_commands(input: InputState, position: Vec2) -> Vec<Message> {
    let mut out: Vec<Message> = input
        .directions()
        .into_iter()
        .map(|direction| Message::PlayerInput(PlayerInput { direction }))
        .collect();
    if input.contains(InputState::FIRE) {
        out.push(Message::PlayerShoot(PlayerShoot {
            x: Fixed::from_f32(position.x),
            y: Fixed::from_f32(position.y),
            projectile_type: ProjectileType::PlayerBasic,
        }));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_flags() {
        let input = InputState::from_keys("Wd x");
        assert_eq!(input, InputState::UP | InputState::RIGHT | InputState::FIRE);
    }

    #[test]
    fn opposite_directions_cancel() {
        let input = InputState::UP | InputState::DOWN | InputState::LEFT;
        assert_eq!(input.directions(), vec![MoveDirection::Left]);
    }

    #[test]
    fn fire_adds_a_shot() {
        let cmds = build_commands(InputState::DOWN | InputState::FIRE, Vec2::new(1.0, 2.0));
        assert_eq!(cmds.len(), 2);
        assert_eq!(
            cmds[0],
            Message::PlayerInput(PlayerInput {
                direction: MoveDirection::Down
            })
        );
        assert!(matches!(
            cmds[1],
            Message::PlayerShoot(PlayerShoot {
                projectile_type: ProjectileType::PlayerBasic,
                ..
            })
        ));
        assert!(build_commands(InputState::empty(), Vec2::ZERO).is_empty());
    }
}
