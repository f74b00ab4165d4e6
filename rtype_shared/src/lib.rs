//! `rtype_shared`
//!
//! Code shared by the game server and client.
//!
//! Design goals:
//! - Deterministic simulation: fixed step, seeded RNG, dense-order iteration.
//! - Clear separation of concerns (wire codec, ecs, systems, events, config).
//! - Typed errors for protocol and simulation faults.
//! - No `unsafe`.

pub mod codec;
pub mod collision;
pub mod components;
pub mod config;
pub mod ecs;
pub mod event;
pub mod math;
pub mod packet;
pub mod resources;
pub mod spawn;
pub mod systems;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::codec::*;
    pub use crate::config::*;
    pub use crate::ecs::*;
    pub use crate::event::*;
    pub use crate::math::*;
    pub use crate::packet::*;
}
