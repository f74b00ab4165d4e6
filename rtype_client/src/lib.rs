//! `rtype_client`
//!
//! Headless client:
//! - Join handshake and outbound commands over UDP
//! - Input state to packet translation
//! - Replica world mirrored from server messages
//! - Interpolation for remote players
//!
//! Rendering, audio and device input are left to a frontend.

pub mod client;
pub mod input;
pub mod interp;
pub mod replica;

pub use client::GameClient;
