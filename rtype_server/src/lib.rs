//! `rtype_server`
//!
//! Authoritative game server:
//! - Fixed timestep simulation loop
//! - Sessions keyed by UDP endpoint, expired by heartbeat timeout
//! - Table-driven dispatch of client packets
//! - Event broadcast with per-client sequence numbers
//!
//! Networking model:
//! - One UDP socket; every datagram is one packet
//! - A receive task feeds a bounded mailbox; the tick never blocks on I/O

pub mod dispatch;
pub mod game;
pub mod server;
pub mod session;
pub mod transport;

pub use server::{bind_ephemeral, GameServer, TickReport};
