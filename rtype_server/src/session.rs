//! Client sessions.
//!
//! A session is created by a join (`PlayerInfo` from an unknown endpoint)
//! and ends on an explicit `PlayerDisconnect` or when nothing was heard from
//! the endpoint for the heartbeat timeout.

use std::{
    collections::{BTreeMap, HashMap},
    net::SocketAddr,
    time::{Duration, Instant},
};

use rtype_shared::{ecs::EntityId, packet::PlayerName};

#[derive(Debug, Clone)]
pub struct Session {
    pub endpoint: SocketAddr,
    pub player_id: u32,
    /// Player entity; stays set after death and then no longer resolves.
    pub entity: Option<EntityId>,
    /// Spawn lane the ship was placed in.
    pub lane: usize,
    pub name: PlayerName,
    pub last_heard: Instant,
    /// Sequence stamped on the next packet sent to this client.
    pub outbound_sequence: u32,
    pub last_inbound_sequence: Option<u32>,
}

impl Session {
    pub fn new(endpoint: SocketAddr, player_id: u32, name: PlayerName, now: Instant) -> Self {
        Self {
            endpoint,
            player_id,
            entity: None,
            lane: 0,
            name,
            last_heard: now,
            outbound_sequence: 0,
            last_inbound_sequence: None,
        }
    }

    pub fn next_sequence(&mut self) -> u32 {
        let seq = self.outbound_sequence;
        self.outbound_sequence = seq.wrapping_add(1);
        seq
    }

    /// Refreshes liveness.
    pub fn touch(&mut self, now: Instant, sequence: u32) {
        self.last_heard = self.last_heard.max(now);
        self.last_inbound_sequence = Some(sequence);
    }

    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_heard) > timeout
    }
}

/// Live sessions, iterated in join order (player id order).
#[derive(Debug, Default)]
pub struct Sessions {
    by_player: BTreeMap<u32, Session>,
    by_endpoint: HashMap<SocketAddr, u32>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session, replacing any previous one for the same endpoint.
    pub fn insert(&mut self, session: Session) {
        if let Some(old) = self.by_endpoint.insert(session.endpoint, session.player_id) {
            self.by_player.remove(&old);
        }
        self.by_player.insert(session.player_id, session);
    }

    pub fn get(&self, endpoint: &SocketAddr) -> Option<&Session> {
        self.by_endpoint
            .get(endpoint)
            .and_then(|id| self.by_player.get(id))
    }

    pub fn get_mut(&mut self, endpoint: &SocketAddr) -> Option<&mut Session> {
        let id = self.by_endpoint.get(endpoint)?;
        self.by_player.get_mut(id)
    }

    pub fn by_player_id(&self, player_id: u32) -> Option<&Session> {
        self.by_player.get(&player_id)
    }

    pub fn remove(&mut self, endpoint: &SocketAddr) -> Option<Session> {
        let id = self.by_endpoint.remove(endpoint)?;
        self.by_player.remove(&id)
    }

    pub fn contains(&self, endpoint: &SocketAddr) -> bool {
        self.by_endpoint.contains_key(endpoint)
    }

    pub fn len(&self) -> usize {
        self.by_player.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_player.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.by_player.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.by_player.values_mut()
    }

    /// Removes and returns every session silent for longer than `timeout`.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> Vec<Session> {
        let stale: Vec<SocketAddr> = self
            .iter()
            .filter(|s| s.is_expired(now, timeout))
            .map(|s| s.endpoint)
            .collect();
        stale.iter().filter_map(|ep| self.remove(ep)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn lookup_by_endpoint_and_id() {
        let now = Instant::now();
        let mut sessions = Sessions::new();
        sessions.insert(Session::new(addr(1), 7, PlayerName::new("a"), now));
        assert_eq!(sessions.get(&addr(1)).map(|s| s.player_id), Some(7));
        assert!(sessions.by_player_id(7).is_some());
        assert!(sessions.get(&addr(2)).is_none());
        assert_eq!(sessions.remove(&addr(1)).map(|s| s.player_id), Some(7));
        assert!(sessions.is_empty());
    }

    #[test]
    fn sequences_increase_per_session() {
        let mut s = Session::new(addr(1), 1, PlayerName::new("a"), Instant::now());
        assert_eq!(s.next_sequence(), 0);
        assert_eq!(s.next_sequence(), 1);
    }

    #[test]
    fn expire_removes_only_silent_sessions() {
        let t0 = Instant::now();
        let mut sessions = Sessions::new();
        sessions.insert(Session::new(addr(1), 1, PlayerName::new("a"), t0));
        sessions.insert(Session::new(addr(2), 2, PlayerName::new("b"), t0));
        sessions
            .get_mut(&addr(2))
            .unwrap()
            .touch(t0 + Duration::from_secs(4), 0);

        let gone = sessions.expire(t0 + Duration::from_secs(6), Duration::from_secs(5));
        assert_eq!(gone.len(), 1);
        assert_eq!(gone[0].player_id, 1);
        assert_eq!(sessions.len(), 1);
        assert!(sessions.expire(t0 + Duration::from_secs(6), Duration::from_secs(5)).is_empty());
    }
}
