//! Session bookkeeping for the tile world server
//!
//! A session ties a pre-issued token to a player id and to the network
//! address the player was last heard from. This module handles:
//! - Id allocation, recycling ids of departed players first-in first-out
//! - Address refresh on every accepted message (client restarts, NAT rebinding)
//! - Inactivity tracking and timeout removal
//!
//! Authentication happens before a session is created; this module only
//! sees tokens that were already verified.

use log::{debug, info};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A verified token bound to a player
#[derive(Debug, Clone)]
pub struct Session {
    /// Player id, stable for the session's lifetime
    pub player_id: u32,
    pub token: String,
    /// Account the token was issued for
    pub username: String,
    /// Where replies and snapshots are sent
    pub addr: SocketAddr,
    /// Last time any accepted message arrived
    pub last_seen: Instant,
}

impl Session {
    /// Returns true if nothing was heard within `timeout` before `now`
    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }
}

/// All live sessions, indexed by player id and by token
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: BTreeMap<u32, Session>,
    tokens: HashMap<String, u32>,
    free_ids: VecDeque<u32>,
    next_id: u32,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    /// Player id bound to `token`, if a session exists
    pub fn lookup(&self, token: &str) -> Option<u32> {
        self.tokens.get(token).copied()
    }

    /// Creates a session for a verified token and returns its player id
    ///
    /// Ids freed by timed-out sessions are reused oldest first. Calling this
    /// for a token that already has a session returns the existing id.
    pub fn create(
        &mut self,
        token: &str,
        username: &str,
        addr: SocketAddr,
        now: Instant,
    ) -> u32 {
        if let Some(id) = self.lookup(token) {
            self.touch(id, addr, now);
            return id;
        }

        let player_id = self.allocate_id();
        self.tokens.insert(token.to_string(), player_id);
        self.sessions.insert(
            player_id,
            Session {
                player_id,
                token: token.to_string(),
                username: username.to_string(),
                addr,
                last_seen: now,
            },
        );
        info!("Session {} for {} created from {}", player_id, username, addr);
        player_id
    }

    /// Marks a session as alive and refreshes its address
    ///
    /// Returns false if the id has no session.
    pub fn touch(&mut self, player_id: u32, addr: SocketAddr, now: Instant) -> bool {
        match self.sessions.get_mut(&player_id) {
            Some(session) => {
                if session.addr != addr {
                    debug!(
                        "Session {} moved from {} to {}",
                        player_id, session.addr, addr
                    );
                    session.addr = addr;
                }
                session.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Removes every session idle for longer than `timeout`
    ///
    /// The removed sessions are returned so the caller can drop their players
    /// and notify everyone else. Their ids go back on the free list.
    pub fn sweep_timeouts(&mut self, now: Instant, timeout: Duration) -> Vec<Session> {
        let expired: Vec<u32> = self
            .sessions
            .values()
            .filter(|s| s.is_timed_out(now, timeout))
            .map(|s| s.player_id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.remove(id))
            .inspect(|s| info!("Session {} ({}) timed out", s.player_id, s.username))
            .collect()
    }

    /// Ends a session and recycles its id
    pub fn remove(&mut self, player_id: u32) -> Option<Session> {
        let session = self.sessions.remove(&player_id)?;
        self.tokens.remove(&session.token);
        self.free_ids.push_back(player_id);
        Some(session)
    }

    pub fn get(&self, player_id: u32) -> Option<&Session> {
        self.sessions.get(&player_id)
    }

    pub fn addr_of(&self, player_id: u32) -> Option<SocketAddr> {
        self.sessions.get(&player_id).map(|s| s.addr)
    }

    /// Every player id with its current address, in id order
    pub fn addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.sessions
            .values()
            .map(|s| (s.player_id, s.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn allocate_id(&mut self) -> u32 {
        if let Some(id) = self.free_ids.pop_front() {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
