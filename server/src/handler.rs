//! Packet dispatch and periodic jobs, independent of any socket.
//!
//! [`ServerCore`] owns every piece of mutable server state. The network
//! loop feeds it decoded packets and timer events and sends whatever
//! [`GameMessage`]s come back, so the whole server can be exercised in
//! tests without touching the network.

use crate::auth::{CredentialStore, TokenCache};
use crate::config::{ServerConfig, WorldConfig};
use crate::game::{world_time, GameState};
use crate::network::GameMessage;
use crate::persistence::{PlayerStore, SavedState};
use crate::session::SessionManager;
use log::{debug, info, warn};
use shared::{unix_time, MapSource, Packet, Vec2, SAVE_CONFIRM_MESSAGE};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

pub struct ServerCore {
    sessions: SessionManager,
    tokens: TokenCache,
    credentials: Box<dyn CredentialStore>,
    store: Box<dyn PlayerStore>,
    game: GameState,
    timeout: Duration,
}

impl ServerCore {
    pub fn new(
        config: &ServerConfig,
        world: &WorldConfig,
        maps: impl MapSource + Send + 'static,
        credentials: impl CredentialStore + 'static,
        store: impl PlayerStore + 'static,
    ) -> Self {
        Self {
            sessions: SessionManager::new(),
            tokens: TokenCache::new(config.token_cache_ttl),
            credentials: Box::new(credentials),
            store: Box::new(store),
            game: GameState::new(world, maps),
            timeout: config.timeout,
        }
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Handles one inbound packet and returns the replies to send.
    ///
    /// Packets without a valid token are dropped without any reply.
    pub fn handle_packet(
        &mut self,
        packet: Packet,
        addr: SocketAddr,
        now: Instant,
    ) -> Vec<GameMessage> {
        let mut out = Vec::new();

        let Some(token) = packet.token() else {
            warn!("Unexpected {} packet from {}", packet.kind(), addr);
            return out;
        };
        let Some(username) = self.tokens.verify(self.credentials.as_ref(), token, now) else {
            warn!("Rejected {} from {}: invalid token", packet.kind(), addr);
            return out;
        };

        let player_id = match self.sessions.lookup(token) {
            Some(id) => {
                self.sessions.touch(id, addr, now);
                if matches!(packet, Packet::Join { .. }) {
                    debug!("Player {} re-joined from {}", id, addr);
                    self.assign_id(id, addr, &mut out);
                    return out;
                }
                id
            }
            None => {
                let id = self.open_session(token, &username, addr, now);
                self.assign_id(id, addr, &mut out);
                if matches!(packet, Packet::Join { .. }) {
                    return out;
                }
                id
            }
        };

        match packet {
            Packet::Move(cmd) => {
                self.game.apply_move(player_id, &cmd, unix_time());
            }
            Packet::PortalEnter {
                target_map,
                spawn_x,
                spawn_y,
                spawn_z_index,
                ..
            } => {
                let spawn = Vec2::new(spawn_x, spawn_y);
                if self
                    .game
                    .enter_portal(player_id, &target_map, spawn, spawn_z_index, unix_time())
                {
                    out.push(GameMessage::SendPacket {
                        packet: Packet::MapSwitch {
                            map: target_map,
                            x: spawn_x,
                            y: spawn_y,
                        },
                        addr,
                    });
                }
            }
            Packet::Save(req) => {
                let state = SavedState {
                    x: req.x,
                    y: req.y,
                    direction: req.direction,
                    current_map: req.current_map,
                    z_index: req.z_index,
                };
                match self.store.save(player_id, &username, &state) {
                    Ok(()) => {
                        if let Some(player) = self.game.player_mut(player_id) {
                            player.needs_save = false;
                        }
                        info!("Saved player {} on request", player_id);
                        out.push(save_confirm(addr));
                    }
                    Err(e) => warn!("Save for player {} failed: {}", player_id, e),
                }
            }
            Packet::Join { .. } => {}
            other => warn!("Unexpected {} packet from {}", other.kind(), addr),
        }

        out
    }

    /// Runs one simulation step and builds the snapshot broadcast.
    pub fn tick(&mut self, dt: f32) -> Vec<GameMessage> {
        self.game.update(dt);

        if self.sessions.is_empty() {
            return Vec::new();
        }
        let snapshot = self.game.snapshot(world_time(unix_time()));
        vec![GameMessage::BroadcastPacket {
            packet: Packet::Update(snapshot),
            addrs: self.session_addrs(),
        }]
    }

    /// Drops timed-out sessions and tells everyone else about each one.
    pub fn sweep(&mut self, now: Instant) -> Vec<GameMessage> {
        let expired = self.sessions.sweep_timeouts(now, self.timeout);
        if expired.is_empty() {
            return Vec::new();
        }

        for session in &expired {
            if let Some(player) = self.game.remove_player(session.player_id) {
                if player.needs_save {
                    let state = player.saved_state();
                    if let Err(e) = self.store.save(player.id, &session.username, &state) {
                        warn!("Final save for player {} failed: {}", player.id, e);
                    }
                }
            }
        }

        let addrs = self.session_addrs();
        expired
            .into_iter()
            .map(|session| GameMessage::BroadcastPacket {
                packet: Packet::PlayerDisconnect {
                    player_id: session.player_id,
                },
                addrs: addrs.clone(),
            })
            .collect()
    }

    /// Persists every player with unsaved changes.
    ///
    /// Players whose save fails keep their dirty flag and are retried on the
    /// next run.
    pub fn autosave(&mut self) -> Vec<GameMessage> {
        let mut out = Vec::new();
        let mut saved = 0;
        let mut failed = 0;

        for id in self.game.dirty_players() {
            let Some(session) = self.sessions.get(id) else {
                continue;
            };
            let Some(player) = self.game.player_mut(id) else {
                continue;
            };
            match self.store.save(id, &session.username, &player.saved_state()) {
                Ok(()) => {
                    player.needs_save = false;
                    saved += 1;
                    out.push(save_confirm(session.addr));
                }
                Err(e) => {
                    failed += 1;
                    warn!("Autosave for player {} failed: {}", id, e);
                }
            }
        }

        if saved + failed > 0 {
            info!("Autosave: {} saved, {} failed", saved, failed);
        }
        out
    }

    /// Extends cached tokens with the credential service.
    pub fn refresh_tokens(&mut self, now: Instant) -> usize {
        let live = self.tokens.refresh_all(self.credentials.as_ref(), now);
        debug!("Token refresh: {} cached", live);
        live
    }

    fn open_session(
        &mut self,
        token: &str,
        username: &str,
        addr: SocketAddr,
        now: Instant,
    ) -> u32 {
        let id = self.sessions.create(token, username, addr, now);
        let saved = match self.store.load(username) {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Could not load {}: {}; using defaults", username, e);
                None
            }
        };
        let name = self
            .credentials
            .character_name(username)
            .unwrap_or_else(|| format!("Player{}", id));
        self.game.spawn_player(id, username, &name, saved, unix_time());
        id
    }

    fn assign_id(&self, player_id: u32, addr: SocketAddr, out: &mut Vec<GameMessage>) {
        if let Some(player) = self.game.player(player_id) {
            out.push(GameMessage::SendPacket {
                packet: Packet::AssignId {
                    player_id,
                    player_data: player.player_data(),
                },
                addr,
            });
        }
    }

    fn session_addrs(&self) -> Vec<SocketAddr> {
        self.sessions
            .addrs()
            .into_iter()
            .map(|(_, addr)| addr)
            .collect()
    }
}

fn save_confirm(addr: SocketAddr) -> GameMessage {
    GameMessage::SendPacket {
        packet: Packet::SaveConfirm {
            message: SAVE_CONFIRM_MESSAGE.to_string(),
        },
        addr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, StaticCredentials};
    use crate::persistence::MemoryStore;
    use shared::{CollisionMap, Direction, MoveCommand, SaveRequest, StaticMapSource};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:12345".parse().unwrap()
    }

    fn test_core(store: MemoryStore) -> ServerCore {
        let world = WorldConfig {
            default_map: "A".to_string(),
            credentials: vec![
                Credential {
                    token: "good".to_string(),
                    username: "alice".to_string(),
                    character_name: Some("Alyx".to_string()),
                },
                Credential {
                    token: "other".to_string(),
                    username: "bob".to_string(),
                    character_name: None,
                },
            ],
            enemies: Vec::new(),
            ..WorldConfig::default()
        };
        ServerCore::new(
            &ServerConfig::default(),
            &world,
            StaticMapSource::new().with_map(CollisionMap::empty("A")),
            StaticCredentials::new(&world.credentials),
            store,
        )
    }

    fn join(token: &str) -> Packet {
        Packet::Join {
            token: token.to_string(),
        }
    }

    fn assigned(messages: &[GameMessage]) -> Option<(u32, shared::PlayerData)> {
        messages.iter().find_map(|m| match m {
            GameMessage::SendPacket {
                packet:
                    Packet::AssignId {
                        player_id,
                        player_data,
                    },
                ..
            } => Some((*player_id, player_data.clone())),
            _ => None,
        })
    }

    #[test]
    fn test_invalid_token_gets_no_reply() {
        let mut core = test_core(MemoryStore::new());
        let out = core.handle_packet(join("forged"), test_addr(), Instant::now());
        assert!(out.is_empty());
        assert!(core.sessions().is_empty());

        let out = core.handle_packet(
            Packet::MapSwitch {
                map: "A".to_string(),
                x: 0.0,
                y: 0.0,
            },
            test_addr(),
            Instant::now(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_join_uses_character_name_and_saved_state() {
        let saved = SavedState {
            x: 42.0,
            y: 7.0,
            direction: Direction::Left,
            current_map: "A".to_string(),
            z_index: 2,
        };
        let mut core = test_core(MemoryStore::new().with_state("alice", saved));

        let out = core.handle_packet(join("good"), test_addr(), Instant::now());
        let (id, data) = assigned(&out).unwrap();
        assert_eq!(id, 1);
        assert_eq!(data.name, "Alyx");
        assert_eq!((data.x, data.y, data.z_index), (42.0, 7.0, 2));

        let out = core.handle_packet(join("other"), test_addr(), Instant::now());
        assert_eq!(assigned(&out).unwrap().1.name, "Player2");
    }

    #[test]
    fn test_join_replay_keeps_id_and_updates_address() {
        let mut core = test_core(MemoryStore::new());
        let now = Instant::now();
        core.handle_packet(join("good"), test_addr(), now);

        let moved: SocketAddr = "127.0.0.1:23456".parse().unwrap();
        let out = core.handle_packet(join("good"), moved, now);
        assert_eq!(assigned(&out).unwrap().0, 1);
        assert_eq!(core.sessions().len(), 1);
        assert_eq!(core.sessions().addr_of(1), Some(moved));
    }

    #[test]
    fn test_first_move_opens_session_then_applies() {
        let mut core = test_core(MemoryStore::new());
        let cmd = MoveCommand {
            token: "good".to_string(),
            x: 150.0,
            y: 90.0,
            direction: Direction::Up,
            moving: true,
            current_map: "A".to_string(),
            z_index: 9,
            attacking: false,
            running: true,
        };
        let out = core.handle_packet(Packet::Move(cmd), test_addr(), Instant::now());
        assert!(assigned(&out).is_some());

        let player = core.game().player(1).unwrap();
        assert_eq!(player.motion.target, Vec2::new(150.0, 90.0));
        assert_eq!(player.z_index, 0);
        assert!(player.running);
    }

    #[test]
    fn test_save_request_is_confirmed() {
        let mut core = test_core(MemoryStore::new());
        let now = Instant::now();
        core.handle_packet(join("good"), test_addr(), now);

        let out = core.handle_packet(
            Packet::Save(SaveRequest {
                token: "good".to_string(),
                x: 5.0,
                y: 6.0,
                direction: Direction::Right,
                current_map: "A".to_string(),
                z_index: 0,
            }),
            test_addr(),
            now,
        );
        assert_eq!(out, vec![save_confirm(test_addr())]);
        assert!(!core.game().player(1).unwrap().needs_save);
    }

    #[test]
    fn test_tick_without_sessions_is_silent() {
        let mut core = test_core(MemoryStore::new());
        assert!(core.tick(0.05).is_empty());
        assert_eq!(core.game().tick, 1);

        core.handle_packet(join("good"), test_addr(), Instant::now());
        match core.tick(0.05).as_slice() {
            [GameMessage::BroadcastPacket {
                packet: Packet::Update(snapshot),
                addrs,
            }] => {
                assert_eq!(snapshot.players.len(), 1);
                assert_eq!(addrs, &vec![test_addr()]);
            }
            other => panic!("expected one update, got {:?}", other),
        }
    }
}
