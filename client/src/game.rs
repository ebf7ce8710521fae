//! Client-side game state, independent of the window and the socket.
//!
//! [`ClientGame`] consumes decoded server packets and per-frame input and
//! produces the packets to send back. Rendering reads it; nothing else
//! mutates it, so it can be driven directly from tests.

use crate::config::ClientConfig;
use crate::interpolation::Roster;
use crate::portal::PortalTransition;
use crate::prediction::LocalPlayer;
use log::{debug, info, warn};
use shared::{
    CollisionMap, Direction, MapCache, MapSource, MoveCommand, Packet, SaveRequest, Vec2,
};

const TOAST_SECONDS: f64 = 3.0;

/// Input sampled for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    /// Raw direction from the keys; zero when idle
    pub direction: Vec2,
    pub running: bool,
    pub attacking: bool,
    pub save_requested: bool,
}

/// Borrowed view of everything drawn in one frame.
pub struct Scene<'a> {
    pub local: &'a LocalPlayer,
    pub map: &'a CollisionMap,
    pub roster: &'a Roster,
    pub world_time: &'a str,
    pub toast: Option<&'a str>,
    pub fade_alpha: f32,
}

/// What the last `move` told the server, to detect changes worth sending.
#[derive(Debug, Clone, PartialEq)]
struct SentMove {
    direction: Direction,
    moving: bool,
    attacking: bool,
    running: bool,
    current_map: String,
}

pub struct ClientGame {
    config: ClientConfig,
    maps: MapCache,
    local: Option<LocalPlayer>,
    roster: Roster,
    portal: PortalTransition,
    world_time: String,
    toast: Option<(String, f64)>,
    last_join_sent: Option<f64>,
    last_move_sent: f64,
    last_move: Option<SentMove>,
}

impl ClientGame {
    pub fn new(config: ClientConfig, maps: impl MapSource + Send + 'static) -> Self {
        let roster = Roster::new(config.interpolation_speed);
        let portal = PortalTransition::new(config.fade_duration, config.portal_resend_interval);
        Self {
            config,
            maps: MapCache::new(maps),
            local: None,
            roster,
            portal,
            world_time: String::new(),
            toast: None,
            last_join_sent: None,
            last_move_sent: f64::NEG_INFINITY,
            last_move: None,
        }
    }

    pub fn local(&self) -> Option<&LocalPlayer> {
        self.local.as_ref()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn portal(&self) -> &PortalTransition {
        &self.portal
    }

    pub fn world_time(&self) -> &str {
        &self.world_time
    }

    pub fn toast(&self, now: f64) -> Option<&str> {
        match &self.toast {
            Some((message, until)) if now < *until => Some(message),
            _ => None,
        }
    }

    /// Geometry of the map the local player is on.
    pub fn current_map(&mut self) -> Option<&CollisionMap> {
        let name = self.local.as_ref()?.current_map.clone();
        Some(self.maps.get(&name))
    }

    /// Nothing is drawn before the server assigns an id.
    pub fn scene(&mut self, now: f64) -> Option<Scene<'_>> {
        let local = self.local.as_ref()?;
        let toast = match &self.toast {
            Some((message, until)) if now < *until => Some(message.as_str()),
            _ => None,
        };
        Some(Scene {
            local,
            map: self.maps.get(&local.current_map),
            roster: &self.roster,
            world_time: &self.world_time,
            toast,
            fade_alpha: self.portal.fade_alpha(now),
        })
    }

    pub fn handle_packet(&mut self, packet: Packet, now: f64) {
        match packet {
            Packet::AssignId {
                player_id,
                player_data,
            } => {
                info!(
                    "Assigned player id {} as {} on {}",
                    player_id, player_data.name, player_data.current_map
                );
                self.maps.get(&player_data.current_map);
                self.local = Some(LocalPlayer::from_assignment(player_id, &player_data));
                self.roster.remove_player(player_id);
            }

            Packet::Update(snapshot) => {
                let local_id = self.local.as_ref().map(|p| p.id);
                if let Some(local) = self.local.as_mut() {
                    let own = snapshot
                        .players
                        .iter()
                        .find(|p| p.id == local.id && p.current_map == local.current_map);
                    if let Some(own) = own {
                        local.server_position = Some(Vec2::new(own.x, own.y));
                    }
                }
                self.roster.apply_snapshot(&snapshot, local_id, now);
                self.world_time = snapshot.world_time;
            }

            Packet::PlayerDisconnect { player_id } => {
                if self.roster.remove_player(player_id) {
                    debug!("Player {} left", player_id);
                }
            }

            Packet::MapSwitch { map, x, y } => {
                let Some(local) = self.local.as_mut() else {
                    warn!("map_switch before assign_id, ignoring");
                    return;
                };
                info!("Switched to {} at ({:.1}, {:.1})", map, x, y);
                local.switch_map(&map, Vec2::new(x, y));
                let map = self.maps.get(&map);
                if let Some(z) = map.elevation_at(local.footprint().feet()) {
                    local.z_index = z;
                }
                self.portal.on_map_switch(now);
                self.last_move = None;
            }

            Packet::SaveConfirm { message } => {
                info!("{}", message);
                self.toast = Some((message, now + TOAST_SECONDS));
            }

            other => debug!("Ignoring {} from server", other.kind()),
        }
    }

    /// Advances one frame and returns the packets to send.
    pub fn update(&mut self, input: FrameInput, dt: f32, now: f64) -> Vec<Packet> {
        let mut outbound = Vec::new();
        let token = self.config.token.clone();

        let Some(local) = self.local.as_mut() else {
            let due = self
                .last_join_sent
                .map_or(true, |t| now - t >= self.config.join_retry_interval);
            if due {
                self.last_join_sent = Some(now);
                outbound.push(Packet::Join { token });
            }
            return outbound;
        };

        self.portal.update(now);
        let map = self.maps.get(&local.current_map);

        if self.portal.input_frozen() {
            local.moving = false;
            if let Some(request) = self.portal.poll_resend(now) {
                debug!("Resending portal_enter to {}", request.target_map);
                outbound.push(portal_enter(&token, request));
            }
        } else {
            let speed = if input.running {
                self.config.move_speed * self.config.run_multiplier
            } else {
                self.config.move_speed
            };
            local.apply_input(input.direction, speed, dt, map);
            local.running = input.running;
            local.attacking = input.attacking;

            if let Some(request) = self.portal.check(&local.footprint(), map, now) {
                info!("Entering portal to {}", request.target_map);
                outbound.push(portal_enter(&token, request));
            }
        }

        local.reconcile(self.config.snap_threshold, self.config.correction_factor);
        self.roster.advance(dt);

        if !self.portal.input_frozen() {
            let sent = SentMove {
                direction: local.direction,
                moving: local.moving,
                attacking: local.attacking,
                running: local.running,
                current_map: local.current_map.clone(),
            };
            let due = now - self.last_move_sent >= self.config.move_send_interval;
            if due || self.last_move.as_ref() != Some(&sent) {
                outbound.push(Packet::Move(MoveCommand {
                    token: token.clone(),
                    x: local.position.x,
                    y: local.position.y,
                    direction: local.direction,
                    moving: local.moving,
                    current_map: local.current_map.clone(),
                    z_index: local.z_index,
                    attacking: local.attacking,
                    running: local.running,
                }));
                self.last_move_sent = now;
                self.last_move = Some(sent);
            }
        }

        if input.save_requested {
            outbound.push(Packet::Save(SaveRequest {
                token,
                x: local.position.x,
                y: local.position.y,
                direction: local.direction,
                current_map: local.current_map.clone(),
                z_index: local.z_index,
            }));
        }

        outbound
    }
}

fn portal_enter(token: &str, request: crate::portal::PortalRequest) -> Packet {
    Packet::PortalEnter {
        token: token.to_string(),
        target_map: request.target_map,
        spawn_x: request.spawn_x,
        spawn_y: request.spawn_y,
        spawn_z_index: request.spawn_z_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{PlayerData, PlayerSnapshot, Portal, Rect, StaticMapSource, WorldSnapshot};

    fn config() -> ClientConfig {
        ClientConfig {
            token: "tok".to_string(),
            ..ClientConfig::default()
        }
    }

    fn maps() -> StaticMapSource {
        StaticMapSource::new()
            .with_map(CollisionMap {
                portals: vec![Portal {
                    rect: Rect::new(300.0, 300.0, 32.0, 32.0),
                    target_map: "B".to_string(),
                    spawn_x: 10.0,
                    spawn_y: 20.0,
                    spawn_z_index: None,
                }],
                ..CollisionMap::empty("A")
            })
            .with_map(CollisionMap::empty("B"))
    }

    fn assign(game: &mut ClientGame, x: f32, y: f32) {
        game.handle_packet(
            Packet::AssignId {
                player_id: 1,
                player_data: PlayerData {
                    x,
                    y,
                    direction: Direction::Down,
                    current_map: "A".to_string(),
                    z_index: 0,
                    name: "Alyx".to_string(),
                },
            },
            0.0,
        );
    }

    fn own_entry(x: f32, y: f32, map: &str) -> PlayerSnapshot {
        PlayerSnapshot {
            id: 1,
            name: "Alyx".to_string(),
            x,
            y,
            prev_x: x,
            prev_y: y,
            target_x: x,
            target_y: y,
            direction: Direction::Down,
            moving: false,
            current_map: map.to_string(),
            z_index: 0,
            attacking: false,
            timestamp: 0.0,
        }
    }

    #[test]
    fn test_join_retried_until_assigned() {
        let mut game = ClientGame::new(config(), maps());
        let first = game.update(FrameInput::default(), 0.016, 0.0);
        assert!(matches!(first.as_slice(), [Packet::Join { token }] if token == "tok"));
        assert!(game.update(FrameInput::default(), 0.016, 0.5).is_empty());
        assert_eq!(game.update(FrameInput::default(), 0.016, 1.0).len(), 1);

        assign(&mut game, 0.0, 0.0);
        let after = game.update(FrameInput::default(), 0.016, 1.1);
        assert!(after.iter().all(|p| !matches!(p, Packet::Join { .. })));
    }

    #[test]
    fn test_local_entry_sets_server_position_only_on_same_map() {
        let mut game = ClientGame::new(config(), maps());
        assign(&mut game, 0.0, 0.0);

        let stale = WorldSnapshot {
            players: vec![own_entry(500.0, 500.0, "B")],
            ..WorldSnapshot::default()
        };
        game.handle_packet(Packet::Update(stale), 0.1);
        assert!(game.local().unwrap().server_position.is_none());

        let fresh = WorldSnapshot {
            players: vec![own_entry(10.0, 0.0, "A")],
            world_time: "08:30:00".to_string(),
            ..WorldSnapshot::default()
        };
        game.handle_packet(Packet::Update(fresh), 0.2);
        assert_eq!(game.local().unwrap().server_position, Some(Vec2::new(10.0, 0.0)));
        assert_eq!(game.world_time(), "08:30:00");
        assert_eq!(game.roster().player_count(), 0);

        game.update(FrameInput::default(), 0.016, 0.3);
        assert!((game.local().unwrap().position.x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_move_sent_on_change() {
        let mut game = ClientGame::new(config(), maps());
        assign(&mut game, 0.0, 0.0);
        game.update(FrameInput::default(), 0.016, 0.0);
        assert!(game.update(FrameInput::default(), 0.016, 0.01).is_empty());

        let walk = FrameInput {
            direction: Vec2::new(1.0, 0.0),
            ..FrameInput::default()
        };
        let sent = game.update(walk, 0.016, 0.02);
        match sent.as_slice() {
            [Packet::Move(cmd)] => {
                assert!(cmd.moving);
                assert_eq!(cmd.direction, Direction::Right);
                assert_eq!(cmd.current_map, "A");
            }
            other => panic!("expected a move, got {:?}", other),
        }
    }

    #[test]
    fn test_portal_freezes_input_until_map_switch() {
        let mut game = ClientGame::new(config(), maps());
        assign(&mut game, 290.0, 280.0);

        let sent = game.update(FrameInput::default(), 0.016, 0.0);
        let request = sent
            .iter()
            .find(|p| matches!(p, Packet::PortalEnter { .. }))
            .cloned();
        assert!(matches!(
            request,
            Some(Packet::PortalEnter { ref target_map, .. }) if target_map == "B"
        ));
        assert!(game.portal().input_frozen());

        let walk = FrameInput {
            direction: Vec2::new(1.0, 0.0),
            ..FrameInput::default()
        };
        let before = game.local().unwrap().position;
        let resent = game.update(walk, 0.016, 0.6);
        assert_eq!(game.local().unwrap().position, before);
        assert!(matches!(resent.as_slice(), [Packet::PortalEnter { .. }]));

        game.handle_packet(
            Packet::MapSwitch {
                map: "B".to_string(),
                x: 10.0,
                y: 20.0,
            },
            0.7,
        );
        let local = game.local().unwrap();
        assert_eq!(local.current_map, "B");
        assert_eq!(local.position, Vec2::new(10.0, 20.0));
        assert!(!game.portal().input_frozen());
        assert_eq!(game.current_map().unwrap().name, "B");
    }

    #[test]
    fn test_save_and_confirmation_toast() {
        let mut game = ClientGame::new(config(), maps());
        assign(&mut game, 0.0, 0.0);
        let input = FrameInput {
            save_requested: true,
            ..FrameInput::default()
        };
        let sent = game.update(input, 0.016, 0.0);
        assert!(sent.iter().any(|p| matches!(p, Packet::Save(s) if s.current_map == "A")));

        game.handle_packet(
            Packet::SaveConfirm {
                message: "Your game has been saved.".to_string(),
            },
            1.0,
        );
        assert_eq!(game.toast(2.0), Some("Your game has been saved."));
        assert_eq!(game.toast(10.0), None);
    }
}
