//! Authoritative world state and the per-tick simulation.

use crate::config::WorldConfig;
use crate::enemy::{nearest, Enemy};
use crate::persistence::SavedState;
use log::{debug, info};
use shared::{
    Direction, EnemySnapshot, MapCache, MapSource, Motion, MoveCommand, PlayerData,
    PlayerSnapshot, Vec2, WorldSnapshot, PLAYER_FOOTPRINT, PLAYER_SYNC_SPEED,
};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub username: String,
    pub name: String,
    pub motion: Motion,
    pub direction: Direction,
    pub current_map: String,
    pub z_index: i32,
    pub moving: bool,
    pub attacking: bool,
    pub running: bool,
    pub needs_save: bool,
    /// Unix time of the last authoritative change from the client.
    pub last_update_time: f64,
    /// Map the player was on when the previous tick ran.
    map_at_last_tick: String,
}

impl Player {
    pub fn new(id: u32, username: &str, name: &str, state: SavedState, now: f64) -> Self {
        Self {
            id,
            username: username.to_string(),
            name: name.to_string(),
            motion: Motion::new(Vec2::new(state.x, state.y), PLAYER_SYNC_SPEED),
            direction: state.direction,
            current_map: state.current_map.clone(),
            z_index: state.z_index,
            moving: false,
            attacking: false,
            running: false,
            needs_save: false,
            last_update_time: now,
            map_at_last_tick: state.current_map,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.motion.position
    }

    /// Moves the player to another map. Position, prev and target change together.
    ///
    /// Switching to the map the player is already on only relocates it.
    pub fn change_map(&mut self, map: &str, spawn: Vec2) {
        if self.current_map != map {
            self.current_map = map.to_string();
        }
        self.motion.teleport(spawn);
    }

    pub fn saved_state(&self) -> SavedState {
        SavedState {
            x: self.motion.position.x,
            y: self.motion.position.y,
            direction: self.direction,
            current_map: self.current_map.clone(),
            z_index: self.z_index,
        }
    }

    pub fn player_data(&self) -> PlayerData {
        PlayerData {
            x: self.motion.position.x,
            y: self.motion.position.y,
            direction: self.direction,
            current_map: self.current_map.clone(),
            z_index: self.z_index,
            name: self.name.clone(),
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            name: self.name.clone(),
            x: self.motion.position.x,
            y: self.motion.position.y,
            prev_x: self.motion.prev.x,
            prev_y: self.motion.prev.y,
            target_x: self.motion.target.x,
            target_y: self.motion.target.y,
            direction: self.direction,
            moving: self.moving,
            current_map: self.current_map.clone(),
            z_index: self.z_index,
            attacking: self.attacking,
            timestamp: self.last_update_time,
        }
    }
}

/// Everything the simulation owns: players, enemies and the map geometry.
pub struct GameState {
    pub tick: u64,
    pub players: BTreeMap<u32, Player>,
    pub enemies: BTreeMap<u32, Enemy>,
    maps: MapCache,
    default_state: SavedState,
}

impl GameState {
    pub fn new(world: &WorldConfig, maps: impl MapSource + Send + 'static) -> Self {
        let enemies = world
            .enemies
            .iter()
            .map(|config| (config.id, Enemy::from_config(config)))
            .collect();

        Self {
            tick: 0,
            players: BTreeMap::new(),
            enemies,
            maps: MapCache::new(maps),
            default_state: SavedState {
                x: world.spawn_x,
                y: world.spawn_y,
                direction: Direction::Down,
                current_map: world.default_map.clone(),
                z_index: 0,
            },
        }
    }

    /// Adds a player from saved state, or at the world spawn for a new account.
    pub fn spawn_player(
        &mut self,
        id: u32,
        username: &str,
        name: &str,
        saved: Option<SavedState>,
        now: f64,
    ) -> &Player {
        let state = saved.unwrap_or_else(|| self.default_state.clone());
        self.maps.get(&state.current_map);
        info!(
            "Player {} ({}) spawned on {} at ({:.1}, {:.1})",
            id, name, state.current_map, state.x, state.y
        );
        self.players
            .entry(id)
            .or_insert_with(|| Player::new(id, username, name, state, now))
    }

    pub fn remove_player(&mut self, id: u32) -> Option<Player> {
        let player = self.players.remove(&id);
        if player.is_some() {
            info!("Removed player {}", id);
        }
        player
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: u32) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Records the latest position a client reports for its player.
    ///
    /// Returns false and changes nothing when the report names another map
    /// than the one the server has, which happens for moves sent just before
    /// a portal transition. The reported layer is ignored; the server derives
    /// it from elevation.
    pub fn apply_move(&mut self, id: u32, cmd: &MoveCommand, now: f64) -> bool {
        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };
        if cmd.current_map != player.current_map {
            debug!(
                "Dropping stale move from player {} for {} (now on {})",
                id, cmd.current_map, player.current_map
            );
            return false;
        }

        player.motion.target = Vec2::new(cmd.x, cmd.y);
        player.direction = cmd.direction;
        player.moving = cmd.moving;
        player.attacking = cmd.attacking;
        player.running = cmd.running;
        player.needs_save = true;
        player.last_update_time = now;
        true
    }

    /// Relocates a player through a portal. The request is trusted as sent.
    pub fn enter_portal(
        &mut self,
        id: u32,
        target_map: &str,
        spawn: Vec2,
        spawn_z_index: Option<i32>,
        now: f64,
    ) -> bool {
        // Warm the cache so the first tick on the new map does not hit the disk.
        self.maps.get(target_map);

        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };
        info!(
            "Player {} portal {} -> {} at ({:.1}, {:.1})",
            id, player.current_map, target_map, spawn.x, spawn.y
        );
        player.change_map(target_map, spawn);
        if let Some(z) = spawn_z_index {
            player.z_index = z;
        }
        player.moving = false;
        player.needs_save = true;
        player.last_update_time = now;
        true
    }

    /// Advances every player and enemy by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        self.tick += 1;

        for player in self.players.values_mut() {
            let map = self.maps.get(&player.current_map);
            let motion = &mut player.motion;
            motion.prev = motion.position;

            if player.map_at_last_tick != player.current_map {
                motion.position = motion.target;
                player.map_at_last_tick = player.current_map.clone();
            } else {
                let desired = motion.step(dt);
                let footprint = PLAYER_FOOTPRINT.at(motion.position);
                let allowed = map.resolve_movement(footprint, desired, player.z_index);
                motion.position = motion.position.add(allowed);
            }

            let feet = PLAYER_FOOTPRINT.at(motion.position).feet();
            if let Some(z) = map.elevation_at(feet) {
                player.z_index = z;
            }
        }

        for enemy in self.enemies.values_mut() {
            let target = nearest(
                enemy.motion.position,
                self.players
                    .values()
                    .filter(|p| p.current_map == enemy.current_map)
                    .map(|p| (p.id, p.position())),
            );
            enemy.chase(target);

            let map = self.maps.get(&enemy.current_map);
            enemy.advance(dt, map);
            enemy.update_elevation(map);
        }
    }

    /// Public state of every player, and of the enemies on maps with players.
    pub fn snapshot(&self, world_time: String) -> WorldSnapshot {
        let occupied: HashSet<&str> = self
            .players
            .values()
            .map(|p| p.current_map.as_str())
            .collect();

        let enemies: Vec<EnemySnapshot> = self
            .enemies
            .values()
            .filter(|e| occupied.contains(e.current_map.as_str()))
            .map(Enemy::snapshot)
            .collect();

        WorldSnapshot {
            players: self.players.values().map(Player::snapshot).collect(),
            enemies,
            world_time,
        }
    }

    /// Ids of players with unsaved changes.
    pub fn dirty_players(&self) -> Vec<u32> {
        self.players
            .values()
            .filter(|p| p.needs_save)
            .map(|p| p.id)
            .collect()
    }
}

/// Wall clock as `HH:MM:SS` in UTC.
pub fn world_time(unix_seconds: f64) -> String {
    let secs = unix_seconds.max(0.0) as u64 % 86_400;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
