//! Server runtime settings and the static world description.

use crate::auth::Credential;
use crate::error::ServerError;
use serde::{Deserialize, Serialize};
use shared::{Footprint, Vec2, DEFAULT_MAP, DEFAULT_SPAWN, MAX_PACKET_SIZE};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timing and I/O settings of a running server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Period of the simulation tick and snapshot broadcast.
    pub update_rate: Duration,
    /// A session silent for longer than this is dropped.
    pub timeout: Duration,
    /// Period of the timeout sweep.
    pub sweep_period: Duration,
    pub buffer_size: usize,
    pub save_interval: Duration,
    pub token_cache_ttl: Duration,
    pub token_refresh_interval: Duration,
    /// Upper bound on the wall-clock delta fed to a single tick.
    pub max_tick_delta: Duration,
    /// How often the receive loop wakes up to check for shutdown.
    pub recv_poll: Duration,
    pub world_file: Option<PathBuf>,
    pub save_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 50880,
            update_rate: Duration::from_millis(50),
            timeout: Duration::from_secs(10),
            sweep_period: Duration::from_secs(1),
            buffer_size: MAX_PACKET_SIZE,
            save_interval: Duration::from_secs(30),
            token_cache_ttl: Duration::from_secs(30),
            token_refresh_interval: Duration::from_secs(60),
            max_tick_delta: Duration::from_millis(250),
            recv_poll: Duration::from_millis(500),
            world_file: None,
            save_file: None,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One statically placed enemy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyConfig {
    pub id: u32,
    #[serde(rename = "type")]
    pub enemy_type: String,
    pub map: String,
    pub x: f32,
    pub y: f32,
    pub speed: f32,
    #[serde(default = "default_enemy_hp")]
    pub hp: i32,
    /// Sprite sheet layout, forwarded to clients for animation.
    pub rows: u32,
    pub columns: u32,
    pub footprint_width: f32,
    pub footprint_height: f32,
}

fn default_enemy_hp() -> i32 {
    100
}

impl EnemyConfig {
    pub fn spawn(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn footprint(&self) -> Footprint {
        Footprint::sized(self.footprint_width, self.footprint_height)
    }
}

/// Static content of the world, read from a JSON file at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub maps_dir: PathBuf,
    pub default_map: String,
    pub spawn_x: f32,
    pub spawn_y: f32,
    pub credentials: Vec<Credential>,
    pub enemies: Vec<EnemyConfig>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            maps_dir: PathBuf::from("assets/maps"),
            default_map: DEFAULT_MAP.to_string(),
            spawn_x: DEFAULT_SPAWN.x,
            spawn_y: DEFAULT_SPAWN.y,
            credentials: Vec::new(),
            enemies: default_roster(),
        }
    }
}

impl WorldConfig {
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ServerError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ServerError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn spawn(&self) -> Vec2 {
        Vec2::new(self.spawn_x, self.spawn_y)
    }
}

fn enemy(id: u32, kind: &str, map: &str, x: f32, y: f32, large: bool) -> EnemyConfig {
    let (speed, rows, columns, width, height) = if large {
        (40.0, 8, 6, 24.0, 24.0)
    } else {
        (10.0, 1, 11, 28.0, 18.0)
    };
    EnemyConfig {
        id,
        enemy_type: kind.to_string(),
        map: map.to_string(),
        x,
        y,
        speed,
        hp: default_enemy_hp(),
        rows,
        columns,
        footprint_width: width,
        footprint_height: height,
    }
}

/// Enemies placed when the world file does not list any.
pub fn default_roster() -> Vec<EnemyConfig> {
    vec![
        enemy(1, "green-slime", "Test_01", 100.0, 100.0, false),
        enemy(2, "red-slime", "Test_01", 150.0, 400.0, false),
        enemy(3, "bull", "Test_01", 150.0, 440.0, true),
        enemy(4, "bull", "grasslands_01", 150.0, 440.0, true),
    ]
}
