//! Wire messages exchanged over UDP, one message per datagram.
//!
//! Every message is a MessagePack map carrying a `type` field. Receivers
//! ignore fields they do not know, and most optional fields fall back to a
//! default, so older and newer peers can talk to each other.

use crate::entity::Direction;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("failed to encode packet: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("failed to decode packet: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    Join {
        token: String,
    },
    AssignId {
        player_id: u32,
        player_data: PlayerData,
    },
    Move(MoveCommand),
    Update(WorldSnapshot),
    PlayerDisconnect {
        player_id: u32,
    },
    PortalEnter {
        token: String,
        target_map: String,
        spawn_x: f32,
        spawn_y: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spawn_z_index: Option<i32>,
    },
    MapSwitch {
        map: String,
        x: f32,
        y: f32,
    },
    Save(SaveRequest),
    SaveConfirm {
        message: String,
    },
}

impl Packet {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Packet, ProtocolError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Session token of a client message. Server messages carry none.
    pub fn token(&self) -> Option<&str> {
        match self {
            Packet::Join { token } | Packet::PortalEnter { token, .. } => Some(token.as_str()),
            Packet::Move(cmd) => Some(&cmd.token),
            Packet::Save(req) => Some(&req.token),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Join { .. } => "join",
            Packet::AssignId { .. } => "assign_id",
            Packet::Move(_) => "move",
            Packet::Update(_) => "update",
            Packet::PlayerDisconnect { .. } => "player_disconnect",
            Packet::PortalEnter { .. } => "portal_enter",
            Packet::MapSwitch { .. } => "map_switch",
            Packet::Save(_) => "save",
            Packet::SaveConfirm { .. } => "save_confirm",
        }
    }
}

/// Initial state handed to a client when its session is established.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub direction: Direction,
    pub current_map: String,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveCommand {
    pub token: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub moving: bool,
    pub current_map: String,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default)]
    pub attacking: bool,
    #[serde(default)]
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub token: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub direction: Direction,
    pub current_map: String,
    #[serde(default)]
    pub z_index: i32,
}

/// Full world state broadcast once per server tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorldSnapshot {
    #[serde(default)]
    pub players: Vec<PlayerSnapshot>,
    #[serde(default)]
    pub enemies: Vec<EnemySnapshot>,
    #[serde(default)]
    pub world_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub prev_x: f32,
    #[serde(default)]
    pub prev_y: f32,
    #[serde(default)]
    pub target_x: f32,
    #[serde(default)]
    pub target_y: f32,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub moving: bool,
    pub current_map: String,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default)]
    pub attacking: bool,
    /// Seconds since the Unix epoch of the last authoritative update.
    #[serde(default)]
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySnapshot {
    pub id: u32,
    #[serde(rename = "type")]
    pub enemy_type: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub moving: bool,
    pub current_map: String,
    #[serde(default)]
    pub rows: u32,
    #[serde(default)]
    pub columns: u32,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default)]
    pub hp: i32,
    #[serde(default)]
    pub speed: f32,
}
