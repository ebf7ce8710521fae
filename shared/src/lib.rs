//! # Shared
//!
//! Types used by both the server and the client of the tile world:
//!
//! - [`geometry`]: vectors, rectangles and actor footprints
//! - [`map`]: collision, elevation and portal geometry per map, loaded from JSON assets
//! - [`entity`]: facing directions and capped-step motion
//! - [`protocol`]: the MessagePack wire messages
//!
//! Both sides resolve movement with the same [`CollisionMap::resolve_movement`]
//! so that client prediction agrees with the server in the common case.

pub mod entity;
pub mod geometry;
pub mod map;
pub mod protocol;

pub use entity::{capped_step, Direction, Motion};
pub use geometry::{Footprint, Rect, Vec2};
pub use map::{
    Collider, CollisionMap, DirectoryMapSource, Elevation, MapCache, MapError, MapSource, Portal,
    StaticMapSource,
};
pub use protocol::{
    EnemySnapshot, MoveCommand, Packet, PlayerData, PlayerSnapshot, ProtocolError, SaveRequest,
    WorldSnapshot,
};

/// Map a fresh character starts on.
pub const DEFAULT_MAP: &str = "DefaultMap";
pub const DEFAULT_SPAWN: Vec2 = Vec2::new(100.0, 100.0);

/// Side of a character sprite frame.
pub const FRAME_SIZE: f32 = 64.0;

/// Collision box of a player inside its 64x64 sprite frame.
pub const PLAYER_FOOTPRINT: Footprint = Footprint::new(30.0, 40.0, 4.0, 4.0);

/// Walking speed of the local player, units per second.
pub const PLAYER_WALK_SPEED: f32 = 100.0;
pub const PLAYER_RUN_MULTIPLIER: f32 = 1.8;

/// Speed at which the server moves a player toward its last reported position.
pub const PLAYER_SYNC_SPEED: f32 = 200.0;

pub const SAVE_CONFIRM_MESSAGE: &str = "Your game has been saved.";

/// Largest datagram either side will send or accept: the maximum UDP payload
/// over IPv4. Snapshots grow with the player count.
pub const MAX_PACKET_SIZE: usize = 65_507;

/// Seconds since the Unix epoch as a float.
pub fn unix_time() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
