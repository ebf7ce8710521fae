//! Static per-map geometry: colliders, elevation layers and portal triggers.
//!
//! Maps are authored on a tile grid and stored as JSON assets. Loading turns
//! every tile into a world-space rectangle so that collision queries never
//! need to know about tiles.

use crate::geometry::{Rect, Vec2};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("failed to read map `{name}`: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse map `{name}`: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid map name `{0}`")]
    InvalidName(String),
    #[error("unknown map `{0}`")]
    Unknown(String),
}

/// A rectangle that blocks movers on the same elevation layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub rect: Rect,
    pub z_index: i32,
}

/// A rectangle that assigns an elevation layer to whoever stands on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Elevation {
    pub rect: Rect,
    pub z_index: i32,
}

/// A trigger rectangle that requests a transition to another map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portal {
    pub rect: Rect,
    pub target_map: String,
    pub spawn_x: f32,
    pub spawn_y: f32,
    pub spawn_z_index: Option<i32>,
}

/// Read-only collision and elevation geometry of one map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionMap {
    pub name: String,
    pub colliders: Vec<Collider>,
    pub elevations: Vec<Elevation>,
    pub portals: Vec<Portal>,
}

impl CollisionMap {
    /// An empty map with no geometry. Used when an asset is missing.
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Clips a desired movement against the colliders on `z_index`.
    ///
    /// The footprint is first tested at the full desired offset. When that
    /// overlaps, each axis is tested on its own and a blocked axis loses its
    /// component, so a diagonal step along a wall keeps sliding on the free
    /// axis. A corner hit where both single-axis moves are free drops the
    /// vertical component.
    ///
    /// Colliders the footprint already overlaps before the step are ignored,
    /// otherwise an actor whose layer changed while standing inside a wall
    /// could never leave it.
    pub fn resolve_movement(&self, footprint: Rect, desired: Vec2, z_index: i32) -> Vec2 {
        if desired.is_zero() {
            return desired;
        }

        let blocked = |delta: Vec2| {
            let moved = footprint.translate(delta);
            self.colliders.iter().any(|c| {
                c.z_index == z_index && c.rect.intersects(&moved) && !c.rect.intersects(&footprint)
            })
        };

        if !blocked(desired) {
            return desired;
        }

        let mut allowed = desired;
        if desired.x != 0.0 && blocked(Vec2::new(desired.x, 0.0)) {
            allowed.x = 0.0;
        }
        if desired.y != 0.0 && blocked(Vec2::new(0.0, desired.y)) {
            allowed.y = 0.0;
        }

        if !allowed.is_zero() && blocked(allowed) {
            allowed.y = 0.0;
            if blocked(allowed) {
                allowed = Vec2::ZERO;
            }
        }

        allowed
    }

    /// Layer of the first elevation rectangle containing `point`, if any.
    pub fn elevation_at(&self, point: Vec2) -> Option<i32> {
        self.elevations
            .iter()
            .find(|e| e.rect.contains(point))
            .map(|e| e.z_index)
    }

    /// First portal whose trigger overlaps the footprint.
    pub fn portal_at(&self, footprint: &Rect) -> Option<&Portal> {
        self.portals.iter().find(|p| p.rect.intersects(footprint))
    }

    /// True if the footprint overlaps any collider on `z_index`.
    pub fn is_blocked(&self, footprint: &Rect, z_index: i32) -> bool {
        self.colliders
            .iter()
            .any(|c| c.z_index == z_index && c.rect.intersects(footprint))
    }

    pub fn from_asset(name: &str, asset: MapAsset) -> Self {
        let size = asset.tile_size;
        let tile_rect = |x: u32, y: u32| Rect::new(x as f32 * size, y as f32 * size, size, size);

        let colliders = asset
            .collision
            .iter()
            .map(|t| Collider {
                rect: tile_rect(t.x, t.y),
                z_index: t.z_index,
            })
            .collect();

        let elevations = asset
            .elevation
            .iter()
            .map(|t| Elevation {
                rect: tile_rect(t.x, t.y),
                z_index: t.z_index,
            })
            .collect();

        let portals = asset
            .portals
            .into_iter()
            .map(|p| Portal {
                rect: tile_rect(p.x, p.y),
                target_map: p.target_map,
                spawn_x: p.spawn_x,
                spawn_y: p.spawn_y,
                spawn_z_index: p.spawn_z_index,
            })
            .collect();

        Self {
            name: name.to_string(),
            colliders,
            elevations,
            portals,
        }
    }
}

/// Tile-grid description of a map as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapAsset {
    pub tile_size: f32,
    #[serde(default)]
    pub collision: Vec<LayerTile>,
    #[serde(default)]
    pub elevation: Vec<LayerTile>,
    #[serde(default)]
    pub portals: Vec<PortalTile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerTile {
    pub x: u32,
    pub y: u32,
    #[serde(default)]
    pub z_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalTile {
    pub x: u32,
    pub y: u32,
    pub target_map: String,
    pub spawn_x: f32,
    pub spawn_y: f32,
    #[serde(default)]
    pub spawn_z_index: Option<i32>,
}

/// Anything that can produce the collision geometry for a named map.
pub trait MapSource {
    fn load(&self, name: &str) -> Result<CollisionMap, MapError>;
}

/// Loads `<root>/<name>.json` map assets.
#[derive(Debug, Clone)]
pub struct DirectoryMapSource {
    root: PathBuf,
}

impl DirectoryMapSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl MapSource for DirectoryMapSource {
    fn load(&self, name: &str) -> Result<CollisionMap, MapError> {
        // Map names arrive from the network; keep them inside the asset directory.
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(MapError::InvalidName(name.to_string()));
        }

        let path = self.root.join(format!("{name}.json"));
        let raw = std::fs::read_to_string(&path).map_err(|source| MapError::Io {
            name: name.to_string(),
            source,
        })?;
        let asset: MapAsset = serde_json::from_str(&raw).map_err(|source| MapError::Parse {
            name: name.to_string(),
            source,
        })?;

        let map = CollisionMap::from_asset(name, asset);
        info!(
            "Loaded map {}: {} colliders, {} elevation tiles, {} portals",
            name,
            map.colliders.len(),
            map.elevations.len(),
            map.portals.len()
        );
        Ok(map)
    }
}

/// In-memory map table, mostly for tests and tools.
#[derive(Debug, Clone, Default)]
pub struct StaticMapSource {
    maps: HashMap<String, CollisionMap>,
}

impl StaticMapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map(mut self, map: CollisionMap) -> Self {
        self.maps.insert(map.name.clone(), map);
        self
    }
}

impl MapSource for StaticMapSource {
    fn load(&self, name: &str) -> Result<CollisionMap, MapError> {
        self.maps
            .get(name)
            .cloned()
            .ok_or_else(|| MapError::Unknown(name.to_string()))
    }
}

/// Names of maps that failed to load, remembered so a missing map is not
/// re-read from disk on every tick. Cleared when full.
const MAX_MISSING_MAPS: usize = 32;

/// Loads each map at most once and remembers the result.
///
/// A map that fails to load is served as empty geometry: actors on it move
/// freely and keep their elevation layer. Only successful loads stay
/// resident.
pub struct MapCache {
    source: Box<dyn MapSource + Send>,
    maps: HashMap<String, CollisionMap>,
    missing: HashSet<String>,
    empty: CollisionMap,
}

impl MapCache {
    pub fn new(source: impl MapSource + Send + 'static) -> Self {
        Self {
            source: Box::new(source),
            maps: HashMap::new(),
            missing: HashSet::new(),
            empty: CollisionMap::default(),
        }
    }

    pub fn get(&mut self, name: &str) -> &CollisionMap {
        if !self.maps.contains_key(name) && !self.missing.contains(name) {
            match self.source.load(name) {
                Ok(map) => {
                    self.maps.insert(name.to_string(), map);
                }
                Err(e) => {
                    warn!("{}; using empty geometry", e);
                    if self.missing.len() >= MAX_MISSING_MAPS {
                        self.missing.clear();
                    }
                    self.missing.insert(name.to_string());
                }
            }
        }
        self.maps.get(name).unwrap_or(&self.empty)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.maps.contains_key(name)
    }

    /// Number of maps held in memory, counting missing-map markers.
    pub fn resident(&self) -> usize {
        self.maps.len() + self.missing.len()
    }
}
