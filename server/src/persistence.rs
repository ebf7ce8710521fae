//! Save/load contract for player state.
//!
//! The game only needs to save a handful of fields per account and read
//! them back on login. [`FileStore`] keeps the whole table in one bincode
//! file; [`MemoryStore`] is used when no save file is configured.

use log::debug;
use serde::{Deserialize, Serialize};
use shared::Direction;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("save file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("save file is corrupt: {0}")]
    Codec(#[from] bincode::Error),
}

/// Fields persisted for a player between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    pub x: f32,
    pub y: f32,
    pub direction: Direction,
    pub current_map: String,
    pub z_index: i32,
}

pub trait PlayerStore: Send {
    fn save(&mut self, player_id: u32, username: &str, state: &SavedState)
        -> Result<(), StoreError>;

    /// Last saved state for `username`, or `None` for a new account.
    fn load(&self, username: &str) -> Result<Option<SavedState>, StoreError>;
}

impl<S: PlayerStore + ?Sized> PlayerStore for Box<S> {
    fn save(
        &mut self,
        player_id: u32,
        username: &str,
        state: &SavedState,
    ) -> Result<(), StoreError> {
        (**self).save(player_id, username, state)
    }

    fn load(&self, username: &str) -> Result<Option<SavedState>, StoreError> {
        (**self).load(username)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    states: HashMap<String, SavedState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(mut self, username: &str, state: SavedState) -> Self {
        self.states.insert(username.to_string(), state);
        self
    }
}

impl PlayerStore for MemoryStore {
    fn save(
        &mut self,
        player_id: u32,
        username: &str,
        state: &SavedState,
    ) -> Result<(), StoreError> {
        debug!("Saved player {} ({}) in memory", player_id, username);
        self.states.insert(username.to_string(), state.clone());
        Ok(())
    }

    fn load(&self, username: &str) -> Result<Option<SavedState>, StoreError> {
        Ok(self.states.get(username).cloned())
    }
}

/// Whole save table in a single bincode file, rewritten on every save.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    states: HashMap<String, SavedState>,
}

impl FileStore {
    /// Opens the save file, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let states = match std::fs::read(&path) {
            Ok(bytes) => bincode::deserialize(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, states })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn flush(&self) -> Result<(), StoreError> {
        let bytes = bincode::serialize(&self.states)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PlayerStore for FileStore {
    fn save(
        &mut self,
        player_id: u32,
        username: &str,
        state: &SavedState,
    ) -> Result<(), StoreError> {
        let previous = self.states.insert(username.to_string(), state.clone());
        if let Err(e) = self.flush() {
            // Keep memory and disk in agreement so a retry writes the same table.
            match previous {
                Some(old) => self.states.insert(username.to_string(), old),
                None => self.states.remove(username),
            };
            return Err(e);
        }
        debug!("Saved player {} ({}) to {}", player_id, username, self.path.display());
        Ok(())
    }

    fn load(&self, username: &str) -> Result<Option<SavedState>, StoreError> {
        Ok(self.states.get(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(x: f32) -> SavedState {
        SavedState {
            x,
            y: 20.0,
            direction: Direction::Left,
            current_map: "Test_01".to_string(),
            z_index: 1,
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tileworld-{}-{}.bin", name, std::process::id()))
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load("alice").unwrap(), None);
        store.save(1, "alice", &state(10.0)).unwrap();
        assert_eq!(store.load("alice").unwrap(), Some(state(10.0)));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let path = temp_path("reopen");
        let _ = std::fs::remove_file(&path);

        {
            let mut store = FileStore::open(&path).unwrap();
            assert!(store.is_empty());
            store.save(1, "alice", &state(10.0)).unwrap();
            store.save(2, "bob", &state(30.0)).unwrap();
            store.save(1, "alice", &state(15.0)).unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.load("alice").unwrap(), Some(state(15.0)));
        assert_eq!(store.load("carol").unwrap(), None);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let path = temp_path("corrupt");
        std::fs::write(&path, [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]).unwrap();
        assert!(matches!(FileStore::open(&path), Err(StoreError::Codec(_))));
        let _ = std::fs::remove_file(&path);
    }
}
