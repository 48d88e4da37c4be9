//! Snapshot persistence for the entity store.
//!
//! Participants, stations, groups and the assignment flag are stored and restored
//! independently of each other. Anything missing or unreadable falls back to its empty
//! default so that startup never fails because of stored state.

pub mod error;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use court_rotation_engine::{EntityStore, Group};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

pub use crate::error::StoreError;

const PARTICIPANTS: &str = "participants";
const STATIONS: &str = "stations";
const GROUPS: &str = "groups";
const HAS_ASSIGNED: &str = "has_assigned";

pub trait SnapshotStore: Send + Sync {
    /// Restores the last saved state, piece by piece.
    fn load(&self) -> EntityStore;

    /// Saves every piece, even if an earlier one failed, and reports the first failure.
    fn save(&self, state: &EntityStore) -> Result<(), StoreError>;
}

/// One pretty-printed JSON file per piece of state inside a directory.
#[derive(Debug, Clone)]
pub struct JsonDirectory {
    root: PathBuf,
}

impl JsonDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    fn read_or<T: DeserializeOwned>(&self, name: &str, fallback: impl FnOnce() -> T) -> T {
        let path = self.path(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no snapshot yet");
                return fallback();
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read snapshot, using default");
                return fallback();
            }
        };
        serde_json::from_slice(&bytes).unwrap_or_else(|error| {
            warn!(path = %path.display(), %error, "malformed snapshot, using default");
            fallback()
        })
    }

    /// Writes next to the target and renames, so readers never observe a truncated file.
    fn write<T: Serialize + ?Sized>(
        &self,
        name: &'static str,
        value: &T,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|source| StoreError::Encode { name, source })?;
        let path = self.path(name);
        let temporary = path.with_extension("json.tmp");
        fs::write(&temporary, bytes)
            .and_then(|()| fs::rename(&temporary, &path))
            .map_err(|source| StoreError::Write { path, source })
    }
}

impl SnapshotStore for JsonDirectory {
    fn load(&self) -> EntityStore {
        EntityStore::from_parts(
            self.read_or(PARTICIPANTS, Vec::new),
            self.read_or(STATIONS, Vec::new),
            self.read_or(GROUPS, || vec![Group::default()]),
            self.read_or(HAS_ASSIGNED, || false),
        )
    }

    fn save(&self, state: &EntityStore) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(|source| StoreError::CreateDirectory {
            path: self.root.clone(),
            source,
        })?;
        let results = [
            self.write(PARTICIPANTS, state.participants()),
            self.write(STATIONS, state.stations()),
            self.write(GROUPS, state.groups()),
            self.write(HAS_ASSIGNED, &state.has_assigned()),
        ];
        results.into_iter().collect()
    }
}

/// Keeps the last saved state in memory only.
#[derive(Debug, Default)]
pub struct MemorySnapshots {
    saved: Mutex<Option<EntityStore>>,
}

impl MemorySnapshots {
    #[must_use]
    pub fn saved(&self) -> Option<EntityStore> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SnapshotStore for MemorySnapshots {
    fn load(&self) -> EntityStore {
        self.saved().unwrap_or_default()
    }

    fn save(&self, state: &EntityStore) -> Result<(), StoreError> {
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(state.clone());
        Ok(())
    }
}
