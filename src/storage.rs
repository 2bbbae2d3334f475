// Key-value persistence for the telemetry accumulators

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::{debug, warn};
use serde::{Serialize, de::DeserializeOwned};

use crate::errors::VelometerError;

pub const SPEED_STATS_KEY: &str = "speed_stats";
pub const ACCELERATION_KEY: &str = "acceleration";
pub const DISTANCE_KEY: &str = "distance";
pub const QUARTER_MILE_KEY: &str = "quartermile";
pub const ZERO_SIXTY_KEY: &str = "zero_sixty";

/// Minimal storage capability the engine relies on
pub trait KeyValueStore {
    /// Returns the stored bytes for `key`, or `None` if nothing was stored
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, VelometerError>;

    /// Stores `value` under `key`, replacing any previous value
    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), VelometerError>;
}

/// Stores each key in its own file under `<storage_path>/<namespace>/`
pub struct FileBasedStore {
    storage_path: PathBuf,
}

impl FileBasedStore {
    /// Create a new store, creating the namespace directory if needed
    pub fn new(storage_path: PathBuf, namespace: &str) -> Result<Self, VelometerError> {
        let storage_path = storage_path.join(namespace);
        if !storage_path.exists() {
            fs::create_dir_all(&storage_path)
                .map_err(|e| VelometerError::StorageIOError { source: e })?;
        }

        Ok(Self { storage_path })
    }

    pub fn default_storage_path() -> Result<PathBuf, VelometerError> {
        let app_data_dir = dirs::data_dir().ok_or(VelometerError::NoConfigDir)?;
        Ok(app_data_dir.join("velometer"))
    }

    fn file_path_for_key(&self, key: &str) -> PathBuf {
        let filename = format!("{}.json", Self::normalize_key(key));
        self.storage_path.join(filename)
    }

    /// Keys become file names, so anything outside [a-z0-9_] is replaced
    fn normalize_key(key: &str) -> String {
        key.to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect()
    }

    /// Lists the keys currently stored, sorted
    pub fn keys(&self) -> Result<Vec<String>, VelometerError> {
        let entries = fs::read_dir(&self.storage_path)
            .map_err(|e| VelometerError::StorageIOError { source: e })?;

        Ok(entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json")
            })
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_string())
            })
            .sorted()
            .collect())
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }
}

impl KeyValueStore for FileBasedStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, VelometerError> {
        match fs::read(self.file_path_for_key(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VelometerError::StorageIOError { source: e }),
        }
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), VelometerError> {
        // Readers must never observe a partially written value
        let file_path = self.file_path_for_key(key);
        let tmp_path = file_path.with_extension("json.tmp");
        fs::write(&tmp_path, value).map_err(|e| VelometerError::StorageIOError { source: e })?;
        fs::rename(&tmp_path, &file_path)
            .map_err(|e| VelometerError::StorageIOError { source: e })
    }
}

/// In-memory store, used for ephemeral sessions and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, Vec<u8>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, VelometerError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), VelometerError> {
        self.values.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Reads and writes accumulator state as JSON on top of a [`KeyValueStore`].
///
/// Storage problems never reach the caller: loads fall back to the type's
/// default and failed saves are logged.
pub struct TelemetryStore {
    store: Box<dyn KeyValueStore + Send>,
}

impl TelemetryStore {
    pub fn new(store: Box<dyn KeyValueStore + Send>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::default()))
    }

    pub fn load<T>(&self, key: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        match self.store.get(key) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Stored value for '{}' is corrupt, using defaults: {}", key, e);
                    T::default()
                }
            },
            Ok(None) => {
                debug!("No stored value for '{}', using defaults", key);
                T::default()
            }
            Err(e) => {
                warn!("Could not read '{}' from storage, using defaults: {}", key, e);
                T::default()
            }
        }
    }

    pub fn save<T>(&mut self, key: &str, value: &T)
    where
        T: Serialize,
    {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    "Could not serialize '{}': {}",
                    key,
                    VelometerError::StorageSerializeError { source: e }
                );
                return;
            }
        };
        if let Err(e) = self.store.set(key, &bytes) {
            warn!("Could not persist '{}': {}", key, e);
        }
    }
}
