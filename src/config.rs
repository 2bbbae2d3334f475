use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::VelometerError;

const CONFIG_FILE_NAME: &str = "config.json";
const SESSION_TICK_MS: u64 = 1000;
const STORAGE_NAMESPACE: &str = "velometer";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// How often the session duration is refreshed
    pub session_tick_ms: u64,
    /// Namespace for the persisted accumulators
    pub storage_namespace: String,
    /// Overrides the default data directory
    pub storage_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session_tick_ms: SESSION_TICK_MS,
            storage_namespace: STORAGE_NAMESPACE.to_string(),
            storage_path: None,
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("velometer").join(CONFIG_FILE_NAME))
    }

    /// Loads the config file, `None` when there is no usable one
    pub fn from_local_file() -> Option<Self> {
        Self::from_file(&Self::config_path()?)
    }

    pub fn from_file(config_path: &PathBuf) -> Option<Self> {
        if !config_path.exists() {
            return None;
        }

        let file = match std::fs::File::open(config_path) {
            Ok(file) => file,
            Err(e) => {
                warn!("Could not open config file {:?}: {}", config_path, e);
                return None;
            }
        };
        match serde_json::from_reader(file) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Could not parse config file {:?}: {}", config_path, e);
                None
            }
        }
    }

    pub fn save(&self) -> Result<(), VelometerError> {
        let config_path = Self::config_path().ok_or(VelometerError::NoConfigDir)?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &PathBuf) -> Result<(), VelometerError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| VelometerError::ConfigIOError { source: e })?;
        }

        let file = std::fs::File::create(config_path)
            .map_err(|e| VelometerError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| VelometerError::ConfigSerializeError { source: e })
    }
}
