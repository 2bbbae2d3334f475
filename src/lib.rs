// Library interface for velometer
// This allows integration tests and benches to access internal modules

pub mod config;
pub mod errors;
pub mod storage;
pub mod telemetry;
pub mod writer;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::VelometerError;
pub use storage::{FileBasedStore, KeyValueStore, MemoryStore, TelemetryStore};
pub use telemetry::{GeoSample, RawFix, TelemetrySession, TelemetrySnapshot};
pub use writer::SnapshotWriter;
