// Error types for velometer

use snafu::Snafu;
use std::io;

#[derive(Debug, Snafu)]
pub enum VelometerError {
    // Errors for incoming position fixes
    #[snafu(display("Invalid position sample: {reason}"))]
    InvalidSample { reason: String },
    #[snafu(display("Position source unavailable: {reason}"))]
    SensorUnavailable { reason: String },
    #[snafu(display("Error reading position fixes"))]
    FixSourceError { source: io::Error },

    // Errors for the key-value store
    #[snafu(display("Error accessing telemetry storage"))]
    StorageIOError { source: io::Error },
    #[snafu(display("Error serializing telemetry state"))]
    StorageSerializeError { source: serde_json::Error },

    // Errors while broadcasting snapshots
    #[snafu(display("Error broadcasting telemetry snapshot to {consumer}"))]
    SnapshotBroadcastError { consumer: String },

    // Errors for the snapshot writer
    #[snafu(display("Error writing snapshot file"))]
    WriterError { source: io::Error },

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },
}
