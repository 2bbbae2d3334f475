use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use serde_jsonlines::JsonLinesWriter;

use crate::{
    VelometerError,
    telemetry::{SnapshotConsumer, TelemetrySnapshot},
};

/// Records every snapshot as one JSON object per line
pub struct SnapshotWriter<W: Write> {
    writer: JsonLinesWriter<W>,
}

impl SnapshotWriter<BufWriter<File>> {
    pub fn create(file: &Path) -> Result<Self, VelometerError> {
        let snapshot_file =
            File::create(file).map_err(|e| VelometerError::WriterError { source: e })?;
        Ok(Self::new(BufWriter::new(snapshot_file)))
    }
}

impl<W: Write> SnapshotWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: JsonLinesWriter::new(inner),
        }
    }

    pub fn flush(&mut self) -> Result<(), VelometerError> {
        self.writer
            .flush()
            .map_err(|e| VelometerError::WriterError { source: e })
    }
}

impl<W: Write> SnapshotConsumer for SnapshotWriter<W> {
    fn name(&self) -> &str {
        "snapshot file"
    }

    fn deliver(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), VelometerError> {
        self.writer
            .write(snapshot)
            .map_err(|e| VelometerError::WriterError { source: e })
    }
}

impl<W: Write> Drop for SnapshotWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::error!("Error while flushing snapshot file: {}", e);
        }
    }
}
