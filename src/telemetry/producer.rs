use std::fs::File;
use std::io::{self, BufRead, BufReader, Stdin};
use std::path::Path;

use log::{info, warn};
use serde_jsonlines::JsonLinesReader;

use crate::VelometerError;

use super::RawFix;

/// A source of position fixes.
///
/// Implementations deliver fixes in arrival order. The session tolerates
/// arbitrary gaps between fixes and drops the ones it cannot use, so a
/// producer does not need to filter.
pub trait FixProducer {
    /// Acquires the underlying source. Fails with
    /// [`VelometerError::SensorUnavailable`] when no fixes can be delivered.
    fn start(&mut self) -> Result<(), VelometerError>;

    /// Returns the next fix, or `None` once the source is exhausted.
    fn next_fix(&mut self) -> Result<Option<RawFix>, VelometerError>;
}

/// Reads one JSON encoded [`RawFix`] per line. Lines that do not decode,
/// whether broken JSON or invalid UTF-8, are logged and skipped.
pub struct JsonLinesFixProducer<R: BufRead> {
    reader: Option<JsonLinesReader<R>>,
    source_name: String,
    fix_count: usize,
    skipped: usize,
}

impl<R: BufRead> JsonLinesFixProducer<R> {
    pub fn new(reader: R, source_name: &str) -> Self {
        Self {
            reader: Some(JsonLinesReader::new(reader)),
            source_name: source_name.to_string(),
            fix_count: 0,
            skipped: 0,
        }
    }
}

impl JsonLinesFixProducer<BufReader<File>> {
    /// Opens a recorded JSON Lines file. A missing or unreadable file means
    /// the position source is unavailable.
    pub fn from_file(path: &Path) -> Result<Self, VelometerError> {
        let file = File::open(path).map_err(|e| VelometerError::SensorUnavailable {
            reason: format!("cannot open {:?}: {}", path, e),
        })?;
        Ok(Self::new(BufReader::new(file), &path.to_string_lossy()))
    }
}

impl JsonLinesFixProducer<BufReader<Stdin>> {
    pub fn from_stdin() -> Self {
        Self::new(BufReader::new(io::stdin()), "stdin")
    }
}

impl<R: BufRead> FixProducer for JsonLinesFixProducer<R> {
    fn start(&mut self) -> Result<(), VelometerError> {
        if self.reader.is_none() {
            return Err(VelometerError::SensorUnavailable {
                reason: format!("{} is already closed", self.source_name),
            });
        }
        info!("Reading position fixes from {}", self.source_name);
        Ok(())
    }

    fn next_fix(&mut self) -> Result<Option<RawFix>, VelometerError> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        loop {
            match reader.read::<RawFix>() {
                Ok(Some(fix)) => {
                    self.fix_count += 1;
                    return Ok(Some(fix));
                }
                Ok(None) => {
                    info!(
                        "{} closed after {} fixes, {} lines skipped",
                        self.source_name, self.fix_count, self.skipped
                    );
                    self.reader = None;
                    return Ok(None);
                }
                // Undecodable line, the reader has already moved past it
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
                    ) =>
                {
                    self.skipped += 1;
                    warn!("Skipping malformed fix from {}: {}", self.source_name, e);
                }
                Err(e) => return Err(VelometerError::FixSourceError { source: e }),
            }
        }
    }
}

/// Replays a fixed list of fixes. Used for tests and programmatic replays.
#[derive(Default)]
pub struct MockFixProducer {
    cur_tick: usize,
    fixes: Vec<RawFix>,
    available: bool,
}

impl MockFixProducer {
    pub fn from_fixes(fixes: Vec<RawFix>) -> Self {
        Self {
            cur_tick: 0,
            fixes,
            available: true,
        }
    }

    /// A producer whose sensor can never be acquired
    pub fn unavailable() -> Self {
        Self::default()
    }
}

impl FixProducer for MockFixProducer {
    fn start(&mut self) -> Result<(), VelometerError> {
        if self.available {
            Ok(())
        } else {
            Err(VelometerError::SensorUnavailable {
                reason: "mock sensor disabled".to_string(),
            })
        }
    }

    fn next_fix(&mut self) -> Result<Option<RawFix>, VelometerError> {
        let fix = self.fixes.get(self.cur_tick).cloned();
        if fix.is_some() {
            self.cur_tick += 1;
        }
        Ok(fix)
    }
}
