pub mod acceleration_tracker;
pub mod collector;
pub mod distance_accumulator;
pub mod producer;
pub mod quarter_mile_detector;
pub mod sample;
pub mod session;
pub mod snapshot;
pub mod speed_resolver;
pub mod speed_stats;
pub mod zero_sixty_detector;

pub use collector::{ConsoleRenderer, SnapshotConsumer, collect_telemetry};
pub use sample::{GeoSample, RawFix};
pub use session::TelemetrySession;
pub use snapshot::{SnapshotAssembler, TelemetrySnapshot};

use serde::{Deserialize, Serialize};

use quarter_mile_detector::QuarterMileStatus;
use zero_sixty_detector::ZeroSixtyPhase;

/// Everything an analyzer may look at for a single accepted fix. Distance and
/// speed have already been resolved by the time analyzers run.
#[derive(Clone, Debug)]
pub struct FixContext<'a> {
    pub sample: &'a GeoSample,
    /// Cumulative distance including this fix
    pub total_meters: f64,
    /// Resolved speed in m/s, `None` when it could not be determined
    pub speed_mps: Option<f64>,
}

/// A partial update to the telemetry snapshot. Each component emits the
/// fragments it owns and the snapshot assembler merges them.
#[derive(Clone, Debug, PartialEq)]
pub enum TelemetryUpdate {
    Position {
        lat: f64,
        lon: f64,
        heading: Option<f64>,
        gps_timestamp: f64,
    },
    Speed {
        current: Option<f64>,
    },
    SpeedStats {
        min: Option<f64>,
        max: Option<f64>,
        avg: Option<f64>,
    },
    Acceleration {
        accel_current: Option<f64>,
        decel_current: Option<f64>,
        peak_accel: Option<f64>,
        peak_decel: Option<f64>,
    },
    Distance {
        total_meters: f64,
    },
    QuarterMile {
        status: QuarterMileStatus,
        remaining_meters: Option<f64>,
        last: Option<f64>,
        best: Option<f64>,
    },
    ZeroSixty {
        phase: ZeroSixtyPhase,
        last: Option<f64>,
        best: Option<f64>,
    },
    Session {
        seconds: u64,
    },
}

/// Last and best elapsed time of a timed run. The best time only ever
/// improves; ties keep the existing best.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunRecord {
    pub best_time_seconds: Option<f64>,
    pub last_time_seconds: Option<f64>,
}

impl RunRecord {
    /// Stores a finished run. Returns true when it set a new best time.
    pub fn record(&mut self, elapsed: f64) -> bool {
        self.last_time_seconds = Some(elapsed);
        match self.best_time_seconds {
            Some(best) if elapsed >= best => false,
            _ => {
                self.best_time_seconds = Some(elapsed);
                true
            }
        }
    }
}

pub trait TelemetryAnalyzer {
    fn analyze(&mut self, fix: &FixContext) -> Vec<TelemetryUpdate>;

    /// Drops the state that only lives for the duration of a tracking session.
    fn restart(&mut self) {}

    /// Zeroes every accumulated value, persisted ones included.
    fn reset(&mut self);
}

/// Both a value and the timestamp it belongs to must be finite before it can
/// take part in a time derivative.
pub(crate) fn is_finite_pair(value: Option<f64>, timestamp: f64) -> Option<f64> {
    value.filter(|v| v.is_finite() && timestamp.is_finite())
}
