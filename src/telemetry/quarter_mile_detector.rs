use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{FixContext, RunRecord, TelemetryAnalyzer, TelemetryUpdate, is_finite_pair};

/// One quarter mile in meters
pub const QUARTER_MILE_M: f64 = 402.336;
/// Speed at or above which a run is armed. Filters GPS jitter near a stop.
pub const ARM_SPEED_MPS: f64 = 1.0;
/// Speed below which an armed run is abandoned
pub const ABANDON_SPEED_MPS: f64 = 0.5;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum QuarterMileStatus {
    #[default]
    Standby,
    Running,
    Completed,
}

impl fmt::Display for QuarterMileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standby => write!(f, "Standby"),
            Self::Running => write!(f, "Running"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ArmPoint {
    distance: f64,
    time: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuarterMileView {
    pub status: QuarterMileStatus,
    /// Distance left in the current run, only while running
    pub remaining_meters: Option<f64>,
    pub last_time_seconds: Option<f64>,
    pub best_time_seconds: Option<f64>,
}

/// Times quarter-mile runs from the moment the vehicle starts moving.
///
/// Runs are "rolling": the detector arms on any motion above
/// [`ARM_SPEED_MPS`], not only from a standing start.
#[derive(Debug, Default)]
pub struct QuarterMileDetector {
    record: RunRecord,
    armed: Option<ArmPoint>,
    status: QuarterMileStatus,
    remaining_meters: Option<f64>,
}

impl QuarterMileDetector {
    pub fn new(record: RunRecord) -> Self {
        Self {
            record,
            ..Default::default()
        }
    }

    pub fn update(
        &mut self,
        speed: Option<f64>,
        total_distance: f64,
        timestamp: f64,
    ) -> QuarterMileView {
        if !timestamp.is_finite() || !total_distance.is_finite() {
            return self.view();
        }
        let speed = is_finite_pair(speed, timestamp);

        match self.armed {
            None => {
                if speed.is_some_and(|s| s >= ARM_SPEED_MPS) {
                    debug!(
                        "Quarter mile armed at {:.1} m, t={:.2}s",
                        total_distance, timestamp
                    );
                    self.armed = Some(ArmPoint {
                        distance: total_distance,
                        time: timestamp,
                    });
                    self.status = QuarterMileStatus::Running;
                    self.remaining_meters = Some(QUARTER_MILE_M);
                }
            }
            Some(arm) => {
                let covered = total_distance - arm.distance;
                if covered >= QUARTER_MILE_M {
                    self.armed = None;
                    self.remaining_meters = None;

                    let elapsed = timestamp - arm.time;
                    if elapsed.is_finite() && elapsed > 0. {
                        let new_best = self.record.record(elapsed);
                        info!(
                            "Quarter mile completed in {:.2}s{}",
                            elapsed,
                            if new_best { " (new best)" } else { "" }
                        );
                        self.status = QuarterMileStatus::Completed;
                    } else {
                        self.status = QuarterMileStatus::Standby;
                    }
                } else if speed.is_some_and(|s| s < ABANDON_SPEED_MPS) {
                    debug!("Quarter mile abandoned after {:.1} m", covered);
                    self.armed = None;
                    self.status = QuarterMileStatus::Standby;
                    self.remaining_meters = None;
                } else {
                    self.remaining_meters = Some(QUARTER_MILE_M - covered.max(0.));
                }
            }
        }

        self.view()
    }

    pub fn view(&self) -> QuarterMileView {
        QuarterMileView {
            status: self.status,
            remaining_meters: self.remaining_meters,
            last_time_seconds: self.record.last_time_seconds,
            best_time_seconds: self.record.best_time_seconds,
        }
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    pub fn to_update(&self) -> TelemetryUpdate {
        TelemetryUpdate::QuarterMile {
            status: self.status,
            remaining_meters: self.remaining_meters,
            last: self.record.last_time_seconds,
            best: self.record.best_time_seconds,
        }
    }
}

impl TelemetryAnalyzer for QuarterMileDetector {
    fn analyze(&mut self, fix: &FixContext) -> Vec<TelemetryUpdate> {
        self.update(fix.speed_mps, fix.total_meters, fix.sample.timestamp_s);
        vec![self.to_update()]
    }

    fn restart(&mut self) {
        self.armed = None;
        self.status = QuarterMileStatus::Standby;
        self.remaining_meters = None;
    }

    fn reset(&mut self) {
        self.restart();
        self.record = RunRecord::default();
    }
}
