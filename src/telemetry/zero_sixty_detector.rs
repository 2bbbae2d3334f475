use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{FixContext, RunRecord, TelemetryAnalyzer, TelemetryUpdate, is_finite_pair};

/// At or below this speed the vehicle counts as stopped
pub const STOP_SPEED_MPS: f64 = 0.5;
/// 60 mph in m/s
pub const TARGET_SPEED_MPS: f64 = 26.8224;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ZeroSixtyPhase {
    #[default]
    Idle,
    Armed,
    Running,
    Cooldown,
}

impl fmt::Display for ZeroSixtyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Armed => write!(f, "armed"),
            Self::Running => write!(f, "running"),
            Self::Cooldown => write!(f, "cooldown"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZeroSixtyView {
    pub phase: ZeroSixtyPhase,
    pub last_time_seconds: Option<f64>,
    pub best_time_seconds: Option<f64>,
}

/// Times standing starts from a near-stop to 60 mph.
///
/// ```text
/// idle --stop--> armed --moving--> running --60mph--> cooldown
///                  ^                  |                   |
///                  +------stop--------+-------stop--------+
/// ```
#[derive(Debug, Default)]
pub struct ZeroSixtyDetector {
    record: RunRecord,
    phase: ZeroSixtyPhase,
    start_time: Option<f64>,
}

impl ZeroSixtyDetector {
    pub fn new(record: RunRecord) -> Self {
        Self {
            record,
            ..Default::default()
        }
    }

    pub fn update(&mut self, speed: Option<f64>, timestamp: f64) -> ZeroSixtyView {
        let Some(speed) = is_finite_pair(speed, timestamp) else {
            return self.view();
        };

        match self.phase {
            ZeroSixtyPhase::Idle => {
                if speed <= STOP_SPEED_MPS {
                    self.phase = ZeroSixtyPhase::Armed;
                }
            }
            ZeroSixtyPhase::Armed => {
                if speed > STOP_SPEED_MPS {
                    debug!("0-60 launch at t={:.2}s", timestamp);
                    self.phase = ZeroSixtyPhase::Running;
                    self.start_time = Some(timestamp);
                }
            }
            ZeroSixtyPhase::Running => {
                if speed >= TARGET_SPEED_MPS {
                    let elapsed = self.start_time.map(|start| timestamp - start);
                    self.start_time = None;
                    match elapsed.filter(|e| e.is_finite() && *e > 0.) {
                        Some(elapsed) => {
                            let new_best = self.record.record(elapsed);
                            info!(
                                "0-60 completed in {:.2}s{}",
                                elapsed,
                                if new_best { " (new best)" } else { "" }
                            );
                            self.phase = ZeroSixtyPhase::Cooldown;
                        }
                        None => self.phase = ZeroSixtyPhase::Idle,
                    }
                } else if speed <= STOP_SPEED_MPS {
                    debug!("0-60 attempt aborted");
                    self.phase = ZeroSixtyPhase::Armed;
                    self.start_time = None;
                }
            }
            ZeroSixtyPhase::Cooldown => {
                if speed <= STOP_SPEED_MPS {
                    self.phase = ZeroSixtyPhase::Armed;
                }
            }
        }

        self.view()
    }

    pub fn view(&self) -> ZeroSixtyView {
        ZeroSixtyView {
            phase: self.phase,
            last_time_seconds: self.record.last_time_seconds,
            best_time_seconds: self.record.best_time_seconds,
        }
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    pub fn to_update(&self) -> TelemetryUpdate {
        TelemetryUpdate::ZeroSixty {
            phase: self.phase,
            last: self.record.last_time_seconds,
            best: self.record.best_time_seconds,
        }
    }
}

impl TelemetryAnalyzer for ZeroSixtyDetector {
    fn analyze(&mut self, fix: &FixContext) -> Vec<TelemetryUpdate> {
        self.update(fix.speed_mps, fix.sample.timestamp_s);
        vec![self.to_update()]
    }

    fn restart(&mut self) {
        self.phase = ZeroSixtyPhase::Idle;
        self.start_time = None;
    }

    fn reset(&mut self) {
        self.restart();
        self.record = RunRecord::default();
    }
}
