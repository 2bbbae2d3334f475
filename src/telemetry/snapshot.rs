use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uom::si::f64::{Length, Velocity};
use uom::si::length::{kilometer, meter, mile};
use uom::si::velocity::{kilometer_per_hour, knot, meter_per_second, mile_per_hour};

use super::TelemetryUpdate;
use super::quarter_mile_detector::QuarterMileStatus;
use super::zero_sixty_detector::ZeroSixtyPhase;

/// The record handed to displays. Every broadcast is an independent copy.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub heading: Option<f64>,
    pub gps_timestamp: Option<f64>,

    /// Speed in m/s
    pub speed: Option<f64>,
    pub speed_mph: Option<f64>,
    pub speed_kph: Option<f64>,
    pub speed_knots: Option<f64>,
    pub speed_min: Option<f64>,
    pub speed_max: Option<f64>,
    pub speed_avg: Option<f64>,

    /// Accelerations in m/s^2
    pub accel_current: Option<f64>,
    pub decel_current: Option<f64>,
    pub peak_accel: Option<f64>,
    pub peak_decel: Option<f64>,

    pub distance_meters: f64,
    pub distance_km: f64,
    pub distance_miles: f64,

    pub quarter_status: QuarterMileStatus,
    pub quarter_remaining_meters: Option<f64>,
    pub quarter_last: Option<f64>,
    pub quarter_best: Option<f64>,

    pub zero_sixty_phase: ZeroSixtyPhase,
    pub zero_sixty_last: Option<f64>,
    pub zero_sixty_best: Option<f64>,

    pub session_seconds: u64,
    /// Wall-clock time of the last merge, milliseconds since the Unix epoch
    pub updated_at: u64,
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Single writer of the telemetry snapshot.
#[derive(Debug, Default)]
pub struct SnapshotAssembler {
    current: TelemetrySnapshot,
}

impl SnapshotAssembler {
    /// Applies the updates in order (last writer wins) and stamps the record.
    pub fn merge<I>(&mut self, updates: I, updated_at: u64)
    where
        I: IntoIterator<Item = TelemetryUpdate>,
    {
        for update in updates {
            self.apply(update);
        }
        self.current.updated_at = updated_at;
    }

    fn apply(&mut self, update: TelemetryUpdate) {
        let snapshot = &mut self.current;
        match update {
            TelemetryUpdate::Position {
                lat,
                lon,
                heading,
                gps_timestamp,
            } => {
                snapshot.lat = Some(lat);
                snapshot.lon = Some(lon);
                snapshot.heading = heading;
                snapshot.gps_timestamp = Some(gps_timestamp);
            }
            TelemetryUpdate::Speed { current } => {
                let velocity = current.map(Velocity::new::<meter_per_second>);
                snapshot.speed = current;
                snapshot.speed_mph = velocity.map(|v| v.get::<mile_per_hour>());
                snapshot.speed_kph = velocity.map(|v| v.get::<kilometer_per_hour>());
                snapshot.speed_knots = velocity.map(|v| v.get::<knot>());
            }
            TelemetryUpdate::SpeedStats { min, max, avg } => {
                snapshot.speed_min = min;
                snapshot.speed_max = max;
                snapshot.speed_avg = avg;
            }
            TelemetryUpdate::Acceleration {
                accel_current,
                decel_current,
                peak_accel,
                peak_decel,
            } => {
                snapshot.accel_current = accel_current;
                snapshot.decel_current = decel_current;
                snapshot.peak_accel = peak_accel;
                snapshot.peak_decel = peak_decel;
            }
            TelemetryUpdate::Distance { total_meters } => {
                let distance = Length::new::<meter>(total_meters);
                snapshot.distance_meters = total_meters;
                snapshot.distance_km = distance.get::<kilometer>();
                snapshot.distance_miles = distance.get::<mile>();
            }
            TelemetryUpdate::QuarterMile {
                status,
                remaining_meters,
                last,
                best,
            } => {
                snapshot.quarter_status = status;
                snapshot.quarter_remaining_meters = remaining_meters;
                snapshot.quarter_last = last;
                snapshot.quarter_best = best;
            }
            TelemetryUpdate::ZeroSixty { phase, last, best } => {
                snapshot.zero_sixty_phase = phase;
                snapshot.zero_sixty_last = last;
                snapshot.zero_sixty_best = best;
            }
            TelemetryUpdate::Session { seconds } => {
                snapshot.session_seconds = seconds;
            }
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.current.clone()
    }

    pub fn reset(&mut self, updated_at: u64) {
        self.current = TelemetrySnapshot {
            updated_at,
            ..Default::default()
        };
    }
}
