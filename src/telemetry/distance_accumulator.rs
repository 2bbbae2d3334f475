use serde::{Deserialize, Serialize};

use super::{GeoSample, TelemetryUpdate};

/// Mean Earth radius used for great-circle distances
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DistanceState {
    pub total_meters: f64,
}

/// Great-circle distance in meters between two coordinates, haversine formula.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

/// Keeps the cumulative distance travelled. The total never decreases until
/// an explicit reset.
#[derive(Debug, Default)]
pub struct DistanceAccumulator {
    state: DistanceState,
}

impl DistanceAccumulator {
    pub fn new(state: DistanceState) -> Self {
        Self { state }
    }

    /// Returns the distance between `previous` and `current` and adds it to the
    /// total. The first fix of a session only establishes the baseline.
    pub fn update(&mut self, previous: Option<&GeoSample>, current: &GeoSample) -> f64 {
        let Some(previous) = previous else {
            return 0.;
        };

        let delta = haversine_distance(
            previous.latitude,
            previous.longitude,
            current.latitude,
            current.longitude,
        );
        if delta.is_finite() && delta > 0. {
            self.state.total_meters += delta;
        }
        delta
    }

    pub fn get(&self) -> f64 {
        self.state.total_meters
    }

    pub fn state(&self) -> &DistanceState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = DistanceState::default();
    }

    pub fn to_update(&self) -> TelemetryUpdate {
        TelemetryUpdate::Distance {
            total_meters: self.state.total_meters,
        }
    }
}
