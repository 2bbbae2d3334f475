use serde::{Deserialize, Serialize};

use super::{FixContext, TelemetryAnalyzer, TelemetryUpdate, is_finite_pair};

/// Persisted part of the acceleration tracker: the last usable speed sample
/// and the peak values seen so far.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AccelerationState {
    pub last_speed: Option<f64>,
    pub last_timestamp: Option<f64>,
    /// Highest positive acceleration, m/s^2
    pub peak_accel: Option<f64>,
    /// Highest deceleration magnitude, m/s^2
    pub peak_decel: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AccelerationView {
    /// Signed acceleration between the last two usable samples
    pub current: Option<f64>,
    pub accel_current: Option<f64>,
    pub decel_current: Option<f64>,
    pub peak_accel: Option<f64>,
    pub peak_decel: Option<f64>,
}

/// First difference of speed over time between consecutive fixes.
///
/// Peaks are high-water marks: they only grow, and are only cleared by
/// [`TelemetryAnalyzer::reset`].
#[derive(Debug, Default)]
pub struct AccelerationTracker {
    state: AccelerationState,
    current: Option<f64>,
}

impl AccelerationTracker {
    pub fn new(state: AccelerationState) -> Self {
        Self {
            state,
            current: None,
        }
    }

    pub fn update(&mut self, speed: Option<f64>, timestamp: f64) -> AccelerationView {
        let speed = is_finite_pair(speed, timestamp);
        self.current = None;

        if let (Some(speed), Some(last_speed), Some(last_timestamp)) =
            (speed, self.state.last_speed, self.state.last_timestamp)
        {
            let dt = timestamp - last_timestamp;
            let current = (speed - last_speed) / dt;
            if dt.is_finite() && dt > 0. && current.is_finite() {
                self.current = Some(current);
                if current > 0. {
                    self.state.peak_accel =
                        Some(self.state.peak_accel.map_or(current, |peak| peak.max(current)));
                } else if current < 0. {
                    let magnitude = current.abs();
                    self.state.peak_decel = Some(
                        self.state
                            .peak_decel
                            .map_or(magnitude, |peak| peak.max(magnitude)),
                    );
                }
            }
        }

        if let Some(speed) = speed {
            self.state.last_speed = Some(speed);
            self.state.last_timestamp = Some(timestamp);
        }

        self.view()
    }

    pub fn view(&self) -> AccelerationView {
        // A reading of exactly zero shows as zero deceleration but no acceleration
        let accel_current = self.current.filter(|c| *c > 0.);
        let decel_current = match self.current {
            Some(c) if c < 0. => Some(c.abs()),
            Some(c) if c == 0. => Some(0.),
            _ => None,
        };
        AccelerationView {
            current: self.current,
            accel_current,
            decel_current,
            peak_accel: self.state.peak_accel,
            peak_decel: self.state.peak_decel,
        }
    }

    pub fn state(&self) -> &AccelerationState {
        &self.state
    }

    pub fn to_update(&self) -> TelemetryUpdate {
        let view = self.view();
        TelemetryUpdate::Acceleration {
            accel_current: view.accel_current,
            decel_current: view.decel_current,
            peak_accel: view.peak_accel,
            peak_decel: view.peak_decel,
        }
    }
}

impl TelemetryAnalyzer for AccelerationTracker {
    fn analyze(&mut self, fix: &FixContext) -> Vec<TelemetryUpdate> {
        self.update(fix.speed_mps, fix.sample.timestamp_s);
        vec![self.to_update()]
    }

    fn restart(&mut self) {
        self.current = None;
    }

    fn reset(&mut self) {
        self.state = AccelerationState::default();
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_acceleration_from_two_samples() {
        let mut tracker = AccelerationTracker::default();
        let first = tracker.update(Some(0.), 0.);
        assert_eq!(first.current, None);

        let view = tracker.update(Some(10.), 2.);
        assert_eq!(view.current, Some(5.));
        assert_eq!(view.accel_current, Some(5.));
        assert_eq!(view.decel_current, None);
        assert_eq!(view.peak_accel, Some(5.));
        assert_eq!(view.peak_decel, None);
    }

    #[test]
    fn test_deceleration_tracks_magnitude() {
        let mut tracker = AccelerationTracker::default();
        tracker.update(Some(20.), 0.);
        let view = tracker.update(Some(10.), 2.);

        assert_eq!(view.current, Some(-5.));
        assert_eq!(view.accel_current, None);
        assert_eq!(view.decel_current, Some(5.));
        assert_eq!(view.peak_decel, Some(5.));
        assert_eq!(view.peak_accel, None);
    }

    #[test]
    fn test_zero_acceleration_shows_as_zero_decel() {
        let mut tracker = AccelerationTracker::default();
        tracker.update(Some(10.), 0.);
        let view = tracker.update(Some(10.), 1.);

        assert_eq!(view.current, Some(0.));
        assert_eq!(view.accel_current, None);
        assert_eq!(view.decel_current, Some(0.));
        assert_eq!(view.peak_accel, None);
        assert_eq!(view.peak_decel, None);
    }

    #[test]
    fn test_peaks_survive_opposite_changes() {
        let mut tracker = AccelerationTracker::default();
        tracker.update(Some(0.), 0.);
        tracker.update(Some(8.), 1.);
        tracker.update(Some(10.), 2.);
        let view = tracker.update(Some(4.), 3.);

        assert_eq!(view.peak_accel, Some(8.));
        assert_eq!(view.peak_decel, Some(6.));
    }

    #[test]
    fn test_zero_dt_is_unknown_but_updates_baseline() {
        let mut tracker = AccelerationTracker::default();
        tracker.update(Some(5.), 1.);
        let view = tracker.update(Some(9.), 1.);
        assert_eq!(view.current, None);
        assert_eq!(tracker.state().last_speed, Some(9.));

        let view = tracker.update(Some(11.), 2.);
        assert_eq!(view.current, Some(2.));
    }

    #[test]
    fn test_missing_speed_keeps_previous_baseline() {
        let mut tracker = AccelerationTracker::default();
        tracker.update(Some(0.), 0.);
        let view = tracker.update(None, 1.);
        assert_eq!(view.current, None);
        assert_eq!(tracker.state().last_timestamp, Some(0.));

        let view = tracker.update(Some(6.), 2.);
        assert_eq!(view.current, Some(3.));
    }

    #[test]
    fn test_reset_clears_peaks_and_baseline() {
        let mut tracker = AccelerationTracker::default();
        tracker.update(Some(0.), 0.);
        tracker.update(Some(10.), 1.);
        tracker.reset();

        assert_eq!(tracker.state(), &AccelerationState::default());
        assert_eq!(tracker.view(), AccelerationView::default());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_peaks_never_decrease(
            speeds in prop::collection::vec(0.0f64..60.0, 2..40),
        ) {
            let mut tracker = AccelerationTracker::default();
            let mut peak_accel = 0.;
            let mut peak_decel = 0.;

            for (i, speed) in speeds.into_iter().enumerate() {
                let view = tracker.update(Some(speed), i as f64 * 0.5);
                let accel = view.peak_accel.unwrap_or(0.);
                let decel = view.peak_decel.unwrap_or(0.);

                prop_assert!(accel >= peak_accel);
                prop_assert!(decel >= peak_decel);
                prop_assert!(decel >= 0.);
                peak_accel = accel;
                peak_decel = decel;
            }
        }
    }
}
