use serde::{Deserialize, Serialize};

use super::{FixContext, TelemetryAnalyzer, TelemetryUpdate};

/// Running statistics over every resolved speed.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeedStats {
    pub count: u64,
    pub total_speed: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl SpeedStats {
    /// Always derived from the totals rather than kept as a running mean.
    pub fn average(&self) -> Option<f64> {
        if self.count > 0 {
            Some(self.total_speed / self.count as f64)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct SpeedStatsAccumulator {
    stats: SpeedStats,
}

impl SpeedStatsAccumulator {
    pub fn new(stats: SpeedStats) -> Self {
        Self { stats }
    }

    pub fn update(&mut self, speed: f64) -> &SpeedStats {
        let total_speed = self.stats.total_speed + speed;
        // A non-finite total could not be persisted
        if !speed.is_finite() || !total_speed.is_finite() {
            return &self.stats;
        }

        self.stats.count += 1;
        self.stats.total_speed = total_speed;
        self.stats.min = Some(self.stats.min.map_or(speed, |min| min.min(speed)));
        self.stats.max = Some(self.stats.max.map_or(speed, |max| max.max(speed)));
        &self.stats
    }

    pub fn get(&self) -> &SpeedStats {
        &self.stats
    }

    pub fn to_update(&self) -> TelemetryUpdate {
        TelemetryUpdate::SpeedStats {
            min: self.stats.min,
            max: self.stats.max,
            avg: self.stats.average(),
        }
    }
}

impl TelemetryAnalyzer for SpeedStatsAccumulator {
    fn analyze(&mut self, fix: &FixContext) -> Vec<TelemetryUpdate> {
        if let Some(speed) = fix.speed_mps {
            self.update(speed);
        }
        vec![self.to_update()]
    }

    fn reset(&mut self) {
        self.stats = SpeedStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_average_min_max() {
        let mut accumulator = SpeedStatsAccumulator::default();
        for speed in [10., 20., 30.] {
            accumulator.update(speed);
        }

        let stats = accumulator.get();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.average(), Some(20.));
        assert_eq!(stats.min, Some(10.));
        assert_eq!(stats.max, Some(30.));
    }

    #[test]
    fn test_empty_stats_have_no_average() {
        let accumulator = SpeedStatsAccumulator::default();
        assert_eq!(accumulator.get().average(), None);
        assert_eq!(accumulator.get().min, None);
        assert_eq!(accumulator.get().max, None);
    }

    #[test]
    fn test_non_finite_speed_ignored() {
        let mut accumulator = SpeedStatsAccumulator::default();
        accumulator.update(5.);
        accumulator.update(f64::NAN);
        accumulator.update(f64::INFINITY);

        assert_eq!(accumulator.get().count, 1);
        assert_eq!(accumulator.get().max, Some(5.));
    }

    #[test]
    fn test_speed_overflowing_total_is_skipped() {
        let mut accumulator = SpeedStatsAccumulator::default();
        accumulator.update(f64::MAX);
        accumulator.update(f64::MAX);

        let stats = accumulator.get();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.total_speed, f64::MAX);
        assert_eq!(stats.average(), Some(f64::MAX));

        let json = serde_json::to_string(stats).unwrap();
        assert_eq!(serde_json::from_str::<SpeedStats>(&json).unwrap(), *stats);
    }

    #[test]
    fn test_first_value_seeds_min_and_max() {
        let mut accumulator = SpeedStatsAccumulator::default();
        accumulator.update(0.);
        assert_eq!(accumulator.get().min, Some(0.));
        assert_eq!(accumulator.get().max, Some(0.));
    }

    #[test]
    fn test_reset() {
        let mut accumulator = SpeedStatsAccumulator::default();
        accumulator.update(12.);
        accumulator.reset();
        assert_eq!(accumulator.get(), &SpeedStats::default());
    }

    #[test]
    fn test_get_is_idempotent() {
        let mut accumulator = SpeedStatsAccumulator::default();
        accumulator.update(12.);
        assert_eq!(accumulator.get().clone(), accumulator.get().clone());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_average_between_min_and_max(
            speeds in prop::collection::vec(0.0f64..100.0, 1..50),
        ) {
            let mut accumulator = SpeedStatsAccumulator::default();
            for speed in &speeds {
                accumulator.update(*speed);
            }

            let stats = accumulator.get();
            let avg = stats.average().unwrap();
            prop_assert_eq!(stats.count as usize, speeds.len());
            prop_assert!(stats.min.unwrap() <= avg + 1e-9);
            prop_assert!(avg <= stats.max.unwrap() + 1e-9);
        }
    }
}
