use std::time::Duration;

use log::{debug, info};

use crate::storage::{
    ACCELERATION_KEY, DISTANCE_KEY, QUARTER_MILE_KEY, SPEED_STATS_KEY, TelemetryStore,
    ZERO_SIXTY_KEY,
};

use super::acceleration_tracker::AccelerationTracker;
use super::distance_accumulator::DistanceAccumulator;
use super::quarter_mile_detector::QuarterMileDetector;
use super::snapshot::now_ms;
use super::speed_resolver::resolve_speed;
use super::speed_stats::SpeedStatsAccumulator;
use super::zero_sixty_detector::ZeroSixtyDetector;
use super::{
    FixContext, GeoSample, RawFix, SnapshotAssembler, TelemetryAnalyzer, TelemetrySnapshot,
    TelemetryUpdate,
};

/// Owns every accumulator for one running process and is the only place
/// where their state changes.
///
/// Each accepted fix goes through normalization, distance, speed resolution,
/// the analyzers and finally the snapshot assembler, in that order. State is
/// written to the store after every fix.
pub struct TelemetrySession {
    store: TelemetryStore,
    distance: DistanceAccumulator,
    speed_stats: SpeedStatsAccumulator,
    acceleration: AccelerationTracker,
    quarter_mile: QuarterMileDetector,
    zero_sixty: ZeroSixtyDetector,
    assembler: SnapshotAssembler,
    previous: Option<GeoSample>,
    session_seconds: u64,
}

impl TelemetrySession {
    /// Builds a session from whatever the store holds. Missing or corrupt
    /// entries start from their defaults.
    pub fn load(store: TelemetryStore) -> Self {
        let mut session = Self {
            distance: DistanceAccumulator::new(store.load(DISTANCE_KEY)),
            speed_stats: SpeedStatsAccumulator::new(store.load(SPEED_STATS_KEY)),
            acceleration: AccelerationTracker::new(store.load(ACCELERATION_KEY)),
            quarter_mile: QuarterMileDetector::new(store.load(QUARTER_MILE_KEY)),
            zero_sixty: ZeroSixtyDetector::new(store.load(ZERO_SIXTY_KEY)),
            assembler: SnapshotAssembler::default(),
            previous: None,
            session_seconds: 0,
            store,
        };
        let updates = session.current_updates();
        session.assembler.merge(updates, now_ms());
        info!(
            "Loaded telemetry state: {:.1} m travelled, {} speed samples",
            session.distance.get(),
            session.speed_stats.get().count
        );
        session
    }

    /// Runs one fix through the pipeline. Returns `None` when the fix was
    /// dropped, either because it is invalid or because its timestamp is not
    /// after the last accepted fix.
    pub fn process_fix(&mut self, raw: &RawFix) -> Option<TelemetrySnapshot> {
        let sample = match GeoSample::from_raw(raw) {
            Ok(sample) => sample,
            Err(e) => {
                debug!("Dropping fix: {}", e);
                return None;
            }
        };
        if self
            .previous
            .as_ref()
            .is_some_and(|previous| sample.timestamp_s <= previous.timestamp_s)
        {
            debug!(
                "Dropping fix at t={}s, not after the previous fix",
                sample.timestamp_s
            );
            return None;
        }

        let previous = self.previous.take();
        let delta_meters = self.distance.update(previous.as_ref(), &sample);
        let speed_mps = resolve_speed(sample.speed_mps, delta_meters, previous.as_ref(), &sample);
        let fix = FixContext {
            sample: &sample,
            total_meters: self.distance.get(),
            speed_mps,
        };

        let mut updates = vec![
            TelemetryUpdate::Position {
                lat: sample.latitude,
                lon: sample.longitude,
                heading: sample.heading_deg,
                gps_timestamp: sample.timestamp_s,
            },
            self.distance.to_update(),
            TelemetryUpdate::Speed { current: speed_mps },
        ];
        let analyzers: [&mut dyn TelemetryAnalyzer; 4] = [
            &mut self.speed_stats,
            &mut self.acceleration,
            &mut self.quarter_mile,
            &mut self.zero_sixty,
        ];
        for analyzer in analyzers {
            updates.extend(analyzer.analyze(&fix));
        }

        self.persist();
        self.assembler.merge(updates, now_ms());
        self.previous = Some(sample);
        Some(self.assembler.snapshot())
    }

    /// Updates the session duration. Only produces a snapshot when the
    /// whole-second value actually changed.
    pub fn tick(&mut self, elapsed: Duration) -> Option<TelemetrySnapshot> {
        let seconds = elapsed.as_secs();
        if seconds == self.session_seconds {
            return None;
        }
        self.session_seconds = seconds;
        self.assembler
            .merge([TelemetryUpdate::Session { seconds }], now_ms());
        Some(self.assembler.snapshot())
    }

    /// Starts a new tracking session. Persisted values are kept, anything
    /// tied to the previous stream of fixes is dropped.
    pub fn restart(&mut self) -> TelemetrySnapshot {
        self.previous = None;
        self.session_seconds = 0;
        let analyzers: [&mut dyn TelemetryAnalyzer; 4] = [
            &mut self.speed_stats,
            &mut self.acceleration,
            &mut self.quarter_mile,
            &mut self.zero_sixty,
        ];
        for analyzer in analyzers {
            analyzer.restart();
        }

        let mut updates = self.current_updates();
        updates.push(TelemetryUpdate::Speed { current: None });
        updates.push(TelemetryUpdate::Session { seconds: 0 });
        self.assembler.merge(updates, now_ms());
        self.assembler.snapshot()
    }

    /// Zeroes every persisted accumulator and all transient state.
    pub fn reset(&mut self) -> TelemetrySnapshot {
        info!("Resetting all telemetry");
        self.distance.reset();
        let analyzers: [&mut dyn TelemetryAnalyzer; 4] = [
            &mut self.speed_stats,
            &mut self.acceleration,
            &mut self.quarter_mile,
            &mut self.zero_sixty,
        ];
        for analyzer in analyzers {
            analyzer.reset();
        }
        self.persist();

        self.previous = None;
        self.session_seconds = 0;
        self.assembler.reset(now_ms());
        self.assembler.snapshot()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.assembler.snapshot()
    }

    fn current_updates(&self) -> Vec<TelemetryUpdate> {
        vec![
            self.distance.to_update(),
            self.speed_stats.to_update(),
            self.acceleration.to_update(),
            self.quarter_mile.to_update(),
            self.zero_sixty.to_update(),
        ]
    }

    fn persist(&mut self) {
        self.store.save(DISTANCE_KEY, self.distance.state());
        self.store.save(SPEED_STATS_KEY, self.speed_stats.get());
        self.store.save(ACCELERATION_KEY, self.acceleration.state());
        self.store.save(QUARTER_MILE_KEY, self.quarter_mile.record());
        self.store.save(ZERO_SIXTY_KEY, self.zero_sixty.record());
    }
}
