use std::io::Write;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::VelometerError;

use super::producer::FixProducer;
use super::{RawFix, TelemetrySession, TelemetrySnapshot};

/// Anything that wants to see snapshots: the console, a file writer, a
/// display bridge. Every consumer receives its own copy.
pub trait SnapshotConsumer {
    fn name(&self) -> &str;

    fn deliver(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), VelometerError>;
}

impl SnapshotConsumer for Sender<TelemetrySnapshot> {
    fn name(&self) -> &str {
        "channel"
    }

    fn deliver(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), VelometerError> {
        self.send(snapshot.clone())
            .map_err(|_| VelometerError::SnapshotBroadcastError {
                consumer: self.name().to_string(),
            })
    }
}

/// Prints one line of text per snapshot
pub struct ConsoleRenderer<W: Write> {
    out: W,
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

fn format_value(value: Option<f64>, unit: &str, unknown: &str) -> String {
    match value {
        Some(v) => format!("{:.1} {}", v, unit),
        None => unknown.to_string(),
    }
}

pub fn render_line(snapshot: &TelemetrySnapshot) -> String {
    let quarter = match snapshot.quarter_remaining_meters {
        Some(remaining) => format!("{} ({:.0} m to go)", snapshot.quarter_status, remaining),
        None => snapshot.quarter_status.to_string(),
    };
    format!(
        "[{:>5}s] speed {} | avg {} | accel {} | decel {} | dist {:.2} mi | heading {} | 1/4 mi {} (last {}, best {}) | 0-60 {} (last {}, best {})",
        snapshot.session_seconds,
        format_value(snapshot.speed_mph, "mph", "--"),
        format_value(snapshot.speed_avg, "m/s", "--"),
        format_value(snapshot.accel_current, "m/s2", "idle"),
        format_value(snapshot.decel_current, "m/s2", "idle"),
        snapshot.distance_miles,
        format_value(snapshot.heading, "deg", "n/a"),
        quarter,
        format_value(snapshot.quarter_last, "s", "--"),
        format_value(snapshot.quarter_best, "s", "--"),
        snapshot.zero_sixty_phase,
        format_value(snapshot.zero_sixty_last, "s", "--"),
        format_value(snapshot.zero_sixty_best, "s", "--"),
    )
}

impl<W: Write> SnapshotConsumer for ConsoleRenderer<W> {
    fn name(&self) -> &str {
        "console"
    }

    fn deliver(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), VelometerError> {
        writeln!(self.out, "{}", render_line(snapshot))
            .map_err(|e| VelometerError::WriterError { source: e })
    }
}

enum SessionEvent {
    Fix(RawFix),
    Tick,
    SourceClosed,
    Shutdown,
}

/// Delivers a snapshot to every consumer. A failing consumer is skipped and
/// does not stop delivery to the others.
pub fn broadcast(consumers: &mut [Box<dyn SnapshotConsumer + Send>], snapshot: &TelemetrySnapshot) {
    for consumer in consumers.iter_mut() {
        if let Err(e) = consumer.deliver(snapshot) {
            warn!("Could not deliver snapshot to {}: {}", consumer.name(), e);
        }
    }
}

/// Runs a tracking session until the producer is exhausted or a shutdown
/// request arrives on `shutdown`.
///
/// Fixes, session ticks and the shutdown request are funnelled through a
/// single channel so the session is only ever touched from this thread.
/// Returns the session so the caller can inspect its final state. The
/// consumers are left to the caller, which drops them normally.
pub fn collect_telemetry(
    mut producer: impl FixProducer + Send + 'static,
    mut session: TelemetrySession,
    consumers: &mut [Box<dyn SnapshotConsumer + Send>],
    tick_interval: Duration,
    shutdown: Receiver<()>,
) -> Result<TelemetrySession, VelometerError> {
    producer.start()?;

    let (event_tx, event_rx) = mpsc::channel::<SessionEvent>();

    let fix_tx = event_tx.clone();
    thread::spawn(move || {
        loop {
            let event = match producer.next_fix() {
                Ok(Some(fix)) => SessionEvent::Fix(fix),
                Ok(None) => SessionEvent::SourceClosed,
                Err(e) => {
                    error!("Position source failed: {}", e);
                    SessionEvent::SourceClosed
                }
            };
            let closed = matches!(event, SessionEvent::SourceClosed);
            if fix_tx.send(event).is_err() || closed {
                break;
            }
        }
    });

    // Exits once the shutdown sender is gone without a request
    let shutdown_tx = event_tx.clone();
    thread::spawn(move || {
        if shutdown.recv().is_ok() {
            let _ = shutdown_tx.send(SessionEvent::Shutdown);
        }
    });

    let (stop_ticker, ticker_stopped) = mpsc::channel::<()>();
    let tick_tx = event_tx;
    let ticker = thread::spawn(move || {
        while let Err(RecvTimeoutError::Timeout) = ticker_stopped.recv_timeout(tick_interval) {
            if tick_tx.send(SessionEvent::Tick).is_err() {
                break;
            }
        }
    });

    let started = Instant::now();
    broadcast(consumers, &session.restart());

    let mut fix_count: usize = 0;
    for event in event_rx.iter() {
        let snapshot = match event {
            SessionEvent::Fix(fix) => {
                fix_count += 1;
                session.process_fix(&fix)
            }
            SessionEvent::Tick => session.tick(started.elapsed()),
            SessionEvent::SourceClosed => break,
            SessionEvent::Shutdown => {
                info!("Shutdown requested");
                break;
            }
        };
        if let Some(snapshot) = snapshot {
            broadcast(consumers, &snapshot);
        }
    }

    drop(stop_ticker);
    if ticker.join().is_err() {
        warn!("Session ticker panicked");
    }
    info!("Tracking stopped after {} fixes", fix_count);
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TelemetryStore;
    use crate::telemetry::producer::{JsonLinesFixProducer, MockFixProducer};
    use crate::writer::SnapshotWriter;
    use std::io::Cursor;
    use tempfile::TempDir;

    struct BrokenConsumer;

    impl SnapshotConsumer for BrokenConsumer {
        fn name(&self) -> &str {
            "broken"
        }

        fn deliver(&mut self, _snapshot: &TelemetrySnapshot) -> Result<(), VelometerError> {
            Err(VelometerError::SnapshotBroadcastError {
                consumer: "broken".to_string(),
            })
        }
    }

    /// Never delivers a fix until the gate sender is dropped
    struct StalledProducer {
        gate: Receiver<()>,
    }

    impl FixProducer for StalledProducer {
        fn start(&mut self) -> Result<(), VelometerError> {
            Ok(())
        }

        fn next_fix(&mut self) -> Result<Option<RawFix>, VelometerError> {
            let _ = self.gate.recv();
            Ok(None)
        }
    }

    fn no_shutdown() -> Receiver<()> {
        mpsc::channel().1
    }

    fn fixes() -> Vec<RawFix> {
        (0..5)
            .map(|i| RawFix {
                latitude: i as f64 * 0.0001,
                longitude: 0.,
                timestamp: i as f64,
                speed: Some(i as f64),
                heading: None,
            })
            .collect()
    }

    #[test]
    fn test_broadcast_survives_failing_consumer() {
        let (tx, rx) = mpsc::channel();
        let mut consumers: Vec<Box<dyn SnapshotConsumer + Send>> =
            vec![Box::new(BrokenConsumer), Box::new(tx)];

        broadcast(&mut consumers, &TelemetrySnapshot::default());
        assert_eq!(rx.try_recv().unwrap(), TelemetrySnapshot::default());
    }

    #[test]
    fn test_collect_processes_every_fix() {
        let (tx, rx) = mpsc::channel();
        let mut consumers: Vec<Box<dyn SnapshotConsumer + Send>> =
            vec![Box::new(BrokenConsumer), Box::new(tx)];
        let session = TelemetrySession::load(TelemetryStore::in_memory());

        let session = collect_telemetry(
            MockFixProducer::from_fixes(fixes()),
            session,
            &mut consumers,
            Duration::from_secs(3600),
            no_shutdown(),
        )
        .unwrap();
        drop(consumers);

        let snapshots: Vec<TelemetrySnapshot> = rx.iter().collect();
        // One snapshot for the session start plus one per fix
        assert_eq!(snapshots.len(), 6);
        assert_eq!(snapshots.last().unwrap().speed, Some(4.));
        assert_eq!(session.snapshot().speed_max, Some(4.));
        assert!(session.snapshot().distance_meters > 0.);
    }

    #[test]
    fn test_corrupt_line_does_not_stop_tracking() {
        let mut input = Vec::new();
        for (i, fix) in fixes().iter().enumerate() {
            input.extend_from_slice(serde_json::to_string(fix).unwrap().as_bytes());
            input.push(b'\n');
            if i == 0 {
                input.extend_from_slice(b"\xff corrupt\n");
            }
        }
        let (tx, rx) = mpsc::channel();
        let mut consumers: Vec<Box<dyn SnapshotConsumer + Send>> = vec![Box::new(tx)];

        let session = collect_telemetry(
            JsonLinesFixProducer::new(Cursor::new(input), "test"),
            TelemetrySession::load(TelemetryStore::in_memory()),
            &mut consumers,
            Duration::from_secs(3600),
            no_shutdown(),
        )
        .unwrap();
        drop(consumers);

        assert_eq!(rx.iter().count(), 6);
        assert_eq!(session.snapshot().gps_timestamp, Some(4.));
        assert!(session.snapshot().distance_meters > 0.);
    }

    #[test]
    fn test_shutdown_stops_tracking_and_flushes_writer() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshots.jsonl");
        let (_gate_tx, gate_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let mut consumers: Vec<Box<dyn SnapshotConsumer + Send>> =
            vec![Box::new(SnapshotWriter::create(&path).unwrap())];

        shutdown_tx.send(()).unwrap();
        collect_telemetry(
            StalledProducer { gate: gate_rx },
            TelemetrySession::load(TelemetryStore::in_memory()),
            &mut consumers,
            Duration::from_secs(3600),
            shutdown_rx,
        )
        .unwrap();
        drop(consumers);

        let snapshots = serde_jsonlines::json_lines(&path)
            .unwrap()
            .collect::<Result<Vec<TelemetrySnapshot>, std::io::Error>>()
            .unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].session_seconds, 0);
    }

    #[test]
    fn test_unavailable_sensor_is_reported() {
        let session = TelemetrySession::load(TelemetryStore::in_memory());
        let result = collect_telemetry(
            MockFixProducer::unavailable(),
            session,
            &mut [],
            Duration::from_secs(1),
            no_shutdown(),
        );
        assert!(matches!(
            result,
            Err(VelometerError::SensorUnavailable { .. })
        ));
    }

    #[test]
    fn test_render_line_shows_unknown_values() {
        let line = render_line(&TelemetrySnapshot::default());
        assert!(line.contains("speed --"));
        assert!(line.contains("heading n/a"));
        assert!(line.contains("accel idle"));
        assert!(line.contains("1/4 mi Standby"));
        assert!(line.contains("0-60 idle"));
    }

    #[test]
    fn test_console_renderer_writes_lines() {
        let mut renderer = ConsoleRenderer::new(Vec::new());
        renderer.deliver(&TelemetrySnapshot::default()).unwrap();
        renderer.deliver(&TelemetrySnapshot::default()).unwrap();

        let output = String::from_utf8(renderer.out).unwrap();
        assert_eq!(output.lines().count(), 2);
    }
}
