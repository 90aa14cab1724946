//! # Telemetry Engine
//!
//! Owns the generator, ring buffer and statistics window, and drives them
//! from a single background worker thread.
//!
//! ## Lifecycle
//!
//! ```text
//!            start()                 stop()
//! Stopped ────────────▶ Running ────────────▶ Stopped
//!    ▲  │ stop() (no-op)   │ start() (no-op)
//!    └──┘                  └──▶ Running
//! ```
//!
//! On every tick the worker asks the [`MessageSource`] for one record, writes
//! it into the [`TelemetryBuffer`] and folds it into the
//! [`StatisticsWindow`], then sleeps for the tick interval.
//!
//! The buffer and the statistics are independent shared resources: draining
//! batches never waits on statistics pruning and vice versa.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use super::buffer::TelemetryBuffer;
use super::generator::{MessageSource, SimulatedSource};
use super::message::TelemetryRecord;
use super::stats::{StatisticsWindow, TelemetryStats};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Name given to the worker thread
const WORKER_THREAD_NAME: &str = "telemetry-worker";

/// Shortest tick the worker will sleep for
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// State shared between the controller and the worker thread
struct Shared {
    buffer: TelemetryBuffer,
    stats: Mutex<StatisticsWindow>,
    source: Mutex<Box<dyn MessageSource>>,
    running: AtomicBool,
    next_seq: AtomicU64,
    epoch: Instant,
    tick_interval: Duration,
}

impl Shared {
    /// Milliseconds since the engine was created
    fn now_ms(&self) -> i64 {
        i64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(i64::MAX)
    }

    fn lock_stats(&self) -> MutexGuard<'_, StatisticsWindow> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Generate, store and account for one record
    fn tick(&self) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let timestamp_ms = self.now_ms();

        let record = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next(seq, timestamp_ms);

        trace!("Tick {} produced {:?} at {} ms", seq, record.kind(), timestamp_ms);

        self.buffer.write(record.clone());
        self.lock_stats().observe(&record);
    }

    /// Sleep for one tick interval, waking early on stop
    fn wait_for_next_tick(&self) {
        let deadline = Instant::now() + self.tick_interval;

        // park_timeout may return spuriously
        while self.running.load(Ordering::Acquire) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::park_timeout(deadline - now);
        }
    }

    fn run(&self) {
        while self.running.load(Ordering::Acquire) {
            self.tick();
            self.wait_for_next_tick();
        }
    }
}

/// Simulated telemetry engine
///
/// All methods take `&self`; the engine can be shared behind an `Arc` between
/// a control thread and a consumer thread. Callers only ever receive copies
/// of records and statistics.
///
/// # Examples
///
/// ```no_run
/// use gcs_telemetry::config::EngineConfig;
/// use gcs_telemetry::telemetry::TelemetryEngine;
///
/// let engine = TelemetryEngine::new(&EngineConfig::default());
/// engine.start()?;
/// std::thread::sleep(std::time::Duration::from_secs(1));
///
/// let batch = engine.read_batch(100);
/// let stats = engine.snapshot();
/// println!("{} records, {:.1} Hz", batch.len(), stats.rate_hz);
///
/// engine.stop();
/// # Ok::<(), gcs_telemetry::error::EngineError>(())
/// ```
pub struct TelemetryEngine {
    shared: Arc<Shared>,
    /// Worker handle; the lock also serializes start/stop
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TelemetryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryEngine")
            .field("running", &self.is_running())
            .field("buffer", &self.shared.buffer)
            .field("tick_interval", &self.shared.tick_interval)
            .finish_non_exhaustive()
    }
}

impl TelemetryEngine {
    /// Create a stopped engine backed by the simulated generator
    pub fn new(config: &EngineConfig) -> Self {
        let source = SimulatedSource::new(effective_tick_interval(config), config.seed);
        Self::with_source(config, Box::new(source))
    }

    /// Create a stopped engine with a custom message source
    ///
    /// The config is not required to have passed [`Config::validate`]:
    /// a zero tick is raised to 1 ms and oversized windows saturate.
    ///
    /// [`Config::validate`]: crate::config::Config::validate
    pub fn with_source(config: &EngineConfig, source: Box<dyn MessageSource>) -> Self {
        let window_ms = i64::try_from(config.stats_window_ms).unwrap_or(i64::MAX);

        let shared = Shared {
            buffer: TelemetryBuffer::new(config.buffer_capacity),
            stats: Mutex::new(StatisticsWindow::new(window_ms, config.sample_cap)),
            source: Mutex::new(source),
            running: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
            epoch: Instant::now(),
            tick_interval: effective_tick_interval(config),
        };

        debug!(
            "Telemetry engine created (capacity {}, tick {:?}, window {} ms)",
            shared.buffer.capacity(),
            shared.tick_interval,
            config.stats_window_ms
        );

        Self {
            shared: Arc::new(shared),
            worker: Mutex::new(None),
        }
    }

    /// Start the background worker
    ///
    /// Calling `start` while already running is a no-op and succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::WorkerSpawn`] if the worker thread cannot be
    /// created. The engine is left stopped and `start` may be retried.
    pub fn start(&self) -> Result<()> {
        self.start_with(spawn_worker)
    }

    fn start_with<F>(&self, spawn: F) -> Result<()>
    where
        F: FnOnce(Arc<Shared>) -> io::Result<JoinHandle<()>>,
    {
        let mut worker = self.lock_worker();

        if self.shared.running.load(Ordering::Acquire) {
            debug!("Telemetry engine already running");
            return Ok(());
        }

        // A worker that died on a fault has cleared `running` itself; reap it
        if let Some(handle) = worker.take() {
            Self::join_worker(handle);
        }

        info!("Starting telemetry engine");
        self.shared.running.store(true, Ordering::Release);

        match spawn(Arc::clone(&self.shared)) {
            Ok(handle) => {
                *worker = Some(handle);
                info!("Telemetry worker spawned");
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                error!("Failed to spawn telemetry worker: {}", e);
                Err(EngineError::WorkerSpawn(e))
            }
        }
    }

    /// Stop the background worker and wait for it to exit
    ///
    /// Returns within roughly one tick interval. Calling `stop` on a stopped
    /// engine returns immediately.
    pub fn stop(&self) {
        let mut worker = self.lock_worker();
        let was_running = self.shared.running.swap(false, Ordering::AcqRel);

        if let Some(handle) = worker.take() {
            handle.thread().unpark();
            Self::join_worker(handle);
        }

        if was_running {
            info!("Telemetry engine stopped");
        }
    }

    /// Check if the worker is producing records
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Drain up to `max_count` buffered records, oldest first
    ///
    /// Non-positive counts return an empty batch. Drained records are not
    /// returned again; use a single consumer.
    pub fn read_batch(&self, max_count: i32) -> Vec<TelemetryRecord> {
        match usize::try_from(max_count) {
            Ok(count) if count > 0 => self.shared.buffer.read_batch(count),
            _ => Vec::new(),
        }
    }

    /// Snapshot of the rolling statistics as of now
    pub fn snapshot(&self) -> TelemetryStats {
        let mut stats = self.shared.lock_stats();
        stats.snapshot_at(self.shared.now_ms())
    }

    /// Number of records waiting to be drained
    pub fn buffered_len(&self) -> usize {
        self.shared.buffer.len()
    }

    /// Total records produced since the engine was created
    pub fn total_generated(&self) -> u64 {
        self.shared.next_seq.load(Ordering::Relaxed)
    }

    /// Configured tick interval
    pub fn tick_interval(&self) -> Duration {
        self.shared.tick_interval
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn join_worker(handle: JoinHandle<()>) {
        match handle.join() {
            Ok(()) => debug!("Telemetry worker joined"),
            // worker_main catches its own panics; this only fires if logging itself panicked
            Err(_) => error!("Telemetry worker panicked outside its fault boundary"),
        }
    }
}

impl Drop for TelemetryEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Configured tick, raised to [`MIN_TICK_INTERVAL`]
fn effective_tick_interval(config: &EngineConfig) -> Duration {
    let tick = config.tick_interval();
    if tick < MIN_TICK_INTERVAL {
        warn!("Tick interval {:?} too short, using {:?}", tick, MIN_TICK_INTERVAL);
        return MIN_TICK_INTERVAL;
    }
    tick
}

fn spawn_worker(shared: Arc<Shared>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || worker_main(shared))
}

/// Worker thread entry point
///
/// Faults inside the tick loop are contained here: they are logged, the
/// engine is marked stopped and the thread exits normally.
fn worker_main(shared: Arc<Shared>) {
    info!("Telemetry worker started");

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| shared.run())) {
        error!("Telemetry worker aborted: {}", panic_message(payload.as_ref()));
        shared.running.store(false, Ordering::Release);
    }

    info!("Telemetry worker ended");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::generator::MockMessageSource;
    use crate::telemetry::message::{MessageKind, Payload};

    fn fast_config() -> EngineConfig {
        EngineConfig {
            tick_interval_ms: 5,
            seed: Some(1),
            ..EngineConfig::default()
        }
    }

    /// Source that fails on the given tick
    struct FaultySource {
        fail_at: u64,
    }

    impl MessageSource for FaultySource {
        fn next(&mut self, seq: u64, timestamp_ms: i64) -> TelemetryRecord {
            if seq == self.fail_at {
                panic!("synthetic sensor fault");
            }
            TelemetryRecord::new(
                seq,
                timestamp_ms,
                Payload::Attitude { yaw: 0.0, pitch: 0.0, roll: 0.0 },
            )
        }
    }

    #[test]
    fn test_new_engine_is_stopped() {
        let engine = TelemetryEngine::new(&EngineConfig::default());
        assert!(!engine.is_running());
        assert_eq!(engine.buffered_len(), 0);
        assert_eq!(engine.total_generated(), 0);
        assert_eq!(engine.tick_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_stop_without_start() {
        let engine = TelemetryEngine::new(&EngineConfig::default());
        let started = Instant::now();
        engine.stop();
        engine.stop();
        assert!(!engine.is_running());
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_read_batch_non_positive() {
        let engine = TelemetryEngine::new(&fast_config());
        engine.start().unwrap();
        thread::sleep(Duration::from_millis(30));
        engine.stop();

        assert!(engine.read_batch(0).is_empty());
        assert!(engine.read_batch(-5).is_empty());
        assert!(engine.buffered_len() > 0, "non-positive reads must not drain");
    }

    #[test]
    fn test_start_twice_runs_one_worker() {
        let engine = TelemetryEngine::new(&fast_config());
        assert!(engine.start().is_ok());
        assert!(engine.start().is_ok());
        assert!(engine.is_running());

        thread::sleep(Duration::from_millis(100));
        engine.stop();

        let batch = engine.read_batch(i32::MAX);
        assert!(!batch.is_empty());
        assert!(batch.windows(2).all(|w| w[1].seq == w[0].seq + 1));
        assert!(batch.windows(2).all(|w| w[1].timestamp_ms >= w[0].timestamp_ms));
        assert_eq!(batch.len() as u64, engine.total_generated());
    }

    #[test]
    fn test_stop_is_prompt() {
        let config = EngineConfig {
            tick_interval_ms: 2_000,
            ..EngineConfig::default()
        };
        let engine = TelemetryEngine::new(&config);
        engine.start().unwrap();
        thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        engine.stop();
        assert!(started.elapsed() < Duration::from_millis(1_000));
        assert!(!engine.is_running());
    }

    #[test]
    fn test_sequence_continues_across_restart() {
        let engine = TelemetryEngine::new(&fast_config());

        engine.start().unwrap();
        thread::sleep(Duration::from_millis(30));
        engine.stop();
        let first = engine.read_batch(i32::MAX);

        engine.start().unwrap();
        thread::sleep(Duration::from_millis(30));
        engine.stop();
        let second = engine.read_batch(i32::MAX);

        let last_first = first.last().unwrap().seq;
        assert_eq!(second[0].seq, last_first + 1);
    }

    #[test]
    fn test_scripted_source_feeds_buffer_and_stats() {
        let mut source = MockMessageSource::new();
        source.expect_next().returning(|seq, ts| {
            TelemetryRecord::new(seq, ts, Payload::Gps { lat: 1.0, lon: 2.0, alt: 42.0 })
        });

        let engine = TelemetryEngine::with_source(&fast_config(), Box::new(source));
        engine.start().unwrap();
        thread::sleep(Duration::from_millis(60));

        let stats = engine.snapshot();
        engine.stop();

        assert!(stats.message_count >= 2);
        assert_eq!(stats.avg_altitude, 42.0);
        assert_eq!(stats.avg_battery_voltage, 0.0);

        let batch = engine.read_batch(i32::MAX);
        assert!(batch.iter().all(|r| r.kind() == MessageKind::Gps));
    }

    #[test]
    fn test_worker_fault_is_contained() {
        let engine =
            TelemetryEngine::with_source(&fast_config(), Box::new(FaultySource { fail_at: 3 }));
        engine.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while engine.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!engine.is_running(), "worker should exit after the fault");

        engine.stop();
        let batch = engine.read_batch(i32::MAX);
        assert_eq!(batch.iter().map(|r| r.seq).collect::<Vec<_>>(), vec![0, 1, 2]);

        // The engine can be restarted after a fault
        assert!(engine.start().is_ok());
        engine.stop();
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(boxed.as_ref()), "owned message");

        let boxed: Box<dyn Any + Send> = Box::new(17u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn test_spawn_failure_leaves_engine_restartable() {
        let engine = TelemetryEngine::new(&fast_config());

        let result = engine.start_with(|_| {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "thread limit reached"))
        });
        assert!(matches!(result, Err(EngineError::WorkerSpawn(_))));
        assert!(!engine.is_running());

        // A later start spawns normally
        engine.start().unwrap();
        assert!(engine.is_running());
        thread::sleep(Duration::from_millis(20));
        engine.stop();
        assert!(engine.total_generated() > 0);
    }

    #[test]
    fn test_oversized_window_snapshot_does_not_panic() {
        let config = EngineConfig {
            stats_window_ms: 1u64 << 63,
            ..fast_config()
        };
        let engine = TelemetryEngine::new(&config);
        engine.start().unwrap();
        thread::sleep(Duration::from_millis(30));

        let stats = panic::catch_unwind(AssertUnwindSafe(|| engine.snapshot()))
            .expect("snapshot must not panic");
        assert!(engine.is_running(), "worker must survive observing records");
        engine.stop();

        assert!(stats.message_count > 0);
        assert!(stats.window_start_ms < 0);
    }

    #[test]
    fn test_zero_tick_is_raised_to_minimum() {
        let config = EngineConfig {
            tick_interval_ms: 0,
            ..fast_config()
        };
        let engine = TelemetryEngine::new(&config);
        assert_eq!(engine.tick_interval(), MIN_TICK_INTERVAL);

        engine.start().unwrap();
        thread::sleep(Duration::from_millis(50));
        engine.stop();

        // A spinning worker would produce far more than one record per ms
        let produced = engine.total_generated();
        assert!(produced > 0);
        assert!(produced <= 100, "{} records in 50 ms", produced);
    }

    #[test]
    fn test_drop_stops_worker() {
        let engine = TelemetryEngine::new(&fast_config());
        engine.start().unwrap();
        drop(engine);
    }
}
