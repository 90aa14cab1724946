//! # Rolling Statistics Window
//!
//! Message rate and running averages over a trailing time window.
//!
//! Timestamps are pruned by time; the altitude and battery-voltage samples
//! are only capped by count. The averages can therefore cover a longer span
//! than the rate when messages are sparse.

use serde::Serialize;
use std::collections::VecDeque;

use super::message::TelemetryRecord;

/// Default trailing window length in milliseconds
pub const DEFAULT_STATS_WINDOW_MS: i64 = 5_000;

/// Default maximum number of retained altitude/voltage samples
pub const DEFAULT_SAMPLE_CAP: usize = 1_000;

/// Point-in-time statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TelemetryStats {
    /// Messages per second across the retained timestamps
    pub rate_hz: f64,

    /// Mean of retained GPS altitudes (0 if none)
    pub avg_altitude: f64,

    /// Mean of retained battery voltages (0 if none)
    #[serde(rename = "avg_batt_v")]
    pub avg_battery_voltage: f64,

    /// Number of timestamps inside the window
    pub message_count: u32,

    /// Start of the window (`now - window`)
    pub window_start_ms: i64,
}

/// Rolling aggregates fed one record at a time
///
/// Not synchronized on its own; the engine wraps it in a `Mutex`.
#[derive(Debug, Clone)]
pub struct StatisticsWindow {
    window_ms: i64,
    sample_cap: usize,
    timestamps: VecDeque<i64>,
    altitudes: VecDeque<f64>,
    battery_voltages: VecDeque<f64>,
}

impl Default for StatisticsWindow {
    fn default() -> Self {
        Self::new(DEFAULT_STATS_WINDOW_MS, DEFAULT_SAMPLE_CAP)
    }
}

impl StatisticsWindow {
    /// Create a window of `window_ms` milliseconds keeping at most
    /// `sample_cap` altitude and voltage samples each
    ///
    /// Negative windows are treated as zero.
    pub fn new(window_ms: i64, sample_cap: usize) -> Self {
        Self {
            window_ms: window_ms.max(0),
            sample_cap,
            timestamps: VecDeque::new(),
            altitudes: VecDeque::new(),
            battery_voltages: VecDeque::new(),
        }
    }

    /// Window length in milliseconds
    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    /// Fold a record into the aggregates
    ///
    /// Records must be observed in generation order (non-decreasing
    /// timestamps).
    pub fn observe(&mut self, record: &TelemetryRecord) {
        self.timestamps.push_back(record.timestamp_ms);

        if let Some(alt) = record.altitude() {
            self.altitudes.push_back(alt);
        }

        if let Some(voltage) = record.battery_voltage() {
            self.battery_voltages.push_back(voltage);
        }

        self.prune(record.timestamp_ms);
    }

    /// Drop timestamps older than `now_ms - window` and trim sample queues
    pub fn prune(&mut self, now_ms: i64) {
        let cutoff = self.window_start(now_ms);

        let stale = self.timestamps.partition_point(|&ts| ts < cutoff);
        self.timestamps.drain(..stale);

        Self::cap(&mut self.altitudes, self.sample_cap);
        Self::cap(&mut self.battery_voltages, self.sample_cap);
    }

    /// Prune against `now_ms` and compute a snapshot
    pub fn snapshot_at(&mut self, now_ms: i64) -> TelemetryStats {
        self.prune(now_ms);

        let message_count = self.timestamps.len();
        let rate_hz = match (self.timestamps.front(), self.timestamps.back()) {
            (Some(&first), Some(&last)) if message_count > 1 && last > first => {
                message_count as f64 / ((last - first) as f64 / 1000.0)
            }
            _ => 0.0,
        };

        TelemetryStats {
            rate_hz,
            avg_altitude: Self::mean(&self.altitudes),
            avg_battery_voltage: Self::mean(&self.battery_voltages),
            message_count: u32::try_from(message_count).unwrap_or(u32::MAX),
            window_start_ms: self.window_start(now_ms),
        }
    }

    /// Oldest timestamp still inside the window
    pub fn oldest_timestamp(&self) -> Option<i64> {
        self.timestamps.front().copied()
    }

    /// `now_ms - window`, saturating for very long windows
    fn window_start(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.window_ms)
    }

    fn cap(samples: &mut VecDeque<f64>, max: usize) {
        if samples.len() > max {
            let excess = samples.len() - max;
            samples.drain(..excess);
        }
    }

    fn mean(samples: &VecDeque<f64>) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }
}
