//! # Message Generator
//!
//! Synthesizes one telemetry record per tick.
//!
//! ## Schedule
//!
//! The message kind is picked from the tick counter (starting at 1):
//!
//! | Tick          | Kind      |
//! |---------------|-----------|
//! | every 20th    | Battery   |
//! | every 10th    | Heartbeat |
//! | every 5th     | GPS       |
//! | anything else | Attitude  |
//!
//! At the default 10 Hz tick this yields a battery report every 2 s, a
//! heartbeat every 2 s (offset by 1 s), GPS at 1 Hz and attitude for the rest.
//!
//! ## Payloads
//!
//! Each payload is a smooth periodic function of the simulation clock plus
//! small uniform noise. Altitude and battery voltage are stateful and drift
//! over time, clamped to `alt >= 0` and `voltage >= 10.0 V`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use super::message::{FlightMode, Payload, TelemetryRecord};

/// Source of telemetry records driven by the engine's tick loop
///
/// The simulated generator is the only implementation today; a real sensor
/// provider can be plugged in behind the same interface.
#[cfg_attr(test, mockall::automock)]
pub trait MessageSource: Send {
    /// Produce the record for the next tick
    ///
    /// # Arguments
    ///
    /// * `seq` - Sequence number assigned by the engine
    /// * `timestamp_ms` - Engine clock at generation time
    fn next(&mut self, seq: u64, timestamp_ms: i64) -> TelemetryRecord;
}

/// Simulated home latitude (degrees)
pub const HOME_LATITUDE: f64 = 37.7749;

/// Simulated home longitude (degrees)
pub const HOME_LONGITUDE: f64 = -122.4194;

/// Starting altitude in meters
pub const INITIAL_ALTITUDE_M: f64 = 100.0;

/// Fully charged 3S pack voltage
pub const FULL_BATTERY_VOLTAGE: f64 = 12.6;

/// Voltage floor, reported as 0% remaining
pub const MIN_BATTERY_VOLTAGE: f64 = 10.0;

/// Probability that a heartbeat flips the armed state
const ARM_TOGGLE_PROBABILITY: f64 = 0.05;

const BATTERY_PERIOD_TICKS: u64 = 20;
const HEARTBEAT_PERIOD_TICKS: u64 = 10;
const GPS_PERIOD_TICKS: u64 = 5;

/// Deterministic-by-schedule telemetry simulator
///
/// All simulation state (clock, drift, arming, RNG) is owned by the instance.
/// Passing the same seed produces the same payload sequence.
#[derive(Debug)]
pub struct SimulatedSource {
    rng: StdRng,
    tick_secs: f64,
    tick_count: u64,
    sim_time: f64,
    armed: bool,
    altitude: f64,
    battery_voltage: f64,
}

impl SimulatedSource {
    /// Create a simulator advancing by `tick_interval` per record
    ///
    /// # Arguments
    ///
    /// * `tick_interval` - Simulation time added on every call to `next`
    /// * `seed` - Noise seed; `None` seeds from OS entropy
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use gcs_telemetry::telemetry::generator::{MessageSource, SimulatedSource};
    ///
    /// let mut source = SimulatedSource::new(Duration::from_millis(100), Some(7));
    /// let record = source.next(0, 0);
    /// assert_eq!(record.seq, 0);
    /// ```
    pub fn new(tick_interval: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            rng,
            tick_secs: tick_interval.as_secs_f64(),
            tick_count: 0,
            sim_time: 0.0,
            armed: false,
            altitude: INITIAL_ALTITUDE_M,
            battery_voltage: FULL_BATTERY_VOLTAGE,
        }
    }

    /// Simulation clock in seconds
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Number of records generated so far
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    fn heartbeat(&mut self) -> Payload {
        if self.rng.gen_bool(ARM_TOGGLE_PROBABILITY) {
            self.armed = !self.armed;
        }

        let mode = if self.armed {
            FlightMode::Stabilize
        } else {
            FlightMode::Manual
        };

        Payload::Heartbeat {
            armed: self.armed,
            mode,
        }
    }

    fn attitude(&mut self) -> Payload {
        let t = self.sim_time;

        Payload::Attitude {
            yaw: (t * 2.0) % 360.0 + self.rng.gen_range(-0.5..0.5),
            pitch: 5.0 * (t * 0.1).sin() + self.rng.gen_range(-0.5..0.5),
            roll: 3.0 * (t * 0.15).cos() + self.rng.gen_range(-0.5..0.5),
        }
    }

    fn gps(&mut self) -> Payload {
        let t = self.sim_time;

        let lat = HOME_LATITUDE + t * 0.0001 + self.rng.gen_range(-0.00001..0.00001);
        let lon = HOME_LONGITUDE + t * 0.0001 + self.rng.gen_range(-0.00001..0.00001);

        // Slow climb/descent with jitter, never below ground
        self.altitude += (t * 0.01).sin() * 0.1 + self.rng.gen_range(-1.0..1.0);
        self.altitude = self.altitude.max(0.0);

        Payload::Gps {
            lat,
            lon,
            alt: self.altitude,
        }
    }

    fn battery(&mut self) -> Payload {
        let t = self.sim_time;

        self.battery_voltage -= t * 0.0001;
        self.battery_voltage = self.battery_voltage.max(MIN_BATTERY_VOLTAGE);

        let voltage = self.battery_voltage + self.rng.gen_range(-0.05..0.05);
        let current = 5.0 + 2.0 * (t * 0.1).sin() + self.rng.gen_range(-0.05..0.05) * 0.5;

        let percentage = (self.battery_voltage - MIN_BATTERY_VOLTAGE)
            / (FULL_BATTERY_VOLTAGE - MIN_BATTERY_VOLTAGE)
            * 100.0;

        Payload::Battery {
            voltage,
            current,
            remaining: percentage.clamp(0.0, 100.0) as i32,
        }
    }
}

impl MessageSource for SimulatedSource {
    fn next(&mut self, seq: u64, timestamp_ms: i64) -> TelemetryRecord {
        self.sim_time += self.tick_secs;
        self.tick_count += 1;

        let payload = if self.tick_count % BATTERY_PERIOD_TICKS == 0 {
            self.battery()
        } else if self.tick_count % HEARTBEAT_PERIOD_TICKS == 0 {
            self.heartbeat()
        } else if self.tick_count % GPS_PERIOD_TICKS == 0 {
            self.gps()
        } else {
            self.attitude()
        };

        TelemetryRecord::new(seq, timestamp_ms, payload)
    }
}
