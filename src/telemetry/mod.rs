//! # Telemetry Module
//!
//! Simulated flight telemetry generation, buffering and statistics.
//!
//! This module handles:
//! - Synthesizing heartbeat, attitude, GPS and battery messages at a fixed tick
//! - Storing the most recent records in an overwrite-when-full ring buffer
//! - Maintaining message rate and running averages over a trailing window
//! - Running the tick loop on a background worker with start/stop control

pub mod buffer;
pub mod engine;
pub mod generator;
pub mod message;
pub mod stats;

pub use buffer::{TelemetryBuffer, DEFAULT_BUFFER_CAPACITY};
pub use engine::TelemetryEngine;
pub use generator::{MessageSource, SimulatedSource};
pub use message::{FlightMode, MessageKind, Payload, TelemetryRecord};
pub use stats::{StatisticsWindow, TelemetryStats, DEFAULT_SAMPLE_CAP, DEFAULT_STATS_WINDOW_MS};
