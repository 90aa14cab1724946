//! # GCS Telemetry Library
//!
//! Simulated flight telemetry engine for ground control station tooling.
//!
//! A background worker synthesizes heartbeat, attitude, GPS and battery
//! messages at a fixed tick, keeps the most recent records in a ring buffer
//! and maintains rolling rate and average statistics that callers can read
//! concurrently.

pub mod config;
pub mod error;
pub mod output;
pub mod telemetry;
