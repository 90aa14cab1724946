//! # Telemetry Message Model
//!
//! Fixed-shape telemetry records produced by the engine.
//!
//! Every record carries a sequence number and a monotonic timestamp plus one
//! of four payload kinds. Records serialize as flat JSON objects tagged by
//! `"type"`:
//!
//! ```text
//! {"seq":12,"ts_ms":1300,"type":"GPS","lat":37.7761,"lon":-122.4182,"alt":101.3}
//! ```

use serde::Serialize;
use std::fmt;

/// Flight mode reported by heartbeat messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightMode {
    #[default]
    Manual,
    Stabilize,
    AltHold,
    Loiter,
    Auto,
    Rtl,
    Land,
}

impl FlightMode {
    /// Upper-case wire name of the mode (e.g. `"STABILIZE"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightMode::Manual => "MANUAL",
            FlightMode::Stabilize => "STABILIZE",
            FlightMode::AltHold => "ALT_HOLD",
            FlightMode::Loiter => "LOITER",
            FlightMode::Auto => "AUTO",
            FlightMode::Rtl => "RTL",
            FlightMode::Land => "LAND",
        }
    }
}

impl fmt::Display for FlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of a telemetry payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    Heartbeat,
    Attitude,
    Gps,
    Battery,
}

impl MessageKind {
    /// All kinds, in wire-id order
    pub const ALL: [MessageKind; 4] = [
        MessageKind::Heartbeat,
        MessageKind::Attitude,
        MessageKind::Gps,
        MessageKind::Battery,
    ];
}

/// Per-kind telemetry payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Payload {
    /// Vehicle liveness and arming state
    Heartbeat {
        armed: bool,
        mode: FlightMode,
    },

    /// Orientation in degrees
    Attitude {
        yaw: f64,
        pitch: f64,
        roll: f64,
    },

    /// Position fix (degrees, altitude in meters)
    Gps {
        lat: f64,
        lon: f64,
        alt: f64,
    },

    /// Battery pack state
    Battery {
        /// Pack voltage in volts
        voltage: f64,
        /// Current draw in amperes
        current: f64,
        /// Remaining capacity (0-100%)
        remaining: i32,
    },
}

impl Payload {
    /// Kind of this payload
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::Heartbeat { .. } => MessageKind::Heartbeat,
            Payload::Attitude { .. } => MessageKind::Attitude,
            Payload::Gps { .. } => MessageKind::Gps,
            Payload::Battery { .. } => MessageKind::Battery,
        }
    }
}

/// A single time-stamped telemetry record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    /// Generation-order sequence number, unique for the engine's lifetime
    pub seq: u64,

    /// Milliseconds since the engine's monotonic epoch
    #[serde(rename = "ts_ms")]
    pub timestamp_ms: i64,

    /// Message body
    #[serde(flatten)]
    pub payload: Payload,
}

impl TelemetryRecord {
    /// Create a record from its parts
    pub fn new(seq: u64, timestamp_ms: i64, payload: Payload) -> Self {
        Self {
            seq,
            timestamp_ms,
            payload,
        }
    }

    /// Kind of the record's payload
    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// Altitude in meters if this is a GPS record
    pub fn altitude(&self) -> Option<f64> {
        match self.payload {
            Payload::Gps { alt, .. } => Some(alt),
            _ => None,
        }
    }

    /// Battery voltage if this is a battery record
    pub fn battery_voltage(&self) -> Option<f64> {
        match self.payload {
            Payload::Battery { voltage, .. } => Some(voltage),
            _ => None,
        }
    }
}

impl Default for TelemetryRecord {
    /// Disarmed `MANUAL` heartbeat with zero sequence and timestamp
    fn default() -> Self {
        Self {
            seq: 0,
            timestamp_ms: 0,
            payload: Payload::Heartbeat {
                armed: false,
                mode: FlightMode::Manual,
            },
        }
    }
}
