//! # Error Types
//!
//! Custom error types for the telemetry engine using `thiserror`.

use thiserror::Error;

/// Main error type for the telemetry engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The background worker thread could not be created
    #[error("Failed to spawn telemetry worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for the telemetry engine
pub type Result<T> = std::result::Result<T, EngineError>;
