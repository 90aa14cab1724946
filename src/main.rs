//! # GCS Telemetry
//!
//! Runs the simulated telemetry engine and streams drained records.
//!
//! Usage: `gcs-telemetry [config.toml]`

use anyhow::Result;
use std::io;
use std::sync::Arc;
use tokio::time::{interval, sleep, Duration};
use tracing::{debug, info};

use gcs_telemetry::config::Config;
use gcs_telemetry::output::RecordSink;
use gcs_telemetry::telemetry::TelemetryEngine;

/// Main entry point for the GCS telemetry runner
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging on stderr (stdout is reserved for JSONL output)
///    - Load configuration from the first argument, or use defaults
///    - Start the telemetry engine worker
///
/// 2. **Main Loop**
///    - Drain up to `batch_size` records every `drain_interval_ms`
///    - Log a statistics snapshot every `stats_interval_ms`
///    - Handle Ctrl+C or `run_for_secs` for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Stop the worker and drain what is left
///    - Log per-kind totals
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml > telemetry.jsonl
/// ```
///
/// Expected log output:
/// ```text
/// INFO gcs_telemetry: GCS Telemetry v0.1.0 starting...
/// INFO gcs_telemetry::telemetry::engine: Starting telemetry engine
/// INFO gcs_telemetry: 10.2 Hz over 50 msgs, avg alt 99.8 m, avg batt 12.58 V
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let (log_writer, _log_guard) = tracing_appender::non_blocking(io::stderr());
    tracing_subscriber::fmt()
        .with_writer(log_writer)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("GCS Telemetry v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            Config::load(&path)?
        }
        None => {
            info!("No configuration file given, using defaults");
            Config::default()
        }
    };
    let output = &config.output;

    let engine = Arc::new(TelemetryEngine::new(&config.engine));
    engine.start()?;

    let mut sink = RecordSink::new(io::stdout(), output.format);
    let mut drain_interval = interval(Duration::from_millis(output.drain_interval_ms));
    let mut stats_interval = interval(Duration::from_millis(output.stats_interval_ms));

    let run_for = async {
        match output.run_for_secs {
            Some(secs) => sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(run_for);

    info!("Streaming telemetry as {:?}", output.format);
    info!("Press Ctrl+C to exit");

    // Main drain loop
    loop {
        tokio::select! {
            _ = drain_interval.tick() => {
                let batch = engine.read_batch(output.batch_size_i32());
                sink.emit(&batch)?;
            }

            _ = stats_interval.tick() => {
                let stats = engine.snapshot();
                info!(
                    "{:.1} Hz over {} msgs, avg alt {:.1} m, avg batt {:.2} V",
                    stats.rate_hz, stats.message_count, stats.avg_altitude, stats.avg_battery_voltage
                );
                debug!("{} records waiting in buffer", engine.buffered_len());
            }

            _ = &mut run_for => {
                info!("Run time elapsed, shutting down...");
                break;
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    // stop() joins the worker thread
    let stopper = Arc::clone(&engine);
    tokio::task::spawn_blocking(move || stopper.stop()).await?;

    sink.emit(&engine.read_batch(i32::MAX))?;

    info!("Total records emitted: {} ({})", sink.emitted(), sink.totals_line());
    Ok(())
}
