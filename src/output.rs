//! # Output Module
//!
//! Emits drained telemetry batches from the runner.
//!
//! - `jsonl`: one JSON object per record (JSON Lines) on the writer
//! - `summary`: nothing on the writer; per-kind counts are logged instead

use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{debug, info};

use crate::error::Result;
use crate::telemetry::{MessageKind, TelemetryRecord};

/// How drained records are emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON Lines on stdout
    #[default]
    Jsonl,
    /// Per-kind counts in the log only
    Summary,
}

/// Batch sink writing records and tallying them per kind
pub struct RecordSink<W: Write> {
    writer: W,
    format: OutputFormat,
    totals: BTreeMap<MessageKind, u64>,
    emitted: u64,
}

impl<W: Write> RecordSink<W> {
    /// Create a sink over `writer`
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            totals: BTreeMap::new(),
            emitted: 0,
        }
    }

    /// Emit one drained batch
    ///
    /// # Errors
    ///
    /// Returns error if JSON encoding or writing fails
    pub fn emit(&mut self, batch: &[TelemetryRecord]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        for record in batch {
            if self.format == OutputFormat::Jsonl {
                serde_json::to_writer(&mut self.writer, record)?;
                self.writer.write_all(b"\n")?;
            }
            *self.totals.entry(record.kind()).or_insert(0) += 1;
        }
        self.writer.flush()?;

        self.emitted += batch.len() as u64;
        debug!(
            "Emitted {} records (seq {}..={})",
            batch.len(),
            batch[0].seq,
            batch[batch.len() - 1].seq
        );

        if self.format == OutputFormat::Summary {
            info!("Drained {} records, totals: {}", batch.len(), self.totals_line());
        }

        Ok(())
    }

    /// Records emitted so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Count of emitted records for `kind`
    pub fn total(&self, kind: MessageKind) -> u64 {
        self.totals.get(&kind).copied().unwrap_or(0)
    }

    /// Per-kind totals formatted as `Heartbeat=1 Attitude=16 ...`
    pub fn totals_line(&self) -> String {
        MessageKind::ALL
            .iter()
            .map(|kind| format!("{:?}={}", kind, self.total(*kind)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Consume the sink and return its writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}
