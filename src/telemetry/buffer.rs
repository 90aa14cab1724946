//! # Telemetry Ring Buffer
//!
//! Fixed-capacity circular store of the most recent records.
//!
//! One producer (the engine worker) writes; one logical consumer drains with
//! [`TelemetryBuffer::read_batch`]. Cursors are atomics and each slot has its
//! own lock, so readers copy records out without ever blocking the writer for
//! more than a single slot copy.
//!
//! ## Overwrite Policy
//!
//! The writer never blocks. When a write would make the write cursor catch
//! up with the read cursor, the read cursor is pushed forward and the oldest
//! live record is dropped. The buffer therefore holds at most `capacity - 1`
//! live records.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::message::TelemetryRecord;

/// Default buffer capacity (10000 records = ~16 min at 10 Hz)
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// Smallest usable capacity (one live record)
const MIN_CAPACITY: usize = 2;

/// SPSC ring buffer of telemetry records
pub struct TelemetryBuffer {
    /// Pre-allocated slots, filled with default records
    slots: Box<[Mutex<TelemetryRecord>]>,
    /// Next slot to write
    write: AtomicUsize,
    /// Oldest live slot
    read: AtomicUsize,
    /// Total records written (for statistics)
    total_written: AtomicUsize,
}

impl std::fmt::Debug for TelemetryBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("total_written", &self.total_written())
            .finish_non_exhaustive()
    }
}

impl TelemetryBuffer {
    /// Create a buffer with the given number of slots
    ///
    /// Capacities below 2 are raised to 2.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        let slots: Vec<Mutex<TelemetryRecord>> = (0..capacity)
            .map(|_| Mutex::new(TelemetryRecord::default()))
            .collect();

        Self {
            slots: slots.into_boxed_slice(),
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
            total_written: AtomicUsize::new(0),
        }
    }

    /// Create a buffer with default capacity (10000 records)
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }

    /// Append a record, dropping the oldest live record if full
    ///
    /// Must only be called from the single producer.
    pub fn write(&self, record: TelemetryRecord) {
        let capacity = self.capacity();
        let write = self.write.load(Ordering::Relaxed);
        let next_write = (write + 1) % capacity;

        // The write slot is never live, so this cannot clobber unread data
        *self.slot(write) = record;

        // Full: drop the oldest record before publishing the new write cursor.
        // A failed exchange means a reader already moved past it.
        let _ = self.read.compare_exchange(
            next_write,
            (next_write + 1) % capacity,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        self.write.store(next_write, Ordering::Release);
        self.total_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Drain up to `max_count` records, oldest first
    ///
    /// Returned records are consumed: the read cursor advances past them and
    /// they will not be returned again. `max_count == 0` returns an empty
    /// batch without touching the cursor.
    ///
    /// Multiple concurrent consumers are not supported; serialize them
    /// externally.
    pub fn read_batch(&self, max_count: usize) -> Vec<TelemetryRecord> {
        if max_count == 0 {
            return Vec::new();
        }

        let capacity = self.capacity();

        loop {
            let read = self.read.load(Ordering::Acquire);
            let write = self.write.load(Ordering::Acquire);
            let count = Self::live_count(read, write, capacity).min(max_count);

            let batch: Vec<TelemetryRecord> = (0..count)
                .map(|i| self.slot((read + i) % capacity).clone())
                .collect();

            // The writer may have overwritten our oldest slot meanwhile; retry
            // from the new read cursor if so.
            if self
                .read
                .compare_exchange(
                    read,
                    (read + count) % capacity,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return batch;
            }
        }
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        let read = self.read.load(Ordering::Acquire);
        let write = self.write.load(Ordering::Acquire);
        Self::live_count(read, write, self.capacity())
    }

    /// Check if there is nothing to drain
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots (live records are capped at `capacity - 1`)
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Total records ever written, including overwritten ones
    pub fn total_written(&self) -> usize {
        self.total_written.load(Ordering::Relaxed)
    }

    fn live_count(read: usize, write: usize, capacity: usize) -> usize {
        (write + capacity - read) % capacity
    }

    fn slot(&self, index: usize) -> std::sync::MutexGuard<'_, TelemetryRecord> {
        // Slot writes are plain assignments; a poisoned slot still holds a whole record
        self.slots[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
