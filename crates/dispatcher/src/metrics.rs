//! Per-sink counters, shared between a handle and its worker.
//!
//! Each update also feeds the process-wide Prometheus registry, so the
//! same numbers show up on the /metrics endpoint without a second
//! bookkeeping path.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use observability::metrics::{
    record_dispatch_lag_ms, record_frame_dispatched, record_sink_dropped, record_sink_queue_depth,
};

/// Counters for one sink, labeled with its name.
#[derive(Debug)]
pub struct SinkMetrics {
    name: String,
    queue_len: AtomicUsize,
    writes: AtomicU64,
    failures: AtomicU64,
    dropped: AtomicU64,
}

impl SinkMetrics {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            queue_len: AtomicUsize::new(0),
            writes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// A write landed; `lag_ms` is frame timestamp to sink completion.
    pub fn record_write(&self, lag_ms: f64) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        record_frame_dispatched(&self.name, true);
        record_dispatch_lag_ms(&self.name, lag_ms);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        record_frame_dispatched(&self.name, false);
    }

    /// Frame dropped on a full queue.
    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        record_sink_dropped(&self.name);
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
        record_sink_queue_depth(&self.name, len);
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Consistent-enough copy of all counters for reporting.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len.load(Ordering::Relaxed),
            write_count: self.write_count(),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Point-in-time view of one sink's counters.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub write_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
}
