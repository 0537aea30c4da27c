//! Backpressure configuration and metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Backpressure configuration
///
/// The frame channel is bounded. When the consumer falls behind, the newest
/// frame is dropped at the device callback; the delivery thread never blocks.
#[derive(Debug, Clone)]
pub struct BackpressureConfig {
    /// Frame channel capacity
    pub channel_capacity: usize,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 32,
        }
    }
}

impl BackpressureConfig {
    /// Create new backpressure configuration
    pub fn new(channel_capacity: usize) -> Self {
        Self { channel_capacity }
    }
}

/// Acquisition metrics
#[derive(Debug, Default)]
pub struct AcquisitionMetrics {
    /// Total trigger pulses received
    pub pulses_received: AtomicU64,

    /// Total frames delivered by the device
    pub frames_received: AtomicU64,

    /// Frames dropped at the callback because the channel was full
    pub frames_dropped: AtomicU64,

    /// Frames that left the correlator with a timestamp
    pub frames_stamped: AtomicU64,

    /// Frames the correlator discarded (bad status, unsynced, validation)
    pub frames_suppressed: AtomicU64,

    /// Current frame channel length
    pub queue_len: AtomicUsize,
}

impl AcquisitionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record trigger pulse received
    pub fn record_pulse(&self) {
        self.pulses_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record frame received
    pub fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record frame dropped
    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record frame stamped
    pub fn record_stamped(&self) {
        self.frames_stamped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record frame suppressed
    pub fn record_suppressed(&self) {
        self.frames_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Update frame channel length
    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pulses_received: self.pulses_received.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_stamped: self.frames_stamped.load(Ordering::Relaxed),
            frames_suppressed: self.frames_suppressed.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Total trigger pulses received
    pub pulses_received: u64,

    /// Total frames delivered by the device
    pub frames_received: u64,

    /// Frames dropped at the callback
    pub frames_dropped: u64,

    /// Frames that left the correlator with a timestamp
    pub frames_stamped: u64,

    /// Frames the correlator discarded
    pub frames_suppressed: u64,

    /// Current frame channel length
    pub queue_len: usize,
}
