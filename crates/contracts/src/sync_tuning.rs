//! Sync engine tuning contracts that can be shared across crates.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sync engine tuning
///
/// Runtime-typed view of the sync section of the blueprint. Durations are
/// already converted from the millisecond fields of the raw config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncTuning {
    /// Trigger queue slot count (one slot is sacrificed to distinguish
    /// full from empty, so usable capacity is `queue_slots - 1`)
    pub queue_slots: usize,

    /// Oldest trigger-to-frame latency still accepted as a valid match
    pub max_trigger_latency: Duration,

    /// How long a frame may wait for its trigger packet to arrive
    pub trigger_wait_timeout: Duration,

    /// Resync supervisor tick interval
    pub resync_interval: Duration,

    /// Trigger silence after which the supervisor requests re-enable
    pub trigger_stale_after: Duration,

    /// Enable request attempts during session startup before giving up
    pub startup_enable_attempts: u32,

    /// Capacity of the stamped frame channel toward the dispatcher
    pub frame_channel_capacity: usize,
}

impl SyncTuning {
    /// Usable trigger queue capacity
    pub fn usable_slots(&self) -> usize {
        self.queue_slots.saturating_sub(1)
    }
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            queue_slots: 1023,
            max_trigger_latency: Duration::from_millis(60),
            trigger_wait_timeout: Duration::from_millis(25),
            resync_interval: Duration::from_millis(500),
            trigger_stale_after: Duration::from_millis(1000),
            startup_enable_attempts: 20,
            frame_channel_capacity: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_slots() {
        let tuning = SyncTuning::default();
        assert_eq!(tuning.queue_slots, 1023);
        assert_eq!(tuning.usable_slots(), 1022);
    }
}
