//! Sync state machine and expected-counter bookkeeping.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

/// Synchronization state
///
/// Transitions are one-directional: any validation failure degrades
/// `Synced -> Unsynced`, and only the resync supervisor restores
/// `Unsynced -> Synced` after a successful enable handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Synced,
    Unsynced,
}

/// Why a desync episode started
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DesyncReason {
    /// Popped packet's counter did not match the expected one
    CounterMismatch { expected: u32, observed: u32 },
    /// Frame was delivered before its trigger fired
    NegativeLatency { latency: f64 },
    /// Trigger-to-frame latency exceeded the tolerated bound
    StaleLatency { latency: f64, limit: f64 },
    /// No trigger packet arrived within the frame's wait budget
    TriggerTimeout { waited: Duration },
}

impl DesyncReason {
    /// Stable label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            DesyncReason::CounterMismatch { .. } => "counter_mismatch",
            DesyncReason::NegativeLatency { .. } => "negative_latency",
            DesyncReason::StaleLatency { .. } => "stale_latency",
            DesyncReason::TriggerTimeout { .. } => "trigger_timeout",
        }
    }
}

impl fmt::Display for DesyncReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesyncReason::CounterMismatch { expected, observed } => {
                write!(f, "counter mismatch: expected #{expected}, observed #{observed}")
            }
            DesyncReason::NegativeLatency { latency } => {
                write!(f, "negative latency: frame preceded trigger by {:.6}s", -latency)
            }
            DesyncReason::StaleLatency { latency, limit } => {
                write!(f, "stale trigger: latency {latency:.6}s exceeds {limit:.3}s")
            }
            DesyncReason::TriggerTimeout { waited } => {
                write!(f, "no trigger packet within {waited:?}")
            }
        }
    }
}

/// Outcome of matching an observed counter against the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterCheck {
    /// Cursor had no baseline; the observed counter was adopted
    Adopted,
    /// Observed counter matched the expectation
    Matched,
    /// Observed counter diverged; cursor left untouched
    Mismatch { expected: u32 },
}

/// Expected-counter cursor
///
/// `AdoptNext` means the baseline is re-established from the next freshly
/// observed packet rather than extrapolated from drained queue contents.
#[derive(Debug, Clone, Copy)]
enum ExpectedCounter {
    AdoptNext,
    Value(u32),
}

#[derive(Debug)]
struct MonitorInner {
    state: SyncState,
    expected: ExpectedCounter,
    episodes: u64,
    last_reason: Option<DesyncReason>,
}

/// Owner of the sync state and the expected-counter cursor.
///
/// All fields live behind one short-held lock that is never held across an
/// await point. The correlator degrades the state and advances the cursor;
/// the supervisor is the only caller allowed to restore `Synced`.
#[derive(Debug)]
pub struct SyncMonitor {
    inner: Mutex<MonitorInner>,
}

impl SyncMonitor {
    /// Entry state is `Synced` with no counter baseline; the first observed
    /// packet is adopted.
    pub fn new() -> Self {
        metrics::gauge!("framelock_sync_state").set(1.0);
        Self {
            inner: Mutex::new(MonitorInner {
                state: SyncState::Synced,
                expected: ExpectedCounter::AdoptNext,
                episodes: 0,
                last_reason: None,
            }),
        }
    }

    pub fn state(&self) -> SyncState {
        self.inner.lock().unwrap().state
    }

    pub fn is_synced(&self) -> bool {
        self.state() == SyncState::Synced
    }

    /// Whether the next observed counter will be adopted as the baseline.
    pub fn is_adopting(&self) -> bool {
        matches!(
            self.inner.lock().unwrap().expected,
            ExpectedCounter::AdoptNext
        )
    }

    /// Match an observed counter against the cursor and advance it.
    ///
    /// On `Adopted` and `Matched` the cursor moves to `observed + 1` (with
    /// wraparound). On `Mismatch` nothing moves; the caller decides whether
    /// to degrade the state.
    pub fn observe_counter(&self, observed: u32) -> CounterCheck {
        let mut inner = self.inner.lock().unwrap();
        match inner.expected {
            ExpectedCounter::AdoptNext => {
                inner.expected = ExpectedCounter::Value(observed.wrapping_add(1));
                CounterCheck::Adopted
            }
            ExpectedCounter::Value(expected) if expected == observed => {
                inner.expected = ExpectedCounter::Value(observed.wrapping_add(1));
                CounterCheck::Matched
            }
            ExpectedCounter::Value(expected) => CounterCheck::Mismatch { expected },
        }
    }

    /// Degrade to `Unsynced`, recording the reason of the episode.
    ///
    /// Idempotent: only the first call of an episode returns `true`, later
    /// calls keep the original reason. The counter baseline is discarded so
    /// recovery adopts a fresh one.
    pub fn mark_unsynced(&self, reason: DesyncReason) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == SyncState::Unsynced {
            return false;
        }
        inner.state = SyncState::Unsynced;
        inner.expected = ExpectedCounter::AdoptNext;
        inner.episodes += 1;
        inner.last_reason = Some(reason);
        drop(inner);

        tracing::warn!(%reason, "trigger not in sync");
        metrics::counter!("framelock_desync_total", "reason" => reason.label()).increment(1);
        metrics::gauge!("framelock_sync_state").set(0.0);
        true
    }

    /// Restore `Synced` after a successful enable handshake.
    ///
    /// Supervisor-only entry point. Returns `false` without touching the
    /// cursor when already synced.
    pub fn mark_synced(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == SyncState::Synced {
            return false;
        }
        inner.state = SyncState::Synced;
        inner.expected = ExpectedCounter::AdoptNext;
        drop(inner);

        tracing::info!("sync restored, counter baseline will be re-adopted");
        metrics::gauge!("framelock_sync_state").set(1.0);
        true
    }

    /// Desync episodes since creation.
    pub fn episode_count(&self) -> u64 {
        self.inner.lock().unwrap().episodes
    }

    /// Reason of the most recent episode.
    pub fn last_reason(&self) -> Option<DesyncReason> {
        self.inner.lock().unwrap().last_reason
    }
}

impl Default for SyncMonitor {
    fn default() -> Self {
        Self::new()
    }
}
