//! Single-producer single-consumer trigger packet queue.
//!
//! The producer side lives in the trigger-arrival context and must never
//! block; on a full queue the packet is dropped and counted. The consumer
//! side lives in the frame-ready context and may wait briefly for a packet.
//! Ownership of the two halves enforces the single-writer rule at compile
//! time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::TriggerPacket;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use tokio::sync::Notify;

/// Arrival bookkeeping shared by both halves and the activity handle.
struct QueueShared {
    /// Wakes the consumer when a packet lands
    notify: Notify,
    /// Packets accepted into the queue
    accepted: AtomicU64,
    /// Packets dropped because the queue was full
    overflow: AtomicU64,
    /// Microseconds since `created` of the last arrival; `u64::MAX` = never
    last_arrival_us: AtomicU64,
    created: Instant,
}

const NEVER: u64 = u64::MAX;

impl QueueShared {
    fn new() -> Self {
        Self {
            notify: Notify::new(),
            accepted: AtomicU64::new(0),
            overflow: AtomicU64::new(0),
            last_arrival_us: AtomicU64::new(NEVER),
            created: Instant::now(),
        }
    }

    fn record_arrival(&self) {
        let now_us = self.created.elapsed().as_micros() as u64;
        self.last_arrival_us.store(now_us, Ordering::Release);
    }

    fn idle_time(&self) -> Duration {
        let elapsed = self.created.elapsed();
        match self.last_arrival_us.load(Ordering::Acquire) {
            NEVER => elapsed,
            us => elapsed.saturating_sub(Duration::from_micros(us)),
        }
    }
}

/// Trigger packet queue factory
pub struct TriggerQueue;

impl TriggerQueue {
    /// Create the two queue halves.
    ///
    /// `slots` follows the classic ring layout where one slot distinguishes
    /// full from empty, so the usable capacity is `slots - 1`.
    pub fn with_slots(slots: usize) -> (TriggerProducer, TriggerConsumer) {
        let usable = slots.saturating_sub(1).max(1);
        let (prod, cons) = HeapRb::new(usable).split();
        let shared = Arc::new(QueueShared::new());
        (
            TriggerProducer {
                inner: prod,
                shared: Arc::clone(&shared),
            },
            TriggerConsumer {
                inner: cons,
                shared,
            },
        )
    }
}

/// Producer half, owned by the trigger-arrival context.
pub struct TriggerProducer {
    inner: HeapProd<TriggerPacket>,
    shared: Arc<QueueShared>,
}

impl TriggerProducer {
    /// Push a packet without blocking.
    ///
    /// Returns `false` when the queue is full; the packet is dropped and
    /// counted, existing contents are untouched. The arrival is recorded
    /// either way so silence detection keeps working under overflow.
    pub fn push(&mut self, packet: TriggerPacket) -> bool {
        self.shared.record_arrival();
        match self.inner.try_push(packet) {
            Ok(()) => {
                self.shared.accepted.fetch_add(1, Ordering::Relaxed);
                self.shared.notify.notify_one();
                true
            }
            Err(packet) => {
                self.shared.overflow.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("framelock_queue_overflow_total").increment(1);
                tracing::warn!(
                    trigger_counter = packet.trigger_counter,
                    "trigger queue overflow, packet dropped"
                );
                false
            }
        }
    }

    /// Activity handle for the supervisor.
    pub fn activity(&self) -> TriggerActivity {
        TriggerActivity {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Consumer half, owned by the frame-ready context.
pub struct TriggerConsumer {
    inner: HeapCons<TriggerPacket>,
    shared: Arc<QueueShared>,
}

impl TriggerConsumer {
    /// Pop the oldest packet, if any.
    pub fn pop(&mut self) -> Option<TriggerPacket> {
        self.inner.try_pop()
    }

    /// Pop the oldest packet, waiting up to `timeout` for one to arrive.
    pub async fn pop_timeout(&mut self, timeout: Duration) -> Option<TriggerPacket> {
        if let Some(packet) = self.inner.try_pop() {
            return Some(packet);
        }
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register interest before the re-check so a push between the
            // two cannot be missed: notify_one stores a permit.
            let notified = self.shared.notify.notified();
            if let Some(packet) = self.inner.try_pop() {
                return Some(packet);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.inner.try_pop();
            }
        }
    }

    /// Discard everything currently queued. Returns the discard count.
    pub fn drain(&mut self) -> usize {
        self.inner.pop_iter().count()
    }

    /// Discard everything but the newest packet and return it.
    ///
    /// Used when adopting a fresh counter baseline: packets queued before
    /// the current frame's pulse are no longer pairable.
    pub fn skip_to_freshest(&mut self) -> Option<TriggerPacket> {
        self.inner.pop_iter().last()
    }

    /// Packets currently queued.
    pub fn len(&self) -> usize {
        self.inner.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Activity handle for the supervisor.
    pub fn activity(&self) -> TriggerActivity {
        TriggerActivity {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Cloneable read-only view of trigger arrival activity.
#[derive(Clone)]
pub struct TriggerActivity {
    shared: Arc<QueueShared>,
}

impl TriggerActivity {
    /// Time since the last trigger arrival (accepted or overflowed).
    ///
    /// Before the first arrival this is the time since queue creation, so
    /// a source that never fires still reads as silent.
    pub fn idle_time(&self) -> Duration {
        self.shared.idle_time()
    }

    /// Packets accepted into the queue so far.
    pub fn accepted_count(&self) -> u64 {
        self.shared.accepted.load(Ordering::Relaxed)
    }

    /// Packets dropped on overflow so far.
    pub fn overflow_count(&self) -> u64 {
        self.shared.overflow.load(Ordering::Relaxed)
    }
}
