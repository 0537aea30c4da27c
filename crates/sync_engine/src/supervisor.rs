//! Periodic resync supervision.
//!
//! Watches trigger arrival activity from a low-frequency timer context.
//! Once the source has been silent for longer than the configured
//! threshold, it issues exactly one enable request per tick until pulses
//! flow again. Sync is restored only here, never implicitly.

use std::sync::Arc;

use contracts::{SyncTuning, TriggerSwitch};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::instrument;

use crate::monitor::SyncMonitor;
use crate::trigger_queue::TriggerActivity;

/// Timer-driven watchdog for the trigger source.
pub struct ResyncSupervisor<S: TriggerSwitch> {
    /// Sync state owner
    monitor: Arc<SyncMonitor>,
    /// Trigger arrival bookkeeping
    activity: TriggerActivity,
    /// Remote control of the trigger source
    switch: Arc<S>,
    /// Tick interval and silence threshold
    tuning: SyncTuning,
}

impl<S: TriggerSwitch + 'static> ResyncSupervisor<S> {
    pub fn new(
        monitor: Arc<SyncMonitor>,
        activity: TriggerActivity,
        switch: Arc<S>,
        tuning: SyncTuning,
    ) -> Self {
        Self {
            monitor,
            activity,
            switch,
            tuning,
        }
    }

    /// Spawn the supervisory loop. Stops when `shutdown` flips to true.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.tuning.resync_interval);
        // A stalled runtime must not burst several enable requests at once
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("resync supervisor stopping");
                        break;
                    }
                }
            }
        }
    }

    /// One supervisory pass: at most one enable request per call.
    #[instrument(name = "resync_tick", level = "trace", skip(self))]
    async fn tick(&self) {
        let idle = self.activity.idle_time();
        if idle <= self.tuning.trigger_stale_after {
            return;
        }

        tracing::info!(
            idle_ms = idle.as_millis() as u64,
            source = %self.switch.target(),
            "trigger source silent, requesting enable"
        );
        metrics::counter!("framelock_resync_attempts_total").increment(1);

        match self.switch.set_enabled(true).await {
            Ok(()) => {
                if self.monitor.mark_synced() {
                    metrics::counter!("framelock_resync_success_total").increment(1);
                } else {
                    tracing::debug!("enable acknowledged while already synced");
                }
            }
            Err(error) => {
                tracing::warn!(
                    source = %self.switch.target(),
                    %error,
                    "trigger enable request failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use contracts::{wall_clock, ContractError, TriggerPacket};

    use super::*;
    use crate::monitor::{CounterCheck, DesyncReason};
    use crate::trigger_queue::TriggerQueue;

    struct RecordingSwitch {
        requests: Mutex<Vec<bool>>,
        enabled: AtomicBool,
        fail: AtomicBool,
    }

    impl RecordingSwitch {
        fn new(fail: bool) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                enabled: AtomicBool::new(false),
                fail: AtomicBool::new(fail),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl TriggerSwitch for RecordingSwitch {
        fn target(&self) -> &str {
            "imu_mock"
        }

        async fn set_enabled(&self, enabled: bool) -> Result<(), ContractError> {
            self.requests.lock().unwrap().push(enabled);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ContractError::trigger_request("imu_mock", "mock failure"));
            }
            self.enabled.store(enabled, Ordering::SeqCst);
            Ok(())
        }

        fn is_enabled(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }
    }

    fn tuning(stale_after: Duration) -> SyncTuning {
        SyncTuning {
            resync_interval: Duration::from_millis(20),
            trigger_stale_after: stale_after,
            ..SyncTuning::default()
        }
    }

    fn build(
        activity: TriggerActivity,
        stale_after: Duration,
        fail: bool,
    ) -> (
        ResyncSupervisor<RecordingSwitch>,
        Arc<SyncMonitor>,
        Arc<RecordingSwitch>,
    ) {
        let monitor = Arc::new(SyncMonitor::new());
        let switch = Arc::new(RecordingSwitch::new(fail));
        let supervisor = ResyncSupervisor::new(
            Arc::clone(&monitor),
            activity,
            Arc::clone(&switch),
            tuning(stale_after),
        );
        (supervisor, monitor, switch)
    }

    #[tokio::test]
    async fn test_quiet_while_triggers_flow() {
        let (mut producer, _consumer) = TriggerQueue::with_slots(8);
        producer.push(TriggerPacket::new(wall_clock(), 1));

        let (supervisor, _monitor, switch) =
            build(producer.activity(), Duration::from_secs(1), false);
        supervisor.tick().await;
        assert_eq!(switch.request_count(), 0);
    }

    #[tokio::test]
    async fn test_one_enable_request_per_tick() {
        let (producer, _consumer) = TriggerQueue::with_slots(8);
        let (supervisor, _monitor, switch) =
            build(producer.activity(), Duration::from_millis(1), false);

        tokio::time::sleep(Duration::from_millis(10)).await;

        supervisor.tick().await;
        assert_eq!(switch.request_count(), 1);
        supervisor.tick().await;
        supervisor.tick().await;
        assert_eq!(switch.request_count(), 3);
        assert_eq!(switch.requests.lock().unwrap().as_slice(), &[true, true, true]);
    }

    #[tokio::test]
    async fn test_successful_enable_restores_sync_once() {
        let (producer, _consumer) = TriggerQueue::with_slots(8);
        let (supervisor, monitor, switch) =
            build(producer.activity(), Duration::from_millis(1), false);

        monitor.mark_unsynced(DesyncReason::TriggerTimeout {
            waited: Duration::from_millis(25),
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        supervisor.tick().await;
        assert!(monitor.is_synced());
        assert!(switch.is_enabled());

        // Baseline adopted from the next observed packet
        assert_eq!(monitor.observe_counter(7), CounterCheck::Adopted);

        // A further keep-alive enable while synced must not reset the cursor
        supervisor.tick().await;
        assert_eq!(monitor.observe_counter(8), CounterCheck::Matched);
    }

    #[tokio::test]
    async fn test_enable_failure_keeps_unsynced() {
        let (producer, _consumer) = TriggerQueue::with_slots(8);
        let (supervisor, monitor, switch) =
            build(producer.activity(), Duration::from_millis(1), true);

        monitor.mark_unsynced(DesyncReason::TriggerTimeout {
            waited: Duration::from_millis(25),
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        supervisor.tick().await;
        assert_eq!(switch.request_count(), 1);
        assert!(!monitor.is_synced());
    }

    #[tokio::test]
    async fn test_spawn_stops_on_shutdown() {
        let (producer, _consumer) = TriggerQueue::with_slots(8);
        let (supervisor, _monitor, _switch) =
            build(producer.activity(), Duration::from_secs(1), false);

        let (tx, rx) = watch::channel(false);
        let handle = supervisor.spawn(rx);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("supervisor should stop promptly")
            .unwrap();
    }
}
