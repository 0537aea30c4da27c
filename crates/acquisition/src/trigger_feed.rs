//! 触发脉冲接入
//!
//! 把 `TriggerSource` 的回调桥接到触发队列的生产端。
//! 回调线程只做一次入队，满了丢弃新脉冲，永不阻塞。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use contracts::{TriggerCallback, TriggerSource};
use sync_engine::TriggerProducer;
use tracing::{debug, trace};

use crate::config::AcquisitionMetrics;

/// Trigger feed
///
/// 队列只有一个写者：`start` 把生产端移进回调闭包，
/// 之后没有任何其他代码路径可以入队。
pub struct TriggerFeed {
    source: Box<dyn TriggerSource>,
    producer: Mutex<Option<TriggerProducer>>,
    started: Arc<AtomicBool>,
}

impl TriggerFeed {
    /// 创建新的 trigger feed
    pub fn new(source: Box<dyn TriggerSource>, producer: TriggerProducer) -> Self {
        Self {
            source,
            producer: Mutex::new(Some(producer)),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 脉冲源标识
    pub fn source_id(&self) -> &str {
        self.source.source_id()
    }

    /// 启动脉冲接入
    ///
    /// 幂等：重复调用不会注册第二个回调。
    pub fn start(&self, metrics: Arc<AcquisitionMetrics>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(producer) = self.producer.lock().unwrap().take() else {
            return;
        };

        let source_id = self.source.source_id().to_string();
        let started = self.started.clone();
        debug!(source = %source_id, "starting trigger feed");

        // 回调线程是唯一写者；锁只是满足 Fn 闭包的共享借用
        let producer = Mutex::new(producer);
        let callback: TriggerCallback = Arc::new(move |packet| {
            if !started.load(Ordering::Relaxed) {
                return;
            }

            metrics.record_pulse();
            trace!(
                source = %source_id,
                counter = packet.trigger_counter,
                "pulse received"
            );
            producer.lock().unwrap().push(packet);
        });

        self.source.listen(callback);
    }

    /// 停止脉冲接入
    pub fn stop(&self) {
        if self.started.swap(false, Ordering::SeqCst) {
            debug!(source = %self.source.source_id(), "stopping trigger feed");
            self.source.stop();
        }
    }

    /// 是否正在接入
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    use contracts::{wall_clock, TriggerPacket};
    use sync_engine::TriggerQueue;

    /// 以固定频率产脉冲的测试源
    struct TestTriggerSource {
        source_id: String,
        listening: Arc<AtomicBool>,
    }

    impl TestTriggerSource {
        fn new(source_id: &str) -> Self {
            Self {
                source_id: source_id.to_string(),
                listening: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl TriggerSource for TestTriggerSource {
        fn source_id(&self) -> &str {
            &self.source_id
        }

        fn listen(&self, callback: TriggerCallback) {
            if self.listening.swap(true, Ordering::SeqCst) {
                return;
            }

            let listening = self.listening.clone();
            thread::spawn(move || {
                let mut counter = 0u32;
                while listening.load(Ordering::Relaxed) {
                    counter = counter.wrapping_add(1);
                    callback(TriggerPacket::new(wall_clock(), counter));
                    thread::sleep(Duration::from_millis(2));
                }
            });
        }

        fn stop(&self) {
            self.listening.store(false, Ordering::SeqCst);
        }

        fn is_listening(&self) -> bool {
            self.listening.load(Ordering::Relaxed)
        }
    }

    #[tokio::test]
    async fn test_pulses_reach_the_queue() {
        let (producer, mut consumer) = TriggerQueue::with_slots(64);
        let feed = TriggerFeed::new(Box::new(TestTriggerSource::new("imu_test")), producer);
        let metrics = Arc::new(AcquisitionMetrics::new());

        feed.start(metrics.clone());
        assert!(feed.is_running());

        let first = consumer.pop_timeout(Duration::from_millis(500)).await;
        let second = consumer.pop_timeout(Duration::from_millis(500)).await;
        feed.stop();

        assert_eq!(first.map(|p| p.trigger_counter), Some(1));
        assert_eq!(second.map(|p| p.trigger_counter), Some(2));
        assert!(metrics.snapshot().pulses_received >= 2);
        assert!(!feed.is_running());
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (producer, mut consumer) = TriggerQueue::with_slots(64);
        let feed = TriggerFeed::new(Box::new(TestTriggerSource::new("imu_test")), producer);
        let metrics = Arc::new(AcquisitionMetrics::new());

        feed.start(metrics.clone());
        feed.start(metrics.clone());

        let first = consumer.pop_timeout(Duration::from_millis(500)).await;
        feed.stop();

        assert!(first.is_some());
    }

    #[tokio::test]
    async fn test_stop_suppresses_late_pulses() {
        let (producer, mut consumer) = TriggerQueue::with_slots(64);
        let feed = TriggerFeed::new(Box::new(TestTriggerSource::new("imu_test")), producer);
        let metrics = Arc::new(AcquisitionMetrics::new());

        feed.start(metrics);
        consumer.pop_timeout(Duration::from_millis(500)).await;
        feed.stop();

        // 给产脉冲线程时间观察到停止标志
        tokio::time::sleep(Duration::from_millis(20)).await;
        consumer.drain();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(consumer.is_empty());
    }
}
