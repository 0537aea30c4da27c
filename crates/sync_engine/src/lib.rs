//! # Sync Engine
//!
//! 触发-帧同步引擎。
//!
//! 负责：
//! - 触发包 SPSC 队列（生产者永不阻塞，满时丢弃并计数）
//! - 帧与触发包的配对校验（计数器连续性 / 延迟窗口）
//! - 同步状态机（Synced / Unsynced，单向降级，仅监督器恢复）
//! - 周期性重同步监督（静默检测 + 使能请求）
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_engine::{FrameCorrelator, ResyncSupervisor, SyncMonitor, TriggerQueue};
//!
//! let (mut producer, consumer) = TriggerQueue::with_slots(tuning.queue_slots);
//! let monitor = Arc::new(SyncMonitor::new());
//!
//! // 触发到达上下文
//! producer.push(packet);
//!
//! // 帧就绪上下文
//! let mut correlator = FrameCorrelator::new(monitor.clone(), consumer, switch.clone(), tuning, true, info);
//! if let Some(stamped) = correlator.correlate(event).await {
//!     // 投递到 dispatcher
//! }
//!
//! // 监督上下文
//! ResyncSupervisor::new(monitor, activity, switch, tuning).spawn(shutdown);
//! ```

mod correlator;
mod monitor;
mod supervisor;
mod trigger_queue;

pub use correlator::FrameCorrelator;
pub use monitor::{CounterCheck, DesyncReason, SyncMonitor, SyncState};
pub use supervisor::ResyncSupervisor;
pub use trigger_queue::{TriggerActivity, TriggerConsumer, TriggerProducer, TriggerQueue};

// Re-export contracts types
pub use contracts::{StampMeta, StampSource, StampedFrame, SyncTuning, TriggerPacket};
