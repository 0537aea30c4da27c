//! 帧接入
//!
//! 把相机回调送来的 `CaptureEvent` 转入有界 async 通道。
//! 回调线程 try_send，满了丢新帧并计数，从不阻塞相机交付线程。

use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use contracts::{CaptureEvent, FrameCallback};
use tracing::{trace, warn};

use crate::config::{AcquisitionMetrics, BackpressureConfig};
use crate::error::{AcquisitionError, Result};

/// Capture feed
///
/// 持有帧通道两端。`callback()` 生成注册给相机的交付回调，
/// `take_receiver()` 把消费端交给配对循环，只能取走一次。
pub struct CaptureFeed {
    camera_id: String,
    tx: Sender<CaptureEvent>,
    rx: Option<Receiver<CaptureEvent>>,
    metrics: Arc<AcquisitionMetrics>,
}

impl CaptureFeed {
    /// 创建新的 capture feed
    pub fn new(
        camera_id: impl Into<String>,
        config: &BackpressureConfig,
        metrics: Arc<AcquisitionMetrics>,
    ) -> Self {
        let (tx, rx) = bounded(config.channel_capacity.max(1));
        Self {
            camera_id: camera_id.into(),
            tx,
            rx: Some(rx),
            metrics,
        }
    }

    /// 相机 ID
    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    /// 生成相机交付回调
    ///
    /// 可多次调用，所有回调共享同一条通道。
    pub fn callback(&self) -> FrameCallback {
        let tx = self.tx.clone();
        let metrics = self.metrics.clone();
        let camera_id = self.camera_id.clone();

        Arc::new(move |event: CaptureEvent| {
            metrics.record_frame();

            match tx.try_send(event) {
                Ok(()) => {
                    metrics.update_queue_len(tx.len());
                    trace!(camera_id = %camera_id, "frame queued");
                }
                Err(TrySendError::Full(event)) => {
                    metrics.record_dropped();
                    metrics::counter!("framelock_capture_overflow_total").increment(1);
                    warn!(
                        camera_id = %camera_id,
                        hw_seq = event.frame.hw_seq,
                        "frame channel full, dropping newest"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(camera_id = %camera_id, "frame channel closed");
                }
            }
        })
    }

    /// 取走帧流消费端
    ///
    /// 只能调用一次。
    pub fn take_receiver(&mut self) -> Result<Receiver<CaptureEvent>> {
        self.rx.take().ok_or_else(|| AcquisitionError::ReceiverTaken {
            camera_id: self.camera_id.clone(),
        })
    }

    /// 当前通道积压长度
    pub fn queue_len(&self) -> usize {
        self.tx.len()
    }
}
