use crate::event_queue::EventQueue;
use domain::DataRecord;
use gw_telemetry::{record_record_queued, record_record_streamed};
use std::sync::Arc;
use tokio::sync::RwLock;

/// 实时流选择器：当前被"盯住"的设备。
///
/// 选择变化或清除时同步清空流队列，流队列中只会出现当前设备的记录。
pub struct LiveTap {
    queue: Arc<EventQueue>,
    selected: RwLock<Option<String>>,
}

impl LiveTap {
    pub fn new(queue: Arc<EventQueue>) -> Self {
        Self {
            queue,
            selected: RwLock::new(None),
        }
    }

    pub async fn select(&self, device_id: impl Into<String>) {
        let device_id = device_id.into();
        let mut selected = self.selected.write().await;
        if selected.as_deref() == Some(device_id.as_str()) {
            return;
        }
        self.queue.clear_stream().await;
        tracing::info!(target: "gw.queue", device_id = %device_id, "live_tap_selected");
        *selected = Some(device_id);
    }

    pub async fn clear(&self) {
        let mut selected = self.selected.write().await;
        if let Some(previous) = selected.take() {
            tracing::info!(target: "gw.queue", device_id = %previous, "live_tap_cleared");
        }
        self.queue.clear_stream().await;
    }

    /// 仅当当前选择为 `device_id` 时清除（设备被删除时调用）。
    pub async fn clear_if(&self, device_id: &str) -> bool {
        let mut selected = self.selected.write().await;
        if selected.as_deref() != Some(device_id) {
            return false;
        }
        *selected = None;
        self.queue.clear_stream().await;
        tracing::info!(target: "gw.queue", device_id, "live_tap_cleared_on_delete");
        true
    }

    pub async fn selected(&self) -> Option<String> {
        self.selected.read().await.clone()
    }

    pub async fn is_tapped(&self, device_id: &str) -> bool {
        self.selected.read().await.as_deref() == Some(device_id)
    }

    /// 记录属于当前选中设备时写入流队列。
    ///
    /// 写入期间持有选择读锁，`select` / `clear` 的清空不会与写入交错。
    pub async fn stream_if_tapped(&self, record: &DataRecord) -> bool {
        let selected = self.selected.read().await;
        if selected.as_deref() != Some(record.device_id.as_str()) {
            return false;
        }
        self.queue.enqueue_stream(record.clone()).await
    }
}

/// 发布结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishOutcome {
    /// 已进入主队列
    pub queued: bool,
    /// 已进入流队列（设备未被选中时为 false）
    pub streamed: bool,
}

/// 采集结果的唯一出口：主队列 + 按需的实时流。
#[derive(Clone)]
pub struct DataPipeline {
    queue: Arc<EventQueue>,
    tap: Arc<LiveTap>,
}

impl DataPipeline {
    pub fn new(queue: Arc<EventQueue>, tap: Arc<LiveTap>) -> Self {
        Self { queue, tap }
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn tap(&self) -> &Arc<LiveTap> {
        &self.tap
    }

    pub async fn publish(&self, record: DataRecord) -> PublishOutcome {
        let streamed = self.tap.stream_if_tapped(&record).await;
        let queued = self.queue.enqueue(record).await;
        if queued {
            record_record_queued();
        }
        if streamed {
            record_record_streamed();
        }
        PublishOutcome { queued, streamed }
    }
}
