use crate::queue::{BoundedQueue, DEFAULT_LOCK_TIMEOUT, Pushed, QueueError, QueueStats};
use domain::DataRecord;
use gw_telemetry::{record_enqueue_failure, record_record_evicted};
use std::time::Duration;

/// 事件队列参数。
#[derive(Debug, Clone)]
pub struct EventQueueConfig {
    pub capacity: usize,
    pub stream_capacity: usize,
    pub lock_timeout: Duration,
}

impl Default for EventQueueConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            stream_capacity: 50,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// 主队列 + 实时流队列。
///
/// 两个队列各自独立加锁、独立容量。所有入队都是"满则淘汰最旧"，
/// 返回 false 仅表示加锁超时或内存不足。
pub struct EventQueue {
    main: BoundedQueue<DataRecord>,
    stream: BoundedQueue<DataRecord>,
}

impl EventQueue {
    pub fn new(config: EventQueueConfig) -> Self {
        Self {
            main: BoundedQueue::new(config.capacity, config.lock_timeout),
            stream: BoundedQueue::new(config.stream_capacity, config.lock_timeout),
        }
    }

    pub async fn enqueue(&self, record: DataRecord) -> bool {
        accept("main", self.main.push(record).await)
    }

    pub async fn dequeue(&self) -> Option<DataRecord> {
        self.main.pop().await
    }

    pub async fn peek(&self) -> Option<DataRecord> {
        self.main.peek().await
    }

    pub fn size(&self) -> usize {
        self.main.len()
    }

    pub fn is_empty(&self) -> bool {
        self.main.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.main.is_full()
    }

    pub async fn clear(&self) -> bool {
        self.main.clear().await
    }

    pub fn stats(&self) -> QueueStats {
        self.main.stats()
    }

    pub async fn enqueue_stream(&self, record: DataRecord) -> bool {
        accept("stream", self.stream.push(record).await)
    }

    pub async fn dequeue_stream(&self) -> Option<DataRecord> {
        self.stream.pop().await
    }

    pub async fn peek_stream(&self) -> Option<DataRecord> {
        self.stream.peek().await
    }

    pub fn stream_size(&self) -> usize {
        self.stream.len()
    }

    pub fn is_stream_empty(&self) -> bool {
        self.stream.is_empty()
    }

    pub async fn clear_stream(&self) -> bool {
        self.stream.clear().await
    }

    pub fn stream_stats(&self) -> QueueStats {
        self.stream.stats()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(EventQueueConfig::default())
    }
}

fn accept(queue: &'static str, result: Result<Pushed, QueueError>) -> bool {
    match result {
        Ok(Pushed::Appended) => true,
        Ok(Pushed::EvictedOldest) => {
            record_record_evicted();
            tracing::debug!(target: "gw.queue", queue, "queue_full_evicted_oldest");
            true
        }
        Err(err) => {
            record_enqueue_failure();
            tracing::warn!(target: "gw.queue", queue, error = %err, "enqueue_failed");
            false
        }
    }
}
