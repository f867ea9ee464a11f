//! 有界 FIFO 队列
//!
//! 满时淘汰最旧元素；加锁有超时上限，超时的操作视为失败（不阻塞采集任务）。

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// 默认加锁超时
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// 入队失败原因。
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("lock not acquired within {0:?}")]
    LockTimeout(Duration),
    #[error("buffer could not reserve memory")]
    Reserve,
}

/// 入队结果：是否淘汰了最旧元素。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pushed {
    Appended,
    EvictedOldest,
}

/// 队列统计。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub size: usize,
    pub max_size: usize,
    pub is_empty: bool,
    pub is_full: bool,
    /// 累计淘汰数
    pub evicted: u64,
}

/// 有界队列。
///
/// `size` / `is_empty` / `is_full` 读取最近一次已完成修改后的长度快照，
/// 不参与加锁。
pub struct BoundedQueue<T> {
    capacity: usize,
    lock_timeout: Duration,
    items: Mutex<VecDeque<T>>,
    len: AtomicUsize,
    evicted: AtomicU64,
}

impl<T: Clone> BoundedQueue<T> {
    /// 容量至少为 1。
    pub fn new(capacity: usize, lock_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lock_timeout,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            len: AtomicUsize::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    async fn lock(&self) -> Result<MutexGuard<'_, VecDeque<T>>, QueueError> {
        tokio::time::timeout(self.lock_timeout, self.items.lock())
            .await
            .map_err(|_| QueueError::LockTimeout(self.lock_timeout))
    }

    pub async fn push(&self, item: T) -> Result<Pushed, QueueError> {
        let mut items = self.lock().await?;
        let pushed = if items.len() >= self.capacity {
            items.pop_front();
            self.evicted.fetch_add(1, Ordering::Relaxed);
            Pushed::EvictedOldest
        } else {
            items.try_reserve(1).map_err(|_| QueueError::Reserve)?;
            Pushed::Appended
        };
        items.push_back(item);
        self.len.store(items.len(), Ordering::Release);
        Ok(pushed)
    }

    /// 非阻塞弹出；为空或加锁超时返回 None。
    pub async fn pop(&self) -> Option<T> {
        let mut items = self.lock().await.ok()?;
        let item = items.pop_front();
        self.len.store(items.len(), Ordering::Release);
        item
    }

    pub async fn peek(&self) -> Option<T> {
        let items = self.lock().await.ok()?;
        items.front().cloned()
    }

    /// 清空；加锁超时返回 false。
    pub async fn clear(&self) -> bool {
        match self.lock().await {
            Ok(mut items) => {
                items.clear();
                self.len.store(0, Ordering::Release);
                true
            }
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> QueueStats {
        let size = self.len();
        QueueStats {
            size,
            max_size: self.capacity,
            is_empty: size == 0,
            is_full: size >= self.capacity,
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}
