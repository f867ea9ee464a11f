//! # 数据流水线能力模块
//!
//! 采集结果从轮询任务流向下游消费者的通道：
//!
//! ```text
//! PollScheduler ──publish──▶ DataPipeline ──▶ EventQueue.main   (容量 100)
//!                                  │
//!                                  └─(设备被 LiveTap 选中)──▶ EventQueue.stream (容量 50)
//! ```
//!
//! - 队列满时淘汰最旧记录，生产者永不阻塞
//! - 加锁超时（默认 100ms）视为操作失败

mod event_queue;
mod queue;
mod tap;

pub use event_queue::{EventQueue, EventQueueConfig};
pub use queue::{BoundedQueue, DEFAULT_LOCK_TIMEOUT, Pushed, QueueError, QueueStats};
pub use tap::{DataPipeline, LiveTap, PublishOutcome};
