//! # 轮询调度能力模块
//!
//! 每种协议一个调度器，各自运行一个 tokio 任务：
//!
//! ```text
//! PollScheduler::start()
//!       │
//!       ▼
//! PollWorker（每 tick）
//!   ConfigStore.list_devices → read_device → 过滤协议
//!       │
//!       ├── DeviceTimers：refresh_rate_ms 到期才轮询
//!       ▼
//!   RegisterReader.read_value（寄存器间隔 50ms / 100ms）
//!       │
//!       ▼
//!   DataPipeline.publish
//! ```
//!
//! 单个寄存器失败只记录告警与计数，不会中断设备或本次 tick。

mod scheduler;
mod timers;

pub use scheduler::{PollScheduler, PollWorker, SchedulerConfig, SchedulerStatus, TickReport};
pub use timers::{DEFAULT_TIMER_CAPACITY, DeviceTimers};
