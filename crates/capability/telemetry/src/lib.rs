//! 追踪初始化与采集链路计数。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 采集链路指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub device_polls: u64,
    pub register_reads_ok: u64,
    pub register_reads_failed: u64,
    pub records_queued: u64,
    pub records_evicted: u64,
    pub records_streamed: u64,
    pub enqueue_failures: u64,
    pub persist_failures: u64,
    pub cache_loads: u64,
}

/// 采集链路指标。
pub struct TelemetryMetrics {
    device_polls: AtomicU64,
    register_reads_ok: AtomicU64,
    register_reads_failed: AtomicU64,
    records_queued: AtomicU64,
    records_evicted: AtomicU64,
    records_streamed: AtomicU64,
    enqueue_failures: AtomicU64,
    persist_failures: AtomicU64,
    cache_loads: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            device_polls: AtomicU64::new(0),
            register_reads_ok: AtomicU64::new(0),
            register_reads_failed: AtomicU64::new(0),
            records_queued: AtomicU64::new(0),
            records_evicted: AtomicU64::new(0),
            records_streamed: AtomicU64::new(0),
            enqueue_failures: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            cache_loads: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            device_polls: self.device_polls.load(Ordering::Relaxed),
            register_reads_ok: self.register_reads_ok.load(Ordering::Relaxed),
            register_reads_failed: self.register_reads_failed.load(Ordering::Relaxed),
            records_queued: self.records_queued.load(Ordering::Relaxed),
            records_evicted: self.records_evicted.load(Ordering::Relaxed),
            records_streamed: self.records_streamed.load(Ordering::Relaxed),
            enqueue_failures: self.enqueue_failures.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            cache_loads: self.cache_loads.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 记录一次设备轮询（按刷新周期触发）。
pub fn record_device_poll() {
    metrics().device_polls.fetch_add(1, Ordering::Relaxed);
}

/// 记录寄存器读取成功次数。
pub fn record_register_read_ok() {
    metrics().register_reads_ok.fetch_add(1, Ordering::Relaxed);
}

/// 记录寄存器读取失败次数。
pub fn record_register_read_failed() {
    metrics()
        .register_reads_failed
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录主队列入队次数。
pub fn record_record_queued() {
    metrics().records_queued.fetch_add(1, Ordering::Relaxed);
}

/// 记录队列满时被挤出的旧记录数。
pub fn record_record_evicted() {
    metrics().records_evicted.fetch_add(1, Ordering::Relaxed);
}

/// 记录实时流队列入队次数。
pub fn record_record_streamed() {
    metrics().records_streamed.fetch_add(1, Ordering::Relaxed);
}

/// 记录入队失败（锁超时或内存不足）。
pub fn record_enqueue_failure() {
    metrics().enqueue_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录持久化失败次数。
pub fn record_persist_failure() {
    metrics().persist_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录设备缓存从磁盘加载次数。
pub fn record_cache_load() {
    metrics().cache_loads.fetch_add(1, Ordering::Relaxed);
}
