use crate::timers::{DEFAULT_TIMER_CAPACITY, DeviceTimers};
use domain::{DataRecord, DeviceRecord, Protocol, now_epoch_ms};
use gw_pipeline::DataPipeline;
use gw_protocol::RegisterReader;
use gw_storage::ConfigStore;
use gw_telemetry::{record_device_poll, record_register_read_failed, record_register_read_ok};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// 调度参数。
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// 扫描设备列表的周期
    pub tick: Duration,
    /// stop 后等待任务自行退出的时间，超时即中止
    pub stop_grace: Duration,
    pub timer_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(2),
            stop_grace: Duration::from_millis(100),
            timer_capacity: DEFAULT_TIMER_CAPACITY,
        }
    }
}

/// 调度器状态。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub protocol: Protocol,
    /// 已配置的本协议设备数
    pub device_count: usize,
}

/// 单个 tick 的统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub devices_polled: usize,
    pub records_published: usize,
    pub read_failures: usize,
}

/// 轮询任务主体：持有计时表，每个 tick 扫描一遍设备列表。
pub struct PollWorker {
    store: Arc<ConfigStore>,
    reader: Arc<dyn RegisterReader>,
    pipeline: DataPipeline,
    running: Arc<AtomicBool>,
    timers: DeviceTimers,
}

impl PollWorker {
    pub fn new(
        store: Arc<ConfigStore>,
        reader: Arc<dyn RegisterReader>,
        pipeline: DataPipeline,
        running: Arc<AtomicBool>,
        timer_capacity: usize,
    ) -> Self {
        Self {
            store,
            reader,
            pipeline,
            running,
            timers: DeviceTimers::new(timer_capacity),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run(mut self, tick: Duration, shutdown: Arc<Notify>) {
        let protocol = self.reader.protocol();
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.is_running() {
            tokio::select! {
                _ = ticker.tick() => {}
                // 过期的唤醒许可：回到循环头重新检查运行标志
                _ = shutdown.notified() => continue,
            }
            if !self.is_running() {
                break;
            }
            let report = self.run_tick().await;
            if report.devices_polled > 0 {
                debug!(
                    target: "gw.poller",
                    protocol = %protocol,
                    devices = report.devices_polled,
                    records = report.records_published,
                    failures = report.read_failures,
                    "poll_tick_done"
                );
            }
        }
        info!(target: "gw.poller", protocol = %protocol, "poll_task_exited");
    }

    /// 扫描一次设备列表，轮询到期设备。
    pub async fn run_tick(&mut self) -> TickReport {
        let tick_start = Instant::now();
        let protocol = self.reader.protocol();
        let mut report = TickReport::default();

        let device_ids = match self.store.list_devices().await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(target: "gw.poller", protocol = %protocol, error = %err, "list_devices_failed");
                return report;
            }
        };

        let mut listed = HashSet::new();
        for device_id in device_ids {
            if !self.is_running() {
                break;
            }
            let device = match self.store.read_device(&device_id).await {
                Ok(device) => device,
                Err(err) => {
                    warn!(target: "gw.poller", device_id = %device_id, error = %err, "read_device_failed");
                    continue;
                }
            };
            if device.protocol() != protocol {
                continue;
            }
            listed.insert(device_id.clone());

            let refresh = Duration::from_millis(device.config.refresh_rate_ms);
            if !self.timers.is_due(&device_id, refresh, tick_start) {
                continue;
            }
            self.timers.mark_polled(&device_id, tick_start);

            let (published, failures) = self.poll_device(&device).await;
            report.devices_polled += 1;
            report.records_published += published;
            report.read_failures += failures;
        }

        self.timers.retain_listed(&listed);
        report
    }

    /// 按顺序读取设备的全部寄存器；单个寄存器失败不影响后续寄存器。
    pub async fn poll_device(&self, device: &DeviceRecord) -> (usize, usize) {
        record_device_poll();
        let gap = self.reader.inter_register_gap();
        let mut published = 0;
        let mut failures = 0;

        for (index, register) in device.registers.iter().enumerate() {
            if !self.is_running() {
                break;
            }
            if index > 0 && !gap.is_zero() {
                tokio::time::sleep(gap).await;
            }
            match self.reader.read_value(device, register).await {
                Ok(value) => {
                    record_register_read_ok();
                    let record = DataRecord {
                        time: now_epoch_ms(),
                        name: register.config.register_name.clone(),
                        address: register.config.address,
                        datatype: register.config.data_type,
                        value,
                        device_id: device.device_id.clone(),
                        register_id: register.register_id.clone(),
                    };
                    self.pipeline.publish(record).await;
                    published += 1;
                }
                Err(err) => {
                    record_register_read_failed();
                    failures += 1;
                    warn!(
                        target: "gw.poller",
                        device_id = %device.device_id,
                        register_id = %register.register_id,
                        address = register.config.address,
                        error = %err,
                        "register_read_failed"
                    );
                }
            }
        }
        (published, failures)
    }
}

/// 单协议轮询调度器：Stopped ⇄ Running。
pub struct PollScheduler {
    store: Arc<ConfigStore>,
    reader: Arc<dyn RegisterReader>,
    pipeline: DataPipeline,
    config: SchedulerConfig,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PollScheduler {
    pub fn new(
        store: Arc<ConfigStore>,
        reader: Arc<dyn RegisterReader>,
        pipeline: DataPipeline,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            reader,
            pipeline,
            config,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            handle: Mutex::new(None),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.reader.protocol()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 启动轮询任务；已在运行时返回 false。
    pub fn start(&self) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        let worker = PollWorker::new(
            self.store.clone(),
            self.reader.clone(),
            self.pipeline.clone(),
            self.running.clone(),
            self.config.timer_capacity,
        );
        let handle = tokio::spawn(worker.run(self.config.tick, self.shutdown.clone()));
        let mut slot = self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
        info!(
            target: "gw.poller",
            protocol = %self.protocol(),
            tick_ms = self.config.tick.as_millis() as u64,
            "poll_scheduler_started"
        );
        true
    }

    /// 停止轮询任务：清除运行标志并唤醒任务，宽限期内未退出则中止。
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();

        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(mut handle) = handle else {
            return;
        };
        match tokio::time::timeout(self.config.stop_grace, &mut handle).await {
            Ok(_) => {
                info!(target: "gw.poller", protocol = %self.protocol(), "poll_scheduler_stopped");
            }
            Err(_) => {
                handle.abort();
                warn!(
                    target: "gw.poller",
                    protocol = %self.protocol(),
                    grace_ms = self.config.stop_grace.as_millis() as u64,
                    "poll_task_aborted_after_grace"
                );
            }
        }
    }

    pub async fn status(&self) -> SchedulerStatus {
        let protocol = self.protocol();
        let device_count = match self.store.devices_summary().await {
            Ok(devices) => devices.iter().filter(|d| d.protocol == protocol).count(),
            Err(err) => {
                warn!(target: "gw.poller", protocol = %protocol, error = %err, "status_device_count_failed");
                0
            }
        };
        SchedulerStatus {
            running: self.is_running(),
            protocol,
            device_count,
        }
    }
}
