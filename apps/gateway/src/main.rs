//! 网关主程序：加载配置、初始化设备配置库与事件队列，按协议启动轮询调度器。

use gateway::commands::CommandHandler;
use gateway::console::{pump_stream, serve_lines};
use gw_config::AppConfig;
use gw_pipeline::{DataPipeline, EventQueue, EventQueueConfig, LiveTap};
use gw_poller::{PollScheduler, SchedulerConfig};
use gw_protocol::{ModbusRtuEngine, ModbusTcpEngine, RegisterReader, SerialSettings};
use gw_storage::{ConfigStore, FsFileStore};
use gw_telemetry::{init_tracing, metrics};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // 设备配置库：devices.json / registers.json
    let store = Arc::new(ConfigStore::new(Arc::new(FsFileStore::new(&config.data_dir))));
    store.init().await?;
    info!(
        data_dir = %config.data_dir.display(),
        devices = store.list_devices().await?.len(),
        "config_store_ready"
    );

    // 事件队列 + 实时流
    let queue = Arc::new(EventQueue::new(EventQueueConfig {
        capacity: config.queue_capacity,
        stream_capacity: config.stream_queue_capacity,
        lock_timeout: config.queue_lock_timeout(),
    }));
    let tap = Arc::new(LiveTap::new(queue.clone()));
    let pipeline = DataPipeline::new(queue.clone(), tap.clone());

    let scheduler_config = SchedulerConfig {
        tick: config.poll_tick(),
        stop_grace: config.stop_grace(),
        timer_capacity: config.device_timer_capacity,
    };
    let mut readers: Vec<Arc<dyn RegisterReader>> = Vec::new();
    if config.tcp_enabled {
        readers.push(Arc::new(ModbusTcpEngine::new(
            Duration::from_millis(config.tcp_connect_timeout_ms),
            Duration::from_millis(config.tcp_response_timeout_ms),
        )));
    }
    if config.rtu_enabled {
        let settings = SerialSettings::new(
            config.rtu_baud_rate,
            Duration::from_millis(config.rtu_response_timeout_ms),
        );
        readers.push(Arc::new(ModbusRtuEngine::open(
            [config.rtu_bus1_path.as_str(), config.rtu_bus2_path.as_str()],
            &settings,
        )));
    }
    let schedulers: Vec<PollScheduler> = readers
        .into_iter()
        .map(|reader| {
            PollScheduler::new(store.clone(), reader, pipeline.clone(), scheduler_config.clone())
        })
        .collect();
    for scheduler in &schedulers {
        scheduler.start();
    }

    // 标准输入 / 输出上的命令通道与实时流
    let handler = CommandHandler::new(store.clone(), tap.clone());
    let stdout = Arc::new(Mutex::new(tokio::io::stdout()));
    let streamer = tokio::spawn(pump_stream(queue.clone(), stdout.clone()));
    let console = {
        let stdout = stdout.clone();
        tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            if let Err(err) = serve_lines(&handler, stdin, &stdout).await {
                warn!(error = %err, "console_closed_with_error");
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown_requested");

    for scheduler in &schedulers {
        scheduler.stop().await;
    }
    console.abort();
    streamer.abort();

    let snapshot = metrics().snapshot();
    info!(
        device_polls = snapshot.device_polls,
        reads_ok = snapshot.register_reads_ok,
        reads_failed = snapshot.register_reads_failed,
        queued = snapshot.records_queued,
        evicted = snapshot.records_evicted,
        queue_size = queue.size(),
        "gateway_stopped"
    );
    Ok(())
}
