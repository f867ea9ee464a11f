//! 网关运行配置加载。

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 网关运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 设备配置文件所在目录
    pub data_dir: PathBuf,
    pub tcp_enabled: bool,
    pub rtu_enabled: bool,
    pub poll_tick_ms: u64,
    pub stop_grace_ms: u64,
    pub device_timer_capacity: usize,
    pub queue_capacity: usize,
    pub stream_queue_capacity: usize,
    pub queue_lock_timeout_ms: u64,
    pub tcp_connect_timeout_ms: u64,
    pub tcp_response_timeout_ms: u64,
    pub rtu_bus1_path: String,
    pub rtu_bus2_path: String,
    pub rtu_baud_rate: u32,
    pub rtu_response_timeout_ms: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = PathBuf::from(read_path_with_default("GW_DATA_DIR", "data")?);
        let tcp_enabled = read_bool_with_default("GW_TCP_ENABLED", true);
        let rtu_enabled = read_bool_with_default("GW_RTU_ENABLED", true);
        let poll_tick_ms = read_positive_u64("GW_POLL_TICK_MS", 2000)?;
        let stop_grace_ms = read_u64_with_default("GW_STOP_GRACE_MS", 100)?;
        let device_timer_capacity = read_usize_with_default("GW_DEVICE_TIMER_CAPACITY", 10)?;
        let queue_capacity = read_positive_usize("GW_QUEUE_CAPACITY", 100)?;
        let stream_queue_capacity = read_positive_usize("GW_STREAM_QUEUE_CAPACITY", 50)?;
        let queue_lock_timeout_ms = read_u64_with_default("GW_QUEUE_LOCK_TIMEOUT_MS", 100)?;
        let tcp_connect_timeout_ms = read_positive_u64("GW_TCP_CONNECT_TIMEOUT_MS", 5000)?;
        let tcp_response_timeout_ms = read_positive_u64("GW_TCP_RESPONSE_TIMEOUT_MS", 5000)?;
        let rtu_bus1_path = read_path_with_default("GW_RTU_BUS1_PATH", "/dev/ttyS1")?;
        let rtu_bus2_path = read_path_with_default("GW_RTU_BUS2_PATH", "/dev/ttyS2")?;
        let rtu_baud_rate = read_u32_with_default("GW_RTU_BAUD_RATE", 9600)?;
        let rtu_response_timeout_ms = read_positive_u64("GW_RTU_RESPONSE_TIMEOUT_MS", 1000)?;

        Ok(Self {
            data_dir,
            tcp_enabled,
            rtu_enabled,
            poll_tick_ms,
            stop_grace_ms,
            device_timer_capacity,
            queue_capacity,
            stream_queue_capacity,
            queue_lock_timeout_ms,
            tcp_connect_timeout_ms,
            tcp_response_timeout_ms,
            rtu_bus1_path,
            rtu_bus2_path,
            rtu_baud_rate,
            rtu_response_timeout_ms,
        })
    }

    pub fn poll_tick(&self) -> Duration {
        Duration::from_millis(self.poll_tick_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn queue_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_lock_timeout_ms)
    }
}

/// 未设置时取默认值；显式设置为空白视为缺失
fn read_path_with_default(key: &str, default: &str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::Missing(key.to_string())),
        Ok(value) => Ok(value),
        Err(_) => Ok(default.to_string()),
    }
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

/// 读取 u64，且不允许为 0（周期、超时类参数）。
fn read_positive_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    let parsed = read_u64_with_default(key, default)?;
    if parsed == 0 {
        return Err(ConfigError::Invalid(key.to_string(), "0".to_string()));
    }
    Ok(parsed)
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_usize_with_default(key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<usize>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_positive_usize(key: &str, default: usize) -> Result<usize, ConfigError> {
    let parsed = read_usize_with_default(key, default)?;
    if parsed == 0 {
        return Err(ConfigError::Invalid(key.to_string(), "0".to_string()));
    }
    Ok(parsed)
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
