//! 设备描述：协议标签、协议相关寻址、刷新周期与寄存器列表。

use crate::register::RegisterRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 采集协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "RTU")]
    Rtu,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Rtu => "RTU",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 物理串口总线编号（1 或 2）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SerialBusId {
    Bus1,
    Bus2,
}

impl SerialBusId {
    pub const ALL: [SerialBusId; 2] = [SerialBusId::Bus1, SerialBusId::Bus2];

    /// 分发表下标
    pub fn index(self) -> usize {
        match self {
            Self::Bus1 => 0,
            Self::Bus2 => 1,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::Bus1 => 1,
            Self::Bus2 => 2,
        }
    }
}

impl TryFrom<u8> for SerialBusId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Bus1),
            2 => Ok(Self::Bus2),
            other => Err(format!("unsupported serial port: {}", other)),
        }
    }
}

impl From<SerialBusId> for u8 {
    fn from(value: SerialBusId) -> Self {
        value.number()
    }
}

impl fmt::Display for SerialBusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus{}", self.number())
    }
}

/// Modbus TCP 设备寻址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpAddress {
    /// 设备主机地址
    pub ip: String,
    /// 端口（默认 502）
    #[serde(default = "default_modbus_port")]
    pub port: u16,
    /// 单元 ID
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,
}

/// Modbus RTU 设备寻址
///
/// 波特率等串口参数仅作记录：总线在启动时按固定参数打开，
/// 所有挂在同一总线上的设备共享该参数。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtuAddress {
    #[serde(default = "default_serial_port")]
    pub serial_port: SerialBusId,
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baud_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_bits: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_bits: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

/// 协议标签 + 对应寻址，磁盘上以 `protocol` 字段区分。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol")]
pub enum DeviceConnection {
    #[serde(rename = "TCP")]
    Tcp(TcpAddress),
    #[serde(rename = "RTU")]
    Rtu(RtuAddress),
}

impl DeviceConnection {
    pub fn protocol(&self) -> Protocol {
        match self {
            Self::Tcp(_) => Protocol::Tcp,
            Self::Rtu(_) => Protocol::Rtu,
        }
    }
}

fn default_modbus_port() -> u16 {
    502
}

fn default_serial_port() -> SerialBusId {
    SerialBusId::Bus1
}

fn default_slave_id() -> u8 {
    1
}

fn default_refresh_rate_ms() -> u64 {
    5000
}

/// 设备创建输入（由配置前端提供）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub device_name: String,
    #[serde(flatten)]
    pub connection: DeviceConnection,
    /// 刷新周期（毫秒）
    #[serde(default = "default_refresh_rate_ms")]
    pub refresh_rate_ms: u64,
}

impl DeviceConfig {
    pub fn protocol(&self) -> Protocol {
        self.connection.protocol()
    }
}

/// 设备记录：创建输入 + 生成的 device_id + 按插入顺序的寄存器。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: String,
    #[serde(flatten)]
    pub config: DeviceConfig,
    #[serde(default)]
    pub registers: Vec<RegisterRecord>,
}

impl DeviceRecord {
    pub fn new(device_id: impl Into<String>, config: DeviceConfig) -> Self {
        Self {
            device_id: device_id.into(),
            config,
            registers: Vec::new(),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.config.protocol()
    }

    pub fn summary(&self) -> DeviceSummary {
        DeviceSummary {
            device_id: self.device_id.clone(),
            device_name: self.config.device_name.clone(),
            protocol: self.protocol(),
            register_count: self.registers.len(),
        }
    }
}

/// 设备摘要（列表展示用）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub device_id: String,
    pub device_name: String,
    pub protocol: Protocol,
    pub register_count: usize,
}
