use crate::register::DataType;
use serde::{Deserialize, Serialize};

/// 规范化后的数据记录（流水线中流动的单元）。
///
/// 字段名即下游消费者看到的 JSON 字段名。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    /// 采集时间戳（毫秒）
    pub time: i64,
    /// 寄存器名称
    pub name: String,
    pub address: u16,
    pub datatype: DataType,
    pub value: f64,
    pub device_id: String,
    pub register_id: String,
}

/// 获取当前时间戳（毫秒）
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
