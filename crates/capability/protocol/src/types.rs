//! 协议相关类型定义

use crate::error::ProtocolError;
use async_trait::async_trait;
use domain::{DataType, DeviceRecord, Protocol, RegisterRecord};
use std::time::Duration;

/// 单寄存器读取的原始值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawValue {
    /// 线圈 / 离散输入
    Bit(bool),
    /// 保持寄存器 / 输入寄存器（大端 u16）
    Word(u16),
}

/// 原始值按数据类型换算为工程值
///
/// - int16：按有符号解释
/// - int32：原值透传（单寄存器读取，不拼接高低字）
/// - float32：原值 / 100
/// - bool：非零为 1
/// - 位值：0 / 1
pub fn normalize(raw: RawValue, data_type: DataType) -> f64 {
    match raw {
        RawValue::Bit(bit) => bool_value(bit),
        RawValue::Word(word) => match data_type {
            DataType::Int16 => f64::from(word as i16),
            DataType::Int32 => f64::from(word),
            DataType::Float32 => f64::from(word) / 100.0,
            DataType::Bool => bool_value(word != 0),
        },
    }
}

fn bool_value(bit: bool) -> f64 {
    if bit { 1.0 } else { 0.0 }
}

/// 寄存器读取接口（调度器按协议持有一个实现）
#[async_trait]
pub trait RegisterReader: Send + Sync {
    /// 本引擎负责的协议
    fn protocol(&self) -> Protocol;

    /// 同一设备相邻寄存器之间的间隔
    fn inter_register_gap(&self) -> Duration;

    /// 读取一个寄存器并换算为工程值
    async fn read_value(
        &self,
        device: &DeviceRecord,
        register: &RegisterRecord,
    ) -> Result<f64, ProtocolError>;
}
