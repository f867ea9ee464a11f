//! 网关领域模型：设备描述、寄存器描述、数据记录。
//!
//! 所有协议标签、串口总线、功能码与数据类型均为封闭枚举，
//! 在存储边界一次性解析，后续代码直接信任结构化字段。

pub mod data;
pub mod device;
pub mod register;

pub use data::{DataRecord, now_epoch_ms};
pub use device::{
    DeviceConfig, DeviceConnection, DeviceRecord, DeviceSummary, Protocol, RtuAddress,
    SerialBusId, TcpAddress,
};
pub use register::{DataType, FunctionCode, RegisterConfig, RegisterRecord, RegisterSummary};

/// 设备 ID 前缀。
pub const DEVICE_ID_PREFIX: char = 'D';

/// 寄存器 ID 前缀。
pub const REGISTER_ID_PREFIX: char = 'R';
