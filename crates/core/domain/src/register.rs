//! 寄存器描述与读操作类型。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Modbus 读功能码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FunctionCode {
    /// 读线圈状态 (0x01)
    ReadCoils = 1,
    /// 读离散输入 (0x02)
    ReadDiscreteInputs = 2,
    /// 读保持寄存器 (0x03)
    #[default]
    ReadHoldingRegisters = 3,
    /// 读输入寄存器 (0x04)
    ReadInputRegisters = 4,
}

impl FunctionCode {
    /// 线路上的功能码字节
    pub fn code(self) -> u8 {
        self as u8
    }

    /// 是否为位类读操作（线圈 / 离散输入）
    pub fn is_bit_access(self) -> bool {
        matches!(self, Self::ReadCoils | Self::ReadDiscreteInputs)
    }
}

impl TryFrom<u8> for FunctionCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::ReadCoils),
            2 => Ok(Self::ReadDiscreteInputs),
            3 => Ok(Self::ReadHoldingRegisters),
            4 => Ok(Self::ReadInputRegisters),
            other => Err(format!("unsupported function code: {}", other)),
        }
    }
}

impl From<FunctionCode> for u8 {
    fn from(value: FunctionCode) -> Self {
        value.code()
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// 寄存器声明的数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Int16,
    /// 仅读取单个寄存器（16 位），不拼接相邻寄存器
    Int32,
    /// 定点约定：原始值 / 100
    Float32,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Float32 => "float32",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 寄存器创建输入（由配置前端提供）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterConfig {
    pub register_name: String,
    #[serde(default)]
    pub function_code: FunctionCode,
    pub address: u16,
    pub data_type: DataType,
    #[serde(default)]
    pub description: String,
}

/// 寄存器记录：创建输入 + 生成的 register_id。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRecord {
    pub register_id: String,
    #[serde(flatten)]
    pub config: RegisterConfig,
}

impl RegisterRecord {
    pub fn new(register_id: impl Into<String>, config: RegisterConfig) -> Self {
        Self {
            register_id: register_id.into(),
            config,
        }
    }

    pub fn summary(&self) -> RegisterSummary {
        RegisterSummary {
            register_id: self.register_id.clone(),
            register_name: self.config.register_name.clone(),
            address: self.config.address,
            data_type: self.config.data_type,
            description: self.config.description.clone(),
        }
    }
}

/// 寄存器摘要（列表展示用）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterSummary {
    pub register_id: String,
    pub register_name: String,
    pub address: u16,
    pub data_type: DataType,
    pub description: String,
}
