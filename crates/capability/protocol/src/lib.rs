//! # 协议通信能力模块
//!
//! 提供 Modbus 主站读取能力，支持：
//! - **Modbus TCP**：手工组帧，每个寄存器一次短连接
//! - **Modbus RTU**：两条串口总线，经 tokio-modbus 读取
//!
//! ## 架构设计
//!
//! ```text
//! PollScheduler (按协议)
//!       │
//!       ▼
//! RegisterReader
//!       │
//!       ├── ModbusTcpEngine ── TcpStream（每次读取新建）
//!       └── ModbusRtuEngine ── [SerialBus; 2]
//!                                 ├── RtuBus（tokio-serial + tokio-modbus）
//!                                 └── UnavailableBus（串口打开失败）
//!       │
//!       ▼
//! RawValue ── normalize(data_type) ──▶ f64
//! ```
//!
//! ## 数据换算
//!
//! | data_type | 换算 |
//! |-----------|------|
//! | int16     | 有符号解释 |
//! | int32     | 原值（单寄存器） |
//! | float32   | 原值 / 100 |
//! | bool      | 0 / 1 |

mod error;
mod modbus_rtu;
mod modbus_tcp;
mod types;

pub use error::ProtocolError;
pub use modbus_rtu::{
    ModbusRtuEngine, RTU_INTER_REGISTER_GAP, RtuBus, SerialBus, SerialSettings, SerialTransport,
    UnavailableBus,
};
pub use modbus_tcp::{
    ModbusTcpEngine, TCP_INTER_REGISTER_GAP, build_request, check_transaction, parse_response,
};
pub use types::*;
