//! 协议错误类型定义

/// 协议通信错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 建立连接失败（含连接超时）
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// 等待响应超时
    #[error("timeout: {0}")]
    Timeout(String),

    /// 从站返回异常响应
    #[error("modbus exception: function {function:#04x}, code {code}")]
    Exception { function: u8, code: u8 },

    /// 响应帧格式错误
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// 串口总线错误（传输、异常码、超时统一归入）
    #[error("bus error: {0}")]
    Bus(String),

    /// 设备寻址信息不适用于当前引擎
    #[error("addressing error: {0}")]
    Addressing(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
