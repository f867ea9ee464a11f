//! Modbus TCP 主站（手工组帧）
//!
//! 每次读取单个寄存器都新建一条 TCP 连接，交换一帧后立即关闭。
//!
//! ## 帧格式
//!
//! ```text
//! 请求（12 字节）：
//! | 事务 ID(2) | 协议 ID 0x0000(2) | 长度 0x0006(2) | 单元 ID | 功能码 | 地址(2) | 数量 0x0001(2) |
//!
//! 响应（≥ 9 字节）：
//! | 事务 ID(2) | 协议 ID(2) | 长度(2) | 单元 ID | 功能码 | 字节数 | 数据... |
//! ```
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let engine = ModbusTcpEngine::default();
//! let raw = engine
//!     .poll_register("192.168.1.100", 502, 1, FunctionCode::ReadHoldingRegisters, 0x0010)
//!     .await?;
//! ```

use crate::error::ProtocolError;
use crate::types::{RawValue, RegisterReader, normalize};
use async_trait::async_trait;
use domain::{DeviceConnection, DeviceRecord, FunctionCode, Protocol, RegisterRecord};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::debug;

/// MBAP 头 + 功能码 + 字节数
const MIN_RESPONSE_LEN: usize = 9;
/// MBAP 头中长度字段之前的字节数
const MBAP_PREFIX_LEN: usize = 6;
const MAX_FRAME_LEN: usize = 260;

/// 同一设备相邻寄存器读取间隔
pub const TCP_INTER_REGISTER_GAP: Duration = Duration::from_millis(50);

/// 组装读请求帧（数量固定为 1）
pub fn build_request(transaction_id: u16, unit_id: u8, function: FunctionCode, address: u16) -> [u8; 12] {
    let tid = transaction_id.to_be_bytes();
    let addr = address.to_be_bytes();
    [
        tid[0],
        tid[1],
        0x00,
        0x00,
        0x00,
        0x06,
        unit_id,
        function.code(),
        addr[0],
        addr[1],
        0x00,
        0x01,
    ]
}

/// 解析响应帧
///
/// 功能码最高位置位视为异常响应；字节数至少为 1（线圈 / 离散输入）或 2（寄存器）。
/// 线圈 / 离散输入取首个数据字节的最低位，寄存器取前两个数据字节（大端）。
pub fn parse_response(frame: &[u8], function: FunctionCode) -> Result<RawValue, ProtocolError> {
    if frame.len() < MIN_RESPONSE_LEN {
        return Err(ProtocolError::MalformedFrame(format!(
            "response too short: {} bytes",
            frame.len()
        )));
    }

    let requested = function.code();
    let echoed = frame[7];
    if echoed == requested | 0x80 {
        return Err(ProtocolError::Exception {
            function: requested,
            code: frame[8],
        });
    }
    if echoed != requested {
        return Err(ProtocolError::MalformedFrame(format!(
            "function code mismatch: expected {:#04x}, got {:#04x}",
            requested, echoed
        )));
    }

    let byte_count = usize::from(frame[8]);
    let required = if function.is_bit_access() { 1 } else { 2 };
    if byte_count < required {
        return Err(ProtocolError::MalformedFrame(format!(
            "byte count {} too small for function {:#04x}",
            byte_count, requested
        )));
    }

    let data = &frame[MIN_RESPONSE_LEN..];
    if function.is_bit_access() {
        let first = data
            .first()
            .ok_or_else(|| ProtocolError::MalformedFrame("missing bit data".to_string()))?;
        Ok(RawValue::Bit(first & 0x01 == 0x01))
    } else {
        match data {
            [hi, lo, ..] => Ok(RawValue::Word(u16::from_be_bytes([*hi, *lo]))),
            _ => Err(ProtocolError::MalformedFrame(
                "missing register data".to_string(),
            )),
        }
    }
}

/// 校验响应事务 ID 与请求一致
pub fn check_transaction(frame: &[u8], transaction_id: u16) -> Result<(), ProtocolError> {
    match frame {
        [hi, lo, ..] if u16::from_be_bytes([*hi, *lo]) == transaction_id => Ok(()),
        [hi, lo, ..] => Err(ProtocolError::MalformedFrame(format!(
            "transaction id mismatch: expected {}, got {}",
            transaction_id,
            u16::from_be_bytes([*hi, *lo])
        ))),
        _ => Err(ProtocolError::MalformedFrame(
            "missing transaction id".to_string(),
        )),
    }
}

/// Modbus TCP 引擎
pub struct ModbusTcpEngine {
    next_transaction: AtomicU16,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl ModbusTcpEngine {
    pub fn new(connect_timeout: Duration, response_timeout: Duration) -> Self {
        Self {
            next_transaction: AtomicU16::new(1),
            connect_timeout,
            response_timeout,
        }
    }

    /// 取下一个事务 ID（回绕不报错）
    fn next_transaction_id(&self) -> u16 {
        self.next_transaction.fetch_add(1, Ordering::Relaxed)
    }

    /// 读取单个寄存器
    pub async fn poll_register(
        &self,
        host: &str,
        port: u16,
        unit_id: u8,
        function: FunctionCode,
        address: u16,
    ) -> Result<RawValue, ProtocolError> {
        let mut stream = match timeout(self.connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                return Err(ProtocolError::ConnectFailed(format!("{}:{}: {}", host, port, err)));
            }
            Err(_) => {
                return Err(ProtocolError::ConnectFailed(format!(
                    "{}:{}: no connection within {:?}",
                    host, port, self.connect_timeout
                )));
            }
        };

        let transaction_id = self.next_transaction_id();
        let request = build_request(transaction_id, unit_id, function, address);
        stream.write_all(&request).await?;

        let frame = self.read_frame(&mut stream).await;
        // 无论成功与否都关闭连接
        let _ = stream.shutdown().await;
        let frame = frame?;

        debug!(
            target: "gw.protocol",
            host,
            port,
            unit_id,
            function = function.code(),
            address,
            transaction_id,
            bytes = frame.len(),
            "modbus_tcp_response"
        );

        check_transaction(&frame, transaction_id)?;
        parse_response(&frame, function)
    }

    /// 读满 9 字节；若 MBAP 长度字段声明了更多字节，则在同一截止时间内继续读。
    async fn read_frame(&self, stream: &mut TcpStream) -> Result<Vec<u8>, ProtocolError> {
        let deadline = Instant::now() + self.response_timeout;
        let mut frame = Vec::with_capacity(MAX_FRAME_LEN);
        let mut chunk = [0u8; MAX_FRAME_LEN];

        loop {
            let expected = expected_len(&frame);
            if frame.len() >= expected {
                return Ok(frame);
            }
            let read = match timeout_at(deadline, stream.read(&mut chunk)).await {
                Ok(read) => read?,
                Err(_) if frame.len() >= MIN_RESPONSE_LEN => return Ok(frame),
                Err(_) => {
                    return Err(ProtocolError::Timeout(format!(
                        "{} of {} bytes within {:?}",
                        frame.len(),
                        MIN_RESPONSE_LEN,
                        self.response_timeout
                    )));
                }
            };
            if read == 0 {
                if frame.len() >= MIN_RESPONSE_LEN {
                    return Ok(frame);
                }
                return Err(ProtocolError::MalformedFrame(format!(
                    "connection closed after {} bytes",
                    frame.len()
                )));
            }
            frame.extend_from_slice(&chunk[..read]);
        }
    }
}

/// 当前已知的完整帧长度：未读到长度字段前按最小响应计算
fn expected_len(frame: &[u8]) -> usize {
    if frame.len() < MBAP_PREFIX_LEN {
        return MIN_RESPONSE_LEN;
    }
    let announced = usize::from(u16::from_be_bytes([frame[4], frame[5]]));
    (MBAP_PREFIX_LEN + announced).clamp(MIN_RESPONSE_LEN, MAX_FRAME_LEN)
}

impl Default for ModbusTcpEngine {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(5))
    }
}

#[async_trait]
impl RegisterReader for ModbusTcpEngine {
    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    fn inter_register_gap(&self) -> Duration {
        TCP_INTER_REGISTER_GAP
    }

    async fn read_value(
        &self,
        device: &DeviceRecord,
        register: &RegisterRecord,
    ) -> Result<f64, ProtocolError> {
        let DeviceConnection::Tcp(address) = &device.config.connection else {
            return Err(ProtocolError::Addressing(format!(
                "device {} is not a TCP device",
                device.device_id
            )));
        };
        if address.ip.is_empty() {
            return Err(ProtocolError::Addressing(format!(
                "device {} has no ip",
                device.device_id
            )));
        }
        let raw = self
            .poll_register(
                &address.ip,
                address.port,
                address.slave_id,
                register.config.function_code,
                register.config.address,
            )
            .await?;
        Ok(normalize(raw, register.config.data_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_layout() {
        let frame = build_request(0x0007, 1, FunctionCode::ReadHoldingRegisters, 0x0010);
        assert_eq!(
            frame,
            [0x00, 0x07, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x10, 0x00, 0x01]
        );
    }

    #[test]
    fn parse_holding_register() {
        let frame = [0x00, 0x07, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x27, 0x10];
        let raw = parse_response(&frame, FunctionCode::ReadHoldingRegisters).unwrap();
        assert_eq!(raw, RawValue::Word(0x2710));
        assert_eq!(normalize(raw, domain::DataType::Float32), 100.0);
    }

    #[test]
    fn parse_coil_uses_lowest_bit() {
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x04, 0x01, 0x01, 0x01, 0x03];
        assert_eq!(
            parse_response(&frame, FunctionCode::ReadCoils).unwrap(),
            RawValue::Bit(true)
        );
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x04, 0x01, 0x02, 0x01, 0x02];
        assert_eq!(
            parse_response(&frame, FunctionCode::ReadDiscreteInputs).unwrap(),
            RawValue::Bit(false)
        );
    }

    #[test]
    fn parse_exception_response() {
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x83, 0x02];
        match parse_response(&frame, FunctionCode::ReadHoldingRegisters) {
            Err(ProtocolError::Exception { function, code }) => {
                assert_eq!(function, 0x03);
                assert_eq!(code, 0x02);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn parse_rejects_short_and_mismatched_frames() {
        let short = [0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x03];
        assert!(matches!(
            parse_response(&short, FunctionCode::ReadHoldingRegisters),
            Err(ProtocolError::MalformedFrame(_))
        ));

        let wrong_fc = [0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x04, 0x02, 0x00, 0x01];
        assert!(matches!(
            parse_response(&wrong_fc, FunctionCode::ReadHoldingRegisters),
            Err(ProtocolError::MalformedFrame(_))
        ));

        let no_data = [0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x03, 0x02, 0x27];
        assert!(matches!(
            parse_response(&no_data, FunctionCode::ReadHoldingRegisters),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn parse_rejects_undersized_byte_count() {
        let registers = [0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x01, 0x27, 0x10];
        assert!(matches!(
            parse_response(&registers, FunctionCode::ReadHoldingRegisters),
            Err(ProtocolError::MalformedFrame(_))
        ));

        let coils = [0x00, 0x01, 0x00, 0x00, 0x00, 0x04, 0x01, 0x01, 0x00, 0x01];
        assert!(matches!(
            parse_response(&coils, FunctionCode::ReadCoils),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn transaction_id_must_match() {
        let frame = [0x00, 0x07, 0x00, 0x00];
        assert!(check_transaction(&frame, 7).is_ok());
        assert!(matches!(
            check_transaction(&frame, 8),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn transaction_counter_wraps() {
        let engine = ModbusTcpEngine::default();
        assert_eq!(engine.next_transaction_id(), 1);
        engine.next_transaction.store(u16::MAX, Ordering::Relaxed);
        assert_eq!(engine.next_transaction_id(), u16::MAX);
        assert_eq!(engine.next_transaction_id(), 0);
    }

    #[test]
    fn expected_len_follows_mbap_length() {
        assert_eq!(expected_len(&[0x00, 0x01]), MIN_RESPONSE_LEN);
        assert_eq!(expected_len(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x07]), 13);
        assert_eq!(expected_len(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x01]), MIN_RESPONSE_LEN);
    }
}
