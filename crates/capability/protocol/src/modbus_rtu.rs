//! Modbus RTU 主站（串口总线）
//!
//! 两条 RS485 总线各持有一个 tokio-modbus RTU 上下文，按 `SerialBusId` 分派。
//! 打开失败的串口由 `UnavailableBus` 占位，读取一律返回总线错误。
//! 事务超时后丢弃该总线的上下文，下次读取时重新打开串口。

use crate::error::ProtocolError;
use crate::types::{RawValue, RegisterReader, normalize};
use async_trait::async_trait;
use domain::{DeviceConnection, DeviceRecord, FunctionCode, Protocol, RegisterRecord, SerialBusId};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_modbus::prelude::{Reader, Slave, rtu};
use tokio_modbus::slave::SlaveContext;
use tokio_serial::SerialStream;
use tracing::{debug, warn};

/// 同一设备相邻寄存器读取间隔
pub const RTU_INTER_REGISTER_GAP: Duration = Duration::from_millis(100);

/// 串口总线接口
#[async_trait]
pub trait SerialBus: Send + Sync {
    /// 读取指定从站的单个寄存器 / 线圈
    async fn read(
        &self,
        slave_id: u8,
        function: FunctionCode,
        address: u16,
    ) -> Result<RawValue, ProtocolError>;
}

/// 串口参数（默认 9600 8N1）
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub parity: tokio_serial::Parity,
    pub data_bits: tokio_serial::DataBits,
    pub stop_bits: tokio_serial::StopBits,
    /// 单次事务超时
    pub response_timeout: Duration,
}

impl SerialSettings {
    /// 8N1，指定波特率与事务超时
    pub fn new(baud_rate: u32, response_timeout: Duration) -> Self {
        Self {
            baud_rate,
            response_timeout,
            ..Self::default()
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            parity: tokio_serial::Parity::None,
            data_bits: tokio_serial::DataBits::Eight,
            stop_bits: tokio_serial::StopBits::One,
            response_timeout: Duration::from_secs(1),
        }
    }
}

/// 可挂接 RTU 上下文的字节流（串口或测试用管道）
pub trait SerialTransport: AsyncRead + AsyncWrite + fmt::Debug + Unpin + Send + 'static {}

impl<T> SerialTransport for T where T: AsyncRead + AsyncWrite + fmt::Debug + Unpin + Send + 'static {}

type Connector = Box<dyn Fn() -> Result<Box<dyn SerialTransport>, ProtocolError> + Send + Sync>;

/// 基于 tokio-serial + tokio-modbus 的总线实现
pub struct RtuBus {
    name: String,
    connect: Connector,
    /// 超时后置空，下次读取时重新打开
    ctx: Mutex<Option<tokio_modbus::client::Context>>,
    response_timeout: Duration,
}

impl RtuBus {
    /// 打开串口并挂接 RTU 上下文（默认从站 1）
    pub fn open(path: &str, settings: &SerialSettings) -> Result<Self, ProtocolError> {
        let builder = tokio_serial::new(path, settings.baud_rate)
            .parity(settings.parity)
            .data_bits(settings.data_bits)
            .stop_bits(settings.stop_bits)
            .timeout(settings.response_timeout);
        let port_name = path.to_string();
        Self::with_connector(path, settings.response_timeout, move || {
            let port = SerialStream::open(&builder)
                .map_err(|err| ProtocolError::Bus(format!("open {}: {}", port_name, err)))?;
            Ok(Box::new(port) as Box<dyn SerialTransport>)
        })
    }

    /// 以自定义连接函数构建总线；立即连接一次
    pub fn with_connector<F>(
        name: impl Into<String>,
        response_timeout: Duration,
        connect: F,
    ) -> Result<Self, ProtocolError>
    where
        F: Fn() -> Result<Box<dyn SerialTransport>, ProtocolError> + Send + Sync + 'static,
    {
        let ctx = rtu::attach_slave(connect()?, Slave(1));
        Ok(Self {
            name: name.into(),
            connect: Box::new(connect),
            ctx: Mutex::new(Some(ctx)),
            response_timeout,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn reconnect(&self) -> Result<tokio_modbus::client::Context, ProtocolError> {
        let ctx = rtu::attach_slave((self.connect)()?, Slave(1));
        debug!(target: "gw.protocol", bus = %self.name, "serial_bus_reopened");
        Ok(ctx)
    }
}

#[async_trait]
impl SerialBus for RtuBus {
    async fn read(
        &self,
        slave_id: u8,
        function: FunctionCode,
        address: u16,
    ) -> Result<RawValue, ProtocolError> {
        // 总线半双工：同一时刻只有一个事务
        let mut slot = self.ctx.lock().await;
        let mut ctx = match slot.take() {
            Some(ctx) => ctx,
            None => self.reconnect()?,
        };
        ctx.set_slave(Slave(slave_id));

        let exchange = async {
            match function {
                FunctionCode::ReadCoils => bit_result(ctx.read_coils(address, 1).await),
                FunctionCode::ReadDiscreteInputs => {
                    bit_result(ctx.read_discrete_inputs(address, 1).await)
                }
                FunctionCode::ReadHoldingRegisters => {
                    word_result(ctx.read_holding_registers(address, 1).await)
                }
                FunctionCode::ReadInputRegisters => {
                    word_result(ctx.read_input_registers(address, 1).await)
                }
            }
        };
        let outcome = tokio::time::timeout(self.response_timeout, exchange).await;

        match outcome {
            Ok(result) => {
                *slot = Some(ctx);
                result
            }
            Err(_) => {
                // 迟到的应答可能残留在上下文缓冲区中，丢弃整个上下文（连同串口）
                drop(ctx);
                warn!(
                    target: "gw.protocol",
                    bus = %self.name,
                    slave_id,
                    "serial_exchange_timed_out_context_dropped"
                );
                Err(ProtocolError::Bus(format!(
                    "{}: slave {} no response within {:?}",
                    self.name, slave_id, self.response_timeout
                )))
            }
        }
    }
}

fn bit_result(
    result: tokio_modbus::Result<Vec<bool>>,
) -> Result<RawValue, ProtocolError> {
    let bits = flatten(result)?;
    bits.first()
        .map(|bit| RawValue::Bit(*bit))
        .ok_or_else(|| ProtocolError::Bus("empty bit response".to_string()))
}

fn word_result(
    result: tokio_modbus::Result<Vec<u16>>,
) -> Result<RawValue, ProtocolError> {
    let words = flatten(result)?;
    words
        .first()
        .map(|word| RawValue::Word(*word))
        .ok_or_else(|| ProtocolError::Bus("empty register response".to_string()))
}

fn flatten<T>(
    result: tokio_modbus::Result<T>,
) -> Result<T, ProtocolError> {
    result
        .map_err(|err| ProtocolError::Bus(err.to_string()))?
        .map_err(|code| ProtocolError::Bus(format!("exception: {:?}", code)))
}

/// 未能打开的串口占位
pub struct UnavailableBus {
    reason: String,
}

impl UnavailableBus {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SerialBus for UnavailableBus {
    async fn read(
        &self,
        _slave_id: u8,
        _function: FunctionCode,
        _address: u16,
    ) -> Result<RawValue, ProtocolError> {
        Err(ProtocolError::Bus(format!("bus unavailable: {}", self.reason)))
    }
}

/// Modbus RTU 引擎：按总线号分派
pub struct ModbusRtuEngine {
    buses: [Arc<dyn SerialBus>; 2],
}

impl ModbusRtuEngine {
    pub fn new(bus1: Arc<dyn SerialBus>, bus2: Arc<dyn SerialBus>) -> Self {
        Self {
            buses: [bus1, bus2],
        }
    }

    /// 打开两条总线；打开失败的总线记录告警并以 `UnavailableBus` 占位
    pub fn open(paths: [&str; 2], settings: &SerialSettings) -> Self {
        let buses = SerialBusId::ALL.map(|bus| -> Arc<dyn SerialBus> {
            let path = paths[bus.index()];
            match RtuBus::open(path, settings) {
                Ok(rtu) => {
                    debug!(target: "gw.protocol", bus = %bus, path, "serial_bus_opened");
                    Arc::new(rtu)
                }
                Err(err) => {
                    warn!(target: "gw.protocol", bus = %bus, path, error = %err, "serial_bus_unavailable");
                    Arc::new(UnavailableBus::new(err.to_string()))
                }
            }
        });
        Self { buses }
    }

    pub fn bus(&self, bus: SerialBusId) -> &Arc<dyn SerialBus> {
        &self.buses[bus.index()]
    }

    /// 读取单个寄存器
    pub async fn poll_register(
        &self,
        bus: SerialBusId,
        slave_id: u8,
        function: FunctionCode,
        address: u16,
    ) -> Result<RawValue, ProtocolError> {
        let raw = self.bus(bus).read(slave_id, function, address).await?;
        debug!(
            target: "gw.protocol",
            bus = %bus,
            slave_id,
            function = function.code(),
            address,
            raw = ?raw,
            "modbus_rtu_response"
        );
        Ok(raw)
    }
}

#[async_trait]
impl RegisterReader for ModbusRtuEngine {
    fn protocol(&self) -> Protocol {
        Protocol::Rtu
    }

    fn inter_register_gap(&self) -> Duration {
        RTU_INTER_REGISTER_GAP
    }

    async fn read_value(
        &self,
        device: &DeviceRecord,
        register: &RegisterRecord,
    ) -> Result<f64, ProtocolError> {
        let DeviceConnection::Rtu(address) = &device.config.connection else {
            return Err(ProtocolError::Addressing(format!(
                "device {} is not an RTU device",
                device.device_id
            )));
        };
        let raw = self
            .poll_register(
                address.serial_port,
                address.slave_id,
                register.config.function_code,
                register.config.address,
            )
            .await?;
        Ok(normalize(raw, register.config.data_type))
    }
}
