use async_trait::async_trait;
use domain::{
    DataType, DeviceConfig, DeviceConnection, DeviceRecord, FunctionCode, RegisterConfig,
    RegisterRecord, RtuAddress, SerialBusId,
};
use gw_protocol::{
    ModbusRtuEngine, ProtocolError, RawValue, RegisterReader, RtuBus, SerialBus, SerialTransport,
    UnavailableBus,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

/// 记录每次调用的假总线
#[derive(Default)]
struct FakeBus {
    calls: Mutex<Vec<(u8, FunctionCode, u16)>>,
    reply: Option<RawValue>,
}

impl FakeBus {
    fn replying(raw: RawValue) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reply: Some(raw),
        }
    }

    fn calls(&self) -> Vec<(u8, FunctionCode, u16)> {
        self.calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl SerialBus for FakeBus {
    async fn read(
        &self,
        slave_id: u8,
        function: FunctionCode,
        address: u16,
    ) -> Result<RawValue, ProtocolError> {
        self.calls
            .lock()
            .expect("lock")
            .push((slave_id, function, address));
        self.reply
            .ok_or_else(|| ProtocolError::Bus("no response".to_string()))
    }
}

fn rtu_device(bus: SerialBusId, slave_id: u8) -> DeviceRecord {
    DeviceRecord::new(
        "Drtu00001",
        DeviceConfig {
            device_name: "RTUDE".to_string(),
            connection: DeviceConnection::Rtu(RtuAddress {
                serial_port: bus,
                slave_id,
                baud_rate: Some(9600),
                parity: None,
                data_bits: None,
                stop_bits: None,
                timeout: None,
                retry_count: None,
            }),
            refresh_rate_ms: 20_000,
        },
    )
}

fn register(function_code: FunctionCode, address: u16, data_type: DataType) -> RegisterRecord {
    RegisterRecord::new(
        "R00000001",
        RegisterConfig {
            register_name: "DATA_POINT_1".to_string(),
            function_code,
            address,
            data_type,
            description: String::new(),
        },
    )
}

#[tokio::test]
async fn dispatches_to_selected_bus() {
    let bus1 = Arc::new(FakeBus::replying(RawValue::Word(1)));
    let bus2 = Arc::new(FakeBus::replying(RawValue::Word(0xFF9C)));
    let engine = ModbusRtuEngine::new(bus1.clone(), bus2.clone());

    let value = engine
        .read_value(
            &rtu_device(SerialBusId::Bus2, 5),
            &register(FunctionCode::ReadHoldingRegisters, 3, DataType::Int16),
        )
        .await
        .expect("read");

    assert_eq!(value, -100.0);
    assert!(bus1.calls().is_empty());
    assert_eq!(bus2.calls(), vec![(5, FunctionCode::ReadHoldingRegisters, 3)]);
}

#[tokio::test]
async fn coil_reads_normalize_to_one() {
    let bus = Arc::new(FakeBus::replying(RawValue::Bit(true)));
    let engine = ModbusRtuEngine::new(bus.clone(), Arc::new(FakeBus::default()));

    let value = engine
        .read_value(
            &rtu_device(SerialBusId::Bus1, 1),
            &register(FunctionCode::ReadCoils, 0, DataType::Bool),
        )
        .await
        .expect("read");
    assert_eq!(value, 1.0);
}

#[tokio::test]
async fn bus_failures_surface_as_bus_errors() {
    let engine = ModbusRtuEngine::new(
        Arc::new(UnavailableBus::new("/dev/ttyS1: no such file")),
        Arc::new(FakeBus::default()),
    );

    let unavailable = engine
        .poll_register(SerialBusId::Bus1, 1, FunctionCode::ReadHoldingRegisters, 1)
        .await
        .unwrap_err();
    assert!(matches!(unavailable, ProtocolError::Bus(_)));

    let silent = engine
        .poll_register(SerialBusId::Bus2, 1, FunctionCode::ReadHoldingRegisters, 1)
        .await
        .unwrap_err();
    assert!(matches!(silent, ProtocolError::Bus(_)));
}

#[tokio::test]
async fn tcp_device_is_rejected() {
    let engine = ModbusRtuEngine::new(
        Arc::new(FakeBus::default()),
        Arc::new(FakeBus::default()),
    );
    let device = DeviceRecord::new(
        "Dtcp00001",
        DeviceConfig {
            device_name: "tcp".to_string(),
            connection: DeviceConnection::Tcp(domain::TcpAddress {
                ip: "10.0.0.2".to_string(),
                port: 502,
                slave_id: 1,
            }),
            refresh_rate_ms: 1000,
        },
    );
    let err = engine
        .read_value(&device, &register(FunctionCode::ReadHoldingRegisters, 1, DataType::Int16))
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Addressing(_)));
}

fn crc16(frame: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;
    for byte in frame {
        crc ^= u16::from(*byte);
        for _ in 0..8 {
            crc = if crc & 0x0001 != 0 { (crc >> 1) ^ 0xA001 } else { crc >> 1 };
        }
    }
    crc
}

/// 单寄存器读应答帧：从站 | 03 | 02 | 数据(2) | CRC(低字节在前)
fn holding_reply(slave_id: u8, value: u16) -> Vec<u8> {
    let [hi, lo] = value.to_be_bytes();
    let mut frame = vec![slave_id, 0x03, 0x02, hi, lo];
    let [crc_lo, crc_hi] = crc16(&frame).to_le_bytes();
    frame.extend_from_slice(&[crc_lo, crc_hi]);
    frame
}

/// 每次连接都新建一条内存管道，从站一端经通道交给测试
fn piped_bus(timeout: Duration) -> (Arc<RtuBus>, mpsc::UnboundedReceiver<DuplexStream>) {
    let (ports, opened) = mpsc::unbounded_channel();
    let bus = RtuBus::with_connector("pipe", timeout, move || {
        let (master, slave) = tokio::io::duplex(256);
        ports
            .send(slave)
            .map_err(|_| ProtocolError::Bus("test harness gone".to_string()))?;
        Ok(Box::new(master) as Box<dyn SerialTransport>)
    })
    .expect("bus");
    (Arc::new(bus), opened)
}

#[tokio::test(start_paused = true)]
async fn timed_out_exchange_discards_late_reply() {
    let (bus, mut opened) = piped_bus(Duration::from_millis(200));
    let mut first = opened.recv().await.expect("first port");

    let err = bus
        .read(1, FunctionCode::ReadHoldingRegisters, 0x0010)
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Bus(_)));

    // 请求已发出，但上下文已随超时丢弃，迟到的应答无处可去
    let mut request = [0u8; 8];
    first.read_exact(&mut request).await.expect("request");
    assert_eq!(request[0], 1);
    assert!(first.write_all(&holding_reply(1, 0x1111)).await.is_err());

    let reader = {
        let bus = bus.clone();
        tokio::spawn(async move { bus.read(2, FunctionCode::ReadHoldingRegisters, 0x0020).await })
    };
    let mut second = opened.recv().await.expect("reopened port");
    second.read_exact(&mut request).await.expect("request");
    assert_eq!(request[..4], [0x02, 0x03, 0x00, 0x20]);
    second.write_all(&holding_reply(2, 0x2222)).await.expect("reply");

    let raw = reader.await.expect("join").expect("read");
    assert_eq!(raw, RawValue::Word(0x2222));
}

#[tokio::test(start_paused = true)]
async fn answered_exchange_keeps_the_port_open() {
    let (bus, mut opened) = piped_bus(Duration::from_millis(200));
    let mut port = opened.recv().await.expect("port");

    for value in [0x0001u16, 0x0002] {
        let reader = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.read(3, FunctionCode::ReadHoldingRegisters, 0x0001).await })
        };
        let mut request = [0u8; 8];
        port.read_exact(&mut request).await.expect("request");
        port.write_all(&holding_reply(3, value)).await.expect("reply");
        assert_eq!(reader.await.expect("join").expect("read"), RawValue::Word(value));
    }
    assert!(opened.try_recv().is_err());
}
