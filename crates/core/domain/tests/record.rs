use domain::{DataRecord, DataType, DeviceConfig, DeviceRecord, RegisterConfig, RegisterRecord};

#[test]
fn data_record_json_fields() {
    let record = DataRecord {
        time: 1_700_000_000_000,
        name: "DATA_POINT_1".to_string(),
        address: 16,
        datatype: DataType::Float32,
        value: 100.0,
        device_id: "D1a2b3c4d".to_string(),
        register_id: "R5e6f7a8b".to_string(),
    };

    let value = serde_json::to_value(&record).expect("serialize");
    let mut keys: Vec<&str> = value
        .as_object()
        .expect("object")
        .keys()
        .map(String::as_str)
        .collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec![
            "address",
            "datatype",
            "device_id",
            "name",
            "register_id",
            "time",
            "value"
        ]
    );
    assert_eq!(value["datatype"], "float32");
}

#[test]
fn device_record_round_trips_with_registers() {
    let config: DeviceConfig = serde_json::from_str(
        r#"{"device_name": "RTUDE", "protocol": "RTU", "serial_port": 1, "refresh_rate_ms": 20000}"#,
    )
    .expect("config");
    let mut device = DeviceRecord::new("D00000001", config);
    device.registers.push(RegisterRecord::new(
        "R00000001",
        RegisterConfig {
            register_name: "flow".to_string(),
            function_code: Default::default(),
            address: 3,
            data_type: DataType::Int16,
            description: "Flow Rate".to_string(),
        },
    ));

    let json = serde_json::to_string(&device).expect("serialize");
    let back: DeviceRecord = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, device);
    assert_eq!(back.summary().register_count, 1);
}
