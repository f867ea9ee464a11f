use gw_config::AppConfig;

#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("GW_DATA_DIR", "/tmp/gw-data");
        std::env::set_var("GW_POLL_TICK_MS", "1000");
        std::env::set_var("GW_RTU_ENABLED", "off");
        std::env::set_var("GW_RTU_BUS2_PATH", "/dev/ttyUSB1");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.data_dir.to_str(), Some("/tmp/gw-data"));
    assert_eq!(config.poll_tick_ms, 1000);
    assert!(!config.rtu_enabled);
    assert!(config.tcp_enabled);
    assert_eq!(config.rtu_bus2_path, "/dev/ttyUSB1");
    assert_eq!(config.queue_capacity, 100);
    assert_eq!(config.stream_queue_capacity, 50);
    assert_eq!(config.device_timer_capacity, 10);
    assert_eq!(config.rtu_baud_rate, 9600);
}
