//! JSON 命令分发
//!
//! 请求 / 响应形状与配置前端一致：
//! - `{"op": "read", "type": "devices" | "devices_summary" | "device" | "registers" | "registers_summary", "device_id"?}`
//! - `{"op": "create", "type": "device", "config": {...}}`
//! - `{"op": "create", "type": "register", "device_id", "config": {...}}`
//! - `{"op": "delete", "type": "device" | "register", "device_id", "register_id"?}`
//! - `{"op": "stream", "type": "start" | "stop", "device_id"?}`
//!
//! 成功返回 `{"status": "ok", ...}`，失败返回 `{"status": "error", "message": ...}`。

use domain::{DataRecord, DeviceConfig, RegisterConfig};
use gw_pipeline::LiveTap;
use gw_storage::ConfigStore;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct Command {
    #[serde(default)]
    op: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    device_id: String,
    #[serde(default)]
    register_id: String,
    #[serde(default)]
    config: Option<Value>,
}

/// 命令处理器：配置库 + 实时流选择器。
#[derive(Clone)]
pub struct CommandHandler {
    store: Arc<ConfigStore>,
    tap: Arc<LiveTap>,
}

impl CommandHandler {
    pub fn new(store: Arc<ConfigStore>, tap: Arc<LiveTap>) -> Self {
        Self { store, tap }
    }

    /// 处理一行文本命令
    pub async fn handle_text(&self, text: &str) -> Value {
        match serde_json::from_str::<Value>(text) {
            Ok(command) => self.handle(command).await,
            Err(err) => error(format!("Invalid JSON: {}", err)),
        }
    }

    pub async fn handle(&self, command: Value) -> Value {
        let command: Command = match serde_json::from_value(command) {
            Ok(command) => command,
            Err(err) => return error(format!("Invalid command: {}", err)),
        };
        info!(target: "gw.command", op = %command.op, kind = %command.kind, "command_received");

        match command.op.as_str() {
            "read" => self.read(&command).await,
            "create" => self.create(command).await,
            "delete" => self.delete(&command).await,
            "stream" => self.stream(&command).await,
            other => error(format!("Unsupported operation: {}", other)),
        }
    }

    /// 客户端断开：停止实时流
    pub async fn on_disconnect(&self) {
        self.tap.clear().await;
        info!(target: "gw.command", "stream_cleared_on_disconnect");
    }

    async fn read(&self, command: &Command) -> Value {
        let device_id = command.device_id.as_str();
        match command.kind.as_str() {
            "devices" => match self.store.list_devices().await {
                Ok(devices) => json!({ "status": "ok", "devices": devices }),
                Err(err) => failure("Failed to list devices", err),
            },
            "devices_summary" => match self.store.devices_summary().await {
                Ok(summary) => json!({ "status": "ok", "devices_summary": summary }),
                Err(err) => failure("Failed to summarize devices", err),
            },
            "device" => match self.store.read_device(device_id).await {
                Ok(device) => json!({ "status": "ok", "data": device }),
                Err(err) if err.is_not_found() => error("Device not found"),
                Err(err) => failure("Failed to read device", err),
            },
            "registers" => match self.store.list_registers(device_id).await {
                Ok(registers) => json!({ "status": "ok", "registers": registers }),
                Err(err) if err.is_not_found() => error("No registers found"),
                Err(err) => failure("Failed to read registers", err),
            },
            "registers_summary" => match self.store.registers_summary(device_id).await {
                Ok(summary) => json!({ "status": "ok", "registers_summary": summary }),
                Err(err) if err.is_not_found() => error("No registers found"),
                Err(err) => failure("Failed to read registers", err),
            },
            other => error(format!("Unsupported read type: {}", other)),
        }
    }

    async fn create(&self, command: Command) -> Value {
        let config = command.config.unwrap_or(Value::Null);
        match command.kind.as_str() {
            "device" => {
                let config: DeviceConfig = match serde_json::from_value(config) {
                    Ok(config) => config,
                    Err(err) => return error(format!("Device creation failed: {}", err)),
                };
                match self.store.create_device(config).await {
                    Ok(device_id) => json!({ "status": "ok", "device_id": device_id }),
                    Err(err) => failure("Device creation failed", err),
                }
            }
            "register" => {
                let config: RegisterConfig = match serde_json::from_value(config) {
                    Ok(config) => config,
                    Err(err) => return error(format!("Register creation failed: {}", err)),
                };
                match self.store.create_register(&command.device_id, config).await {
                    Ok(register_id) => json!({ "status": "ok", "register_id": register_id }),
                    Err(err) => failure("Register creation failed", err),
                }
            }
            other => error(format!("Unsupported create type: {}", other)),
        }
    }

    async fn delete(&self, command: &Command) -> Value {
        match command.kind.as_str() {
            "device" => match self.store.delete_device(&command.device_id).await {
                Ok(true) => {
                    self.tap.clear_if(&command.device_id).await;
                    ok("Device deleted")
                }
                Ok(false) => error("Device deletion failed"),
                Err(err) => failure("Device deletion failed", err),
            },
            "register" => match self
                .store
                .delete_register(&command.device_id, &command.register_id)
                .await
            {
                Ok(true) => ok("Register deleted"),
                Ok(false) => error("Register deletion failed"),
                Err(err) => failure("Register deletion failed", err),
            },
            other => error(format!("Unsupported delete type: {}", other)),
        }
    }

    async fn stream(&self, command: &Command) -> Value {
        match command.kind.as_str() {
            "start" => match self.store.read_device(&command.device_id).await {
                Ok(device) => {
                    self.tap.select(device.device_id.clone()).await;
                    json!({
                        "status": "ok",
                        "message": "Streaming started",
                        "device_id": device.device_id,
                    })
                }
                Err(err) if err.is_not_found() => error("Device not found"),
                Err(err) => failure("Failed to start streaming", err),
            },
            "stop" => {
                self.tap.clear().await;
                ok("Streaming stopped")
            }
            other => error(format!("Unsupported stream type: {}", other)),
        }
    }
}

/// 实时流推送帧
pub fn stream_frame(record: &DataRecord) -> Value {
    json!({ "status": "data", "data": record })
}

fn ok(message: &str) -> Value {
    json!({ "status": "ok", "message": message })
}

fn error(message: impl Into<String>) -> Value {
    json!({ "status": "error", "message": message.into() })
}

fn failure(message: &str, err: impl std::fmt::Display) -> Value {
    warn!(target: "gw.command", error = %err, "{}", message);
    error(format!("{}: {}", message, err))
}
