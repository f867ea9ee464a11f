//! 设备 / 寄存器配置库
//!
//! devices.json 为按设备 ID 索引的 JSON 对象（保持插入顺序），
//! 每个值包含设备字段与内嵌的有序寄存器数组。
//! registers.json 为保留的并行集合，仅在初始化时创建为空对象。
//!
//! 缓存规则：
//! - 内存中的设备集合要么有效（与磁盘一致），要么失效（下次读取前必须重新加载）
//! - 读取：失效时强制加载
//! - 写入：先修改内存结构，再持久化；持久化失败则使缓存失效
//! - 整个写操作持有写锁，读者不会看到未落盘的修改
//!
//! `list_registers` / `delete_register` / 摘要查询直接读取磁盘集合，不经过缓存；
//! `delete_register` 成功后使缓存失效，让轮询路径重新同步。

use crate::error::StorageError;
use crate::file_store::FileStore;
use crate::ids::generate_unique_id;
use domain::{
    DEVICE_ID_PREFIX, DeviceConfig, DeviceRecord, DeviceSummary, REGISTER_ID_PREFIX,
    RegisterConfig, RegisterRecord, RegisterSummary,
};
use gw_telemetry::{record_cache_load, record_persist_failure};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// 设备集合文件
pub const DEVICES_FILE: &str = "devices.json";
/// 保留的寄存器集合文件
pub const REGISTERS_FILE: &str = "registers.json";

const EMPTY_DOCUMENT: &[u8] = b"{}";

#[derive(Debug, Default)]
struct DevicesCache {
    valid: bool,
    devices: Vec<DeviceRecord>,
}

impl DevicesCache {
    fn invalidate(&mut self) {
        self.valid = false;
        self.devices.clear();
    }

    fn find(&self, device_id: &str) -> Option<&DeviceRecord> {
        self.devices.iter().find(|device| device.device_id == device_id)
    }

    fn find_mut(&mut self, device_id: &str) -> Option<&mut DeviceRecord> {
        self.devices
            .iter_mut()
            .find(|device| device.device_id == device_id)
    }
}

/// 带缓存的设备配置库。
pub struct ConfigStore {
    files: Arc<dyn FileStore>,
    cache: RwLock<DevicesCache>,
}

impl ConfigStore {
    pub fn new(files: Arc<dyn FileStore>) -> Self {
        Self {
            files,
            cache: RwLock::new(DevicesCache::default()),
        }
    }

    /// 初始化：缺失的集合文件写为空对象，并预热缓存
    pub async fn init(&self) -> Result<(), StorageError> {
        for name in [DEVICES_FILE, REGISTERS_FILE] {
            if !self.files.exists(name).await? {
                self.files
                    .write(name, EMPTY_DOCUMENT)
                    .await
                    .map_err(|err| StorageError::Persist(err.to_string()))?;
                info!(target: "gw.storage", file = name, "collection_file_created");
            }
        }
        let mut cache = self.cache.write().await;
        self.ensure_loaded(&mut cache).await?;
        info!(target: "gw.storage", devices = cache.devices.len(), "config_store_ready");
        Ok(())
    }

    /// 创建设备，返回生成的 device_id
    pub async fn create_device(&self, config: DeviceConfig) -> Result<String, StorageError> {
        let mut cache = self.cache.write().await;
        self.ensure_loaded(&mut cache).await?;

        let device_id = generate_unique_id(DEVICE_ID_PREFIX, |candidate| {
            cache.find(candidate).is_some()
        });
        cache
            .devices
            .push(DeviceRecord::new(device_id.clone(), config));

        self.persist_cache(&mut cache).await?;
        info!(target: "gw.storage", device_id = %device_id, "device_created");
        Ok(device_id)
    }

    /// 读取设备（返回副本，调用方无法修改缓存）
    pub async fn read_device(&self, device_id: &str) -> Result<DeviceRecord, StorageError> {
        self.with_devices(|devices| {
            devices
                .iter()
                .find(|device| device.device_id == device_id)
                .cloned()
        })
        .await?
        .ok_or_else(|| StorageError::NotFound(device_id.to_string()))
    }

    /// 删除设备；不存在返回 false。持久化失败时不回滚，仅使缓存失效
    pub async fn delete_device(&self, device_id: &str) -> Result<bool, StorageError> {
        let mut cache = self.cache.write().await;
        self.ensure_loaded(&mut cache).await?;

        let before = cache.devices.len();
        cache.devices.retain(|device| device.device_id != device_id);
        if cache.devices.len() == before {
            return Ok(false);
        }

        self.persist_cache(&mut cache).await?;
        info!(target: "gw.storage", device_id = %device_id, "device_deleted");
        Ok(true)
    }

    /// 按插入顺序列出所有设备 ID
    pub async fn list_devices(&self) -> Result<Vec<String>, StorageError> {
        self.with_devices(|devices| {
            devices
                .iter()
                .map(|device| device.device_id.clone())
                .collect()
        })
        .await
    }

    /// 在设备下追加寄存器，返回生成的 register_id
    pub async fn create_register(
        &self,
        device_id: &str,
        config: RegisterConfig,
    ) -> Result<String, StorageError> {
        let mut cache = self.cache.write().await;
        self.ensure_loaded(&mut cache).await?;

        let device = cache
            .find_mut(device_id)
            .ok_or_else(|| StorageError::NotFound(device_id.to_string()))?;
        let register_id = generate_unique_id(REGISTER_ID_PREFIX, |candidate| {
            device
                .registers
                .iter()
                .any(|register| register.register_id == candidate)
        });
        device
            .registers
            .push(RegisterRecord::new(register_id.clone(), config));
        debug!(
            target: "gw.storage",
            device_id = %device_id,
            registers = device.registers.len(),
            "register_appended"
        );

        self.persist_cache(&mut cache).await?;
        info!(
            target: "gw.storage",
            device_id = %device_id,
            register_id = %register_id,
            "register_created"
        );
        Ok(register_id)
    }

    /// 列出设备寄存器（直接读磁盘）
    pub async fn list_registers(&self, device_id: &str) -> Result<Vec<RegisterRecord>, StorageError> {
        let devices = self.read_disk_devices().await?;
        devices
            .into_iter()
            .find(|device| device.device_id == device_id)
            .map(|device| device.registers)
            .ok_or_else(|| StorageError::NotFound(device_id.to_string()))
    }

    /// 删除寄存器（直接改写磁盘）；设备或寄存器不存在返回 false
    pub async fn delete_register(
        &self,
        device_id: &str,
        register_id: &str,
    ) -> Result<bool, StorageError> {
        // 与缓存写入串行，避免整集合写回互相覆盖
        let mut cache = self.cache.write().await;

        let mut devices = self.read_disk_devices().await?;
        let Some(device) = devices
            .iter_mut()
            .find(|device| device.device_id == device_id)
        else {
            return Ok(false);
        };
        let Some(index) = device
            .registers
            .iter()
            .position(|register| register.register_id == register_id)
        else {
            return Ok(false);
        };
        device.registers.remove(index);

        let write_result = self.write_devices(&devices).await;
        // 无论成功与否，磁盘状态都可能与缓存不同
        cache.invalidate();
        write_result?;
        info!(
            target: "gw.storage",
            device_id = %device_id,
            register_id = %register_id,
            "register_deleted"
        );
        Ok(true)
    }

    /// 设备摘要（直接读磁盘）
    pub async fn devices_summary(&self) -> Result<Vec<DeviceSummary>, StorageError> {
        let devices = self.read_disk_devices().await?;
        Ok(devices.iter().map(DeviceRecord::summary).collect())
    }

    /// 寄存器摘要（直接读磁盘）
    pub async fn registers_summary(
        &self,
        device_id: &str,
    ) -> Result<Vec<RegisterSummary>, StorageError> {
        let registers = self.list_registers(device_id).await?;
        Ok(registers.iter().map(RegisterRecord::summary).collect())
    }

    /// 丢弃缓存并立即从磁盘重新加载
    pub async fn refresh_cache(&self) -> Result<(), StorageError> {
        let mut cache = self.cache.write().await;
        cache.invalidate();
        self.ensure_loaded(&mut cache).await
    }

    /// 清空全部设备与寄存器配置
    pub async fn clear_all(&self) -> Result<(), StorageError> {
        let mut cache = self.cache.write().await;
        cache.invalidate();
        for name in [DEVICES_FILE, REGISTERS_FILE] {
            self.files.write(name, EMPTY_DOCUMENT).await.map_err(|err| {
                record_persist_failure();
                StorageError::Persist(err.to_string())
            })?;
        }
        info!(target: "gw.storage", "configurations_cleared");
        Ok(())
    }

    pub async fn is_cache_valid(&self) -> bool {
        self.cache.read().await.valid
    }

    /// 在有效缓存上执行只读闭包；缓存失效时先加载
    async fn with_devices<R>(
        &self,
        f: impl FnOnce(&[DeviceRecord]) -> R,
    ) -> Result<R, StorageError> {
        {
            let cache = self.cache.read().await;
            if cache.valid {
                return Ok(f(&cache.devices));
            }
        }
        let mut cache = self.cache.write().await;
        self.ensure_loaded(&mut cache).await?;
        Ok(f(&cache.devices))
    }

    async fn ensure_loaded(&self, cache: &mut DevicesCache) -> Result<(), StorageError> {
        if cache.valid {
            return Ok(());
        }
        cache.devices = self.read_disk_devices().await?;
        cache.valid = true;
        record_cache_load();
        debug!(target: "gw.storage", devices = cache.devices.len(), "devices_cache_loaded");
        Ok(())
    }

    async fn persist_cache(&self, cache: &mut DevicesCache) -> Result<(), StorageError> {
        if let Err(err) = self.write_devices(&cache.devices).await {
            cache.invalidate();
            return Err(err);
        }
        Ok(())
    }

    async fn write_devices(&self, devices: &[DeviceRecord]) -> Result<(), StorageError> {
        let bytes = encode_devices(devices)?;
        self.files.write(DEVICES_FILE, &bytes).await.map_err(|err| {
            record_persist_failure();
            warn!(target: "gw.storage", error = %err, "devices_persist_failed");
            StorageError::Persist(err.to_string())
        })
    }

    /// 读取磁盘集合；内容不合法时按空集合处理
    async fn read_disk_devices(&self) -> Result<Vec<DeviceRecord>, StorageError> {
        let Some(bytes) = self.files.read(DEVICES_FILE).await? else {
            return Ok(Vec::new());
        };
        match decode_devices(&bytes) {
            Ok(devices) => Ok(devices),
            Err(err) => {
                warn!(target: "gw.storage", error = %err, "devices_document_ignored");
                Ok(Vec::new())
            }
        }
    }
}

fn encode_devices(devices: &[DeviceRecord]) -> Result<Vec<u8>, StorageError> {
    let mut document = Map::new();
    for device in devices {
        let value = serde_json::to_value(device)
            .map_err(|err| StorageError::Invalid(err.to_string()))?;
        document.insert(device.device_id.clone(), value);
    }
    serde_json::to_vec(&Value::Object(document)).map_err(|err| StorageError::Invalid(err.to_string()))
}

/// 解析设备集合。顶层不是对象返回 Malformed；单个设备不合法则跳过该设备
fn decode_devices(bytes: &[u8]) -> Result<Vec<DeviceRecord>, StorageError> {
    let document: Map<String, Value> =
        serde_json::from_slice(bytes).map_err(|err| StorageError::Malformed(err.to_string()))?;

    let mut devices = Vec::with_capacity(document.len());
    for (device_id, mut value) in document {
        if let Value::Object(fields) = &mut value {
            fields.insert("device_id".to_string(), Value::String(device_id.clone()));
        }
        match serde_json::from_value::<DeviceRecord>(value) {
            Ok(device) => devices.push(device),
            Err(err) => {
                warn!(
                    target: "gw.storage",
                    device_id = %device_id,
                    error = %err,
                    "malformed_device_skipped"
                );
            }
        }
    }
    Ok(devices)
}
