//! # 网关配置存储模块
//!
//! 提供设备 / 寄存器配置的持久化与缓存。
//!
//! ## 架构设计
//!
//! 1. **整文件存储层** (`file_store.rs`)：`FileStore` 接口，整文件读写
//! 2. **配置库** (`config_store.rs`)：设备集合缓存 + CRUD
//! 3. **错误处理层** (`error.rs`)：统一的存储错误类型
//! 4. **ID 生成** (`ids.rs`)：带前缀的定长 ID
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use gw_storage::{ConfigStore, FsFileStore};
//! use std::sync::Arc;
//!
//! let store = ConfigStore::new(Arc::new(FsFileStore::new("data")));
//! store.init().await?;
//! let device_id = store.create_device(config).await?;
//! let device = store.read_device(&device_id).await?;
//! ```
//!
//! ## 设计约束
//!
//! - 缓存只由配置库自身修改，外部只能通过 CRUD 接口访问
//! - 读取返回副本，不暴露内部引用
//! - 持久化失败使缓存失效，下次读取从最近一次落盘状态重新同步

pub mod config_store;
pub mod error;
pub mod file_store;
pub mod ids;

pub use config_store::{ConfigStore, DEVICES_FILE, REGISTERS_FILE};
pub use error::StorageError;
pub use file_store::{FileStore, FsFileStore, InMemoryFileStore};
pub use ids::{generate_id, generate_unique_id};
