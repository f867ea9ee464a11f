//! 整文件键值存储
//!
//! 设备配置以"整文件读 / 整文件写"的方式持久化：
//! - FsFileStore：以目录为根的文件实现（写入先落临时文件再 rename）
//! - InMemoryFileStore：内存实现，可注入写失败（用于测试）

use crate::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// 整文件存储接口
#[async_trait]
pub trait FileStore: Send + Sync {
    /// 读取整个文件；文件不存在返回 None
    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// 覆盖写入整个文件
    async fn write(&self, name: &str, contents: &[u8]) -> Result<(), StorageError>;

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.read(name).await?.is_some())
    }
}

/// 基于本地目录的文件存储。
#[derive(Debug, Clone)]
pub struct FsFileStore {
    root: PathBuf,
}

impl FsFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name.trim_start_matches('/'))
    }
}

#[async_trait]
impl FileStore for FsFileStore {
    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match tokio::fs::read(self.path_of(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, name: &str, contents: &[u8]) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let target = self.path_of(name);
        let staging = target.with_extension("tmp");
        tokio::fs::write(&staging, contents).await?;
        tokio::fs::rename(&staging, &target).await?;
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(tokio::fs::try_exists(self.path_of(name)).await?)
    }
}

/// 内存文件存储（测试用）。
#[derive(Debug, Default)]
pub struct InMemoryFileStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的写入全部失败（模拟存储写满 / 损坏）
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 直接放入文件内容，绕过写失败注入
    pub fn put(&self, name: &str, contents: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(name.to_string(), contents.into());
        }
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.files
            .read()
            .ok()
            .and_then(|files| files.get(name).cloned())
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.get(name))
    }

    async fn write(&self, name: &str, contents: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("injected write failure")));
        }
        let mut files = self
            .files
            .write()
            .map_err(|_| StorageError::Io(std::io::Error::other("lock poisoned")))?;
        files.insert(name.to_string(), contents.to_vec());
        Ok(())
    }
}
