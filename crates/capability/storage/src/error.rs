//! 存储层错误类型
//!
//! - NotFound：按 ID 查找未命中
//! - Persist：写回存储失败（缓存已失效，下次读取重新同步）
//! - Malformed：磁盘内容未通过结构校验（按"无数据"处理）
//! - Invalid：调用方提供的配置不合法
//! - Io：底层文件读写错误

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("persist failed: {0}")]
    Persist(String),
    #[error("malformed document: {0}")]
    Malformed(String),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
