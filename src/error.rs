use libc::c_int;
use thiserror::Error;

use crate::core::InvalidLeafName;

/// catalog 来源不可读或内容损坏；刷新失败时旧索引保持生效。
#[derive(Debug, Error)]
pub enum CatalogLoadError {
    #[error("catalog io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog header rejected: {0}")]
    Header(String),

    #[error("catalog checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    Checksum { stored: u32, computed: u32 },

    #[error("catalog decode failed: {0}")]
    Decode(#[from] bincode::Error),

    #[error("catalog record rejected: {0}")]
    Invalid(String),
}

/// 解析层错误；在宿主边界统一映射为 errno。
#[derive(Debug, Error)]
pub enum FsError {
    #[error(transparent)]
    CatalogLoad(#[from] CatalogLoadError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidName(#[from] InvalidLeafName),

    /// 目录为空与列目录出错合并为同一结果（宿主侧都是 ENOTDIR）
    #[error("empty or failed listing: {0}")]
    EmptyOrError(String),

    #[error("operation not supported on a read-only catalog: {0}")]
    Unsupported(&'static str),
}

impl FsError {
    pub fn not_found(what: impl Into<String>) -> Self {
        FsError::NotFound(what.into())
    }

    pub fn errno(&self) -> c_int {
        match self {
            FsError::CatalogLoad(_) => libc::EIO,
            FsError::NotFound(_) | FsError::InvalidName(_) => libc::ENOENT,
            FsError::EmptyOrError(_) => libc::ENOTDIR,
            FsError::Unsupported(_) => libc::ENOSYS,
        }
    }
}
