// crates/tw_io/src/error.rs
//! IO 错误类型定义
//!
//! 提供 IO 模块的统一错误枚举，支持通过 thiserror 自动转换底层错误。
//! 所有错误最终可转换为 TwError 以实现跨层错误传递。

use std::path::{Path, PathBuf};
use thiserror::Error;
use tw_foundation::TwError;
use tw_terrain::TerrainError;

/// IO 模块结果类型别名
pub type IoResult<T> = Result<T, IoError>;

/// IO 错误枚举
#[derive(Error, Debug)]
pub enum IoError {
    /// 文件读写失败
    #[error("文件读写失败: {path}: {source}")]
    File {
        /// 文件路径
        path: PathBuf,
        /// 底层错误
        #[source]
        source: std::io::Error,
    },

    /// 文本格式解析错误
    #[error("文件解析错误: {file}:{line} - {message}")]
    ParseError {
        /// 文件
        file: String,
        /// 行号（从 1 开始，0 表示整体）
        line: usize,
        /// 说明
        message: String,
    },

    /// JSON 读写错误
    #[error("JSON 错误: {path}: {source}")]
    Json {
        /// 文件路径
        path: PathBuf,
        /// 底层错误
        #[source]
        source: serde_json::Error,
    },

    /// 工作栅格文件损坏
    #[error("工作栅格损坏: {path}, 原因: {reason}")]
    GridFileCorruption {
        /// 文件路径
        path: PathBuf,
        /// 原因
        reason: String,
    },

    /// 工作栅格校验和错误
    #[error("校验和错误: {path}: 期望 {expected:08x}, 实际 {found:08x}")]
    Checksum {
        /// 文件路径
        path: PathBuf,
        /// 存储值
        expected: u32,
        /// 计算值
        found: u32,
    },

    /// 工作栅格版本不兼容
    #[error("版本不兼容: 文件版本 {file}, 当前版本 {current}")]
    Version {
        /// 文件中的版本
        file: u32,
        /// 当前支持的版本
        current: u32,
    },

    /// 栅格构造错误
    #[error("栅格错误: {0}")]
    Terrain(#[from] TerrainError),

    /// 基础层错误转换
    #[error("基础层错误: {0}")]
    Foundation(#[from] TwError),
}

impl IoError {
    /// 包装文件读写错误
    pub fn file(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::File {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// 创建解析错误
    pub fn parse(file: impl AsRef<Path>, line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            file: file.as_ref().display().to_string(),
            line,
            message: message.into(),
        }
    }

    /// 创建损坏错误
    pub fn corrupted(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::GridFileCorruption {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// 文件是否不存在
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::File { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

impl From<IoError> for TwError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::File { path, source } => {
                TwError::io_with_source(format!("文件读写失败: {}", path.display()), source)
            }
            IoError::ParseError { file, line, message } => TwError::parse(file, line, message),
            IoError::Json { path, source } => {
                TwError::serialization(format!("{}: {source}", path.display()))
            }
            IoError::GridFileCorruption { path, reason } => {
                TwError::io(format!("工作栅格损坏 [{}]: {reason}", path.display()))
            }
            IoError::Checksum { path, expected, found } => TwError::io(format!(
                "校验和错误 [{}]: 期望 {expected:08x}, 实际 {found:08x}",
                path.display()
            )),
            IoError::Version { file, current } => {
                TwError::io(format!("版本不兼容: 文件版本 {file}, 当前版本 {current}"))
            }
            IoError::Terrain(err) => err.into(),
            IoError::Foundation(err) => err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let err = IoError::file(
            "missing.asc",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert!(err.is_not_found());
        let tw: TwError = err.into();
        assert!(tw.is_io());
    }
}
