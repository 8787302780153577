// crates/tw_foundation/src/error.rs

//! 统一错误类型
//!
//! 各层（geo、terrain、survey、io、config、workflow）定义自己的错误枚举，
//! 跨层传播时折叠为 `TwError`。这里的分类只保留调用方需要区分的情形：
//! 文件与格式问题、输入数据问题、配置问题，以及构筑物累积状态问题。
//!
//! # 示例
//!
//! ```
//! use tw_foundation::error::{TwError, TwResult};
//!
//! fn pixel_size(value: f64) -> TwResult<f64> {
//!     if value > 0.0 {
//!         Ok(value)
//!     } else {
//!         Err(TwError::invalid_input(format!("像素尺寸必须为正: {value}")))
//!     }
//! }
//!
//! assert!(pixel_size(0.5).is_ok());
//! assert!(pixel_size(-1.0).is_err());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// 统一结果类型
pub type TwResult<T> = Result<T, TwError>;

/// TerraWall 错误类型
#[derive(Error, Debug)]
pub enum TwError {
    // ---- 文件与格式 ----
    /// 读写失败
    #[error("读写失败: {message}")]
    Io {
        /// 出错的操作或文件
        message: String,
        /// 底层 IO 错误
        #[source]
        source: Option<std::io::Error>,
    },

    /// 文本格式（ASCII 栅格、CSV）解析失败
    #[error("{}:{line}: {message}", .file.display())]
    Parse {
        /// 文件路径
        file: PathBuf,
        /// 行号（从 1 开始）
        line: usize,
        /// 错误信息
        message: String,
    },

    /// JSON 编解码失败
    #[error("JSON 编解码失败: {message}")]
    Serialization {
        /// 失败原因
        message: String,
    },

    // ---- 输入数据 ----
    /// 几何或测量记录不合法
    #[error("输入无效: {message}")]
    InvalidInput {
        /// 无效原因
        message: String,
    },

    /// 栅格缓冲区长度与尺寸不符
    #[error("{name} 长度应为 {expected}，实为 {actual}")]
    SizeMismatch {
        /// 缓冲区名称
        name: &'static str,
        /// 宽 × 高
        expected: usize,
        /// 实际长度
        actual: usize,
    },

    /// 足迹内没有可用的栅格数据
    #[error("数据不足: {context}")]
    InsufficientData {
        /// 发生位置
        context: String,
    },

    /// 坐标参考系统无法解析或互不一致
    #[error("CRS: {0}")]
    Crs(String),

    // ---- 配置与状态 ----
    /// 参数或配置无效
    #[error("配置无效: {message}")]
    Config {
        /// 无效原因
        message: String,
    },

    /// 构筑物累积状态不可用（工作栅格无法读写、版本冲突）
    #[error("构筑物 {structure} 的累积状态不可用: {message}")]
    State {
        /// 构筑物代码
        structure: String,
        /// 原因
        message: String,
    },
}

impl TwError {
    /// 读写失败
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// 读写失败（带底层错误）
    pub fn io_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 解析失败
    pub fn parse(file: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// JSON 编解码失败
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// 输入无效
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 缓冲区长度不符
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 数据不足
    pub fn insufficient_data(context: impl Into<String>) -> Self {
        Self::InsufficientData {
            context: context.into(),
        }
    }

    /// CRS 问题
    pub fn crs(message: impl Into<String>) -> Self {
        Self::Crs(message.into())
    }

    /// 配置无效
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 构筑物状态不可用
    pub fn state(structure: impl Into<String>, message: impl Into<String>) -> Self {
        Self::State {
            structure: structure.into(),
            message: message.into(),
        }
    }

    /// 是否为文件或格式问题
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Parse { .. } | Self::Serialization { .. }
        )
    }

    /// 是否使构筑物的累积状态失效
    pub fn invalidates_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }
}

impl From<std::io::Error> for TwError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}
