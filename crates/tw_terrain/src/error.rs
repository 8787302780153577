// crates/tw_terrain/src/error.rs
//! 地形处理错误类型
//!
//! `InsufficientData` 属于软错误：调用方应记录空指标并继续处理，
//! 其余变体表示输入栅格或参数本身不可用。

use thiserror::Error;
use tw_foundation::TwError;
use tw_geo::GeoError;

/// Terrain 模块结果类型
pub type TerrainResult<T> = Result<T, TerrainError>;

/// 地形处理错误
#[derive(Error, Debug)]
pub enum TerrainError {
    /// 栅格几何无效（像素尺寸非正、尺寸为零等）
    #[error("无效的栅格几何: {reason}")]
    InvalidGeometry {
        /// 原因
        reason: String,
    },

    /// 高程缓冲区长度与栅格尺寸不符
    #[error("高程缓冲区长度不匹配: 期望 {expected}, 实际 {actual}")]
    BufferSizeMismatch {
        /// 期望长度 (W×H)
        expected: usize,
        /// 实际长度
        actual: usize,
    },

    /// 足迹内没有有效的重叠单元
    #[error("数据不足: {context}")]
    InsufficientData {
        /// 上下文说明
        context: String,
    },

    /// 参数无效
    #[error("参数无效: {name}={value}: {reason}")]
    InvalidParameter {
        /// 参数名
        name: &'static str,
        /// 参数值
        value: f64,
        /// 原因
        reason: String,
    },

    /// 几何错误
    #[error("几何错误: {0}")]
    Geo(#[from] GeoError),

    /// 基础层错误
    #[error("基础层错误: {0}")]
    Foundation(#[from] TwError),
}

impl From<TerrainError> for TwError {
    fn from(err: TerrainError) -> Self {
        match err {
            TerrainError::InvalidGeometry { reason } => {
                TwError::invalid_input(format!("无效的栅格几何: {reason}"))
            }
            TerrainError::BufferSizeMismatch { expected, actual } => {
                TwError::size_mismatch("elevation buffer", expected, actual)
            }
            TerrainError::InsufficientData { context } => TwError::insufficient_data(context),
            TerrainError::InvalidParameter { name, value, reason } => {
                TwError::config(format!("参数 {name}={value} 无效: {reason}"))
            }
            TerrainError::Geo(err) => err.into(),
            TerrainError::Foundation(err) => err,
        }
    }
}

impl TerrainError {
    /// 创建无效几何错误
    pub fn invalid_geometry(reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            reason: reason.into(),
        }
    }

    /// 创建数据不足错误
    pub fn insufficient_data(context: impl Into<String>) -> Self {
        Self::InsufficientData {
            context: context.into(),
        }
    }

    /// 创建参数无效错误
    pub fn invalid_parameter(name: &'static str, value: f64, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            value,
            reason: reason.into(),
        }
    }

    /// 是否为数据不足（非致命）
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }

    /// 检查参数为有限正数
    pub fn check_positive(name: &'static str, value: f64) -> TerrainResult<()> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(Self::invalid_parameter(name, value, "必须为有限正数"))
        }
    }
}
