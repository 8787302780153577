// crates/tw_geo/src/error.rs
//! 几何处理错误类型
//!
//! 包含多边形构造、CRS 解析与协调相关的错误。
//! 所有错误可转换为 `tw_foundation::TwError` 向上传播。
//!
//! # 错误分类
//!
//! - **验证错误**：多边形顶点不足、面积为零、坐标非有限
//! - **配置错误**：CRS 定义无效
//! - **协调错误**：两个已定义的 CRS 互不相同

use thiserror::Error;
use tw_foundation::TwError;

/// Geo 模块结果类型
pub type GeoResult<T> = Result<T, GeoError>;

/// 几何处理错误
#[derive(Error, Debug)]
pub enum GeoError {
    /// 多边形无效
    #[error("无效的多边形: {reason}")]
    InvalidPolygon {
        /// 无效原因
        reason: String,
    },

    /// 折线无效
    #[error("无效的折线: {reason}")]
    InvalidPolyline {
        /// 无效原因
        reason: String,
    },

    /// 坐标非有限数
    #[error("{context} 含有非有限坐标 ({x}, {y})")]
    NonFiniteCoordinate {
        /// 出现位置
        context: &'static str,
        /// x 坐标
        x: f64,
        /// y 坐标
        y: f64,
    },

    /// CRS 定义解析失败
    #[error("CRS 定义解析失败: {definition}: {reason}")]
    CrsParseFailed {
        /// 失败的定义字符串
        definition: String,
        /// 失败原因
        reason: String,
    },

    /// 两个已定义的 CRS 不一致
    #[error("CRS 不一致: 测量面 {patch}, 基准面 {base}")]
    CrsMismatch {
        /// 测量面 CRS
        patch: String,
        /// 基准面 CRS
        base: String,
    },

    /// 基础层错误
    #[error("基础层错误: {0}")]
    Foundation(#[from] TwError),
}

// ============================================================================
// 转换实现
// ============================================================================

impl From<GeoError> for TwError {
    fn from(err: GeoError) -> Self {
        match err {
            GeoError::InvalidPolygon { reason } => {
                TwError::invalid_input(format!("无效的多边形: {reason}"))
            }
            GeoError::InvalidPolyline { reason } => {
                TwError::invalid_input(format!("无效的折线: {reason}"))
            }
            GeoError::NonFiniteCoordinate { context, x, y } => {
                TwError::invalid_input(format!("{context} 含有非有限坐标 ({x}, {y})"))
            }
            GeoError::CrsParseFailed { definition, reason } => {
                TwError::crs(format!("CRS解析失败 [{definition}]: {reason}"))
            }
            GeoError::CrsMismatch { patch, base } => {
                TwError::crs(format!("CRS 不一致: 测量面 {patch}, 基准面 {base}"))
            }
            GeoError::Foundation(err) => err,
        }
    }
}

// ============================================================================
// 便捷构造函数
// ============================================================================

impl GeoError {
    /// 创建无效多边形错误
    #[inline]
    pub fn invalid_polygon(reason: impl Into<String>) -> Self {
        Self::InvalidPolygon {
            reason: reason.into(),
        }
    }

    /// 创建无效折线错误
    #[inline]
    pub fn invalid_polyline(reason: impl Into<String>) -> Self {
        Self::InvalidPolyline {
            reason: reason.into(),
        }
    }

    /// 创建 CRS 解析失败错误
    #[inline]
    pub fn crs_parse_failed(definition: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CrsParseFailed {
            definition: definition.into(),
            reason: reason.into(),
        }
    }

    /// 创建 CRS 不一致错误
    #[inline]
    pub fn crs_mismatch(patch: impl Into<String>, base: impl Into<String>) -> Self {
        Self::CrsMismatch {
            patch: patch.into(),
            base: base.into(),
        }
    }

    /// 检查坐标是否有限
    #[inline]
    pub fn check_finite(context: &'static str, x: f64, y: f64) -> Result<(), Self> {
        if x.is_finite() && y.is_finite() {
            Ok(())
        } else {
            Err(Self::NonFiniteCoordinate { context, x, y })
        }
    }
}

// ============================================================================
// 测试
// ============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_finite() {
        assert!(GeoError::check_finite("足迹", 1.0, 2.0).is_ok());
        assert!(GeoError::check_finite("足迹", f64::NAN, 2.0).is_err());
    }

    #[test]
    fn test_into_foundation() {
        let err: TwError = GeoError::crs_mismatch("EPSG:32719", "EPSG:4326").into();
        assert!(matches!(err, TwError::Crs(_)));
        assert!(err.to_string().contains("EPSG:32719"));
    }
}
