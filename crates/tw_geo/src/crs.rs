// crates/tw_geo/src/crs.rs
//! 坐标参考系统 (CRS) 标识与协调
//!
//! 本项目不做坐标变换：所有栅格都应处于同一投影平面内。
//! CRS 在这里只是一个可比较的标识，用于检测测量面与基准面是否一致，
//! 以及在一侧未定义时赋予构筑物的规范 CRS。
//!
//! # 示例
//!
//! ```
//! use tw_geo::crs::{reconcile, CrsDefinition};
//!
//! let canonical = CrsDefinition::Epsg(32719);
//! let base = CrsDefinition::parse("EPSG:32719").unwrap();
//!
//! let rec = reconcile(None, Some(&base), &canonical).unwrap();
//! assert!(rec.patch_assigned);
//! assert_eq!(rec.crs.epsg_code(), Some(32719));
//! ```

use crate::error::{GeoError, GeoResult};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// CRS 定义类型
// ============================================================================

/// CRS 定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrsDefinition {
    /// EPSG 代码（如 32719 = WGS84 / UTM 19S）
    Epsg(u32),
    /// WKT 格式（来自 `.prj` 文件）
    Wkt(String),
}

impl CrsDefinition {
    /// 解析 CRS 定义字符串
    ///
    /// 接受 `EPSG:xxxx`、纯数字代码以及 WKT 文本。
    ///
    /// # Errors
    ///
    /// 空字符串或无法识别的格式返回 [`GeoError::CrsParseFailed`]。
    pub fn parse(definition: &str) -> GeoResult<Self> {
        let s = definition.trim();
        if s.is_empty() {
            return Err(GeoError::crs_parse_failed(definition, "定义为空"));
        }

        let upper = s.to_ascii_uppercase();
        if let Some(suffix) = upper.strip_prefix("EPSG:") {
            return suffix
                .trim()
                .parse()
                .map(CrsDefinition::Epsg)
                .map_err(|_| GeoError::crs_parse_failed(definition, "EPSG 代码不是整数"));
        }
        if let Ok(code) = s.parse::<u32>() {
            return Ok(CrsDefinition::Epsg(code));
        }
        if s.contains('[') {
            return Ok(CrsDefinition::Wkt(s.to_string()));
        }

        Err(GeoError::crs_parse_failed(definition, "无法识别的格式"))
    }

    /// 获取 EPSG 代码（如果有）
    #[must_use]
    pub fn epsg_code(&self) -> Option<u32> {
        match self {
            CrsDefinition::Epsg(code) => Some(*code),
            CrsDefinition::Wkt(s) => Self::parse_epsg(s),
        }
    }

    /// 两个定义是否指向同一 CRS
    ///
    /// 双方都能得到 EPSG 代码时按代码比较，否则按规范化后的文本比较。
    #[must_use]
    pub fn is_equivalent(&self, other: &Self) -> bool {
        match (self.epsg_code(), other.epsg_code()) {
            (Some(a), Some(b)) => a == b,
            _ => normalize_wkt(&self.to_string()) == normalize_wkt(&other.to_string()),
        }
    }

    /// 从 WKT 中提取 EPSG 代码
    fn parse_epsg(s: &str) -> Option<u32> {
        // 最外层的 AUTHORITY / ID 位于文本末尾
        if let Some(pos) = s.rfind("AUTHORITY[\"EPSG\",\"") {
            let start = pos + 18;
            if let Some(end) = s[start..].find("\"]") {
                return s[start..start + end].parse().ok();
            }
        }
        if let Some(pos) = s.rfind("ID[\"EPSG\",") {
            let start = pos + 10;
            if let Some(end) = s[start..].find(']') {
                return s[start..start + end].trim().parse().ok();
            }
        }
        None
    }
}

impl fmt::Display for CrsDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsDefinition::Epsg(code) => write!(f, "EPSG:{code}"),
            CrsDefinition::Wkt(s) => f.write_str(s),
        }
    }
}

fn normalize_wkt(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

// ============================================================================
// CRS 协调
// ============================================================================

/// 测量面与基准面的 CRS 协调结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrsReconciliation {
    /// 两侧共同使用的 CRS
    pub crs: CrsDefinition,
    /// 测量面原本未定义，已赋予 `crs`
    pub patch_assigned: bool,
    /// 基准面原本未定义，已赋予 `crs`
    pub base_assigned: bool,
}

impl CrsReconciliation {
    /// 是否发生了自动赋值
    #[must_use]
    pub fn any_assigned(&self) -> bool {
        self.patch_assigned || self.base_assigned
    }
}

/// 协调测量面与基准面的 CRS
///
/// - 双方都已定义且一致：沿用基准面的定义
/// - 一侧未定义：赋予另一侧的定义；双方都未定义时赋予 `canonical`
/// - 双方都已定义且不一致：返回 [`GeoError::CrsMismatch`]
///
/// # Errors
///
/// 两个已定义的 CRS 互不等价时返回错误。
pub fn reconcile(
    patch: Option<&CrsDefinition>,
    base: Option<&CrsDefinition>,
    canonical: &CrsDefinition,
) -> GeoResult<CrsReconciliation> {
    match (patch, base) {
        (Some(p), Some(b)) => {
            if p.is_equivalent(b) {
                Ok(CrsReconciliation {
                    crs: b.clone(),
                    patch_assigned: false,
                    base_assigned: false,
                })
            } else {
                Err(GeoError::crs_mismatch(p.to_string(), b.to_string()))
            }
        }
        (None, Some(b)) => Ok(CrsReconciliation {
            crs: b.clone(),
            patch_assigned: true,
            base_assigned: false,
        }),
        (Some(p), None) => Ok(CrsReconciliation {
            crs: p.clone(),
            patch_assigned: false,
            base_assigned: true,
        }),
        (None, None) => Ok(CrsReconciliation {
            crs: canonical.clone(),
            patch_assigned: true,
            base_assigned: true,
        }),
    }
}
