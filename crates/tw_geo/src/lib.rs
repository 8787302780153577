// crates/tw_geo/src/lib.rs
//! TerraWall 几何处理模块
//!
//! 提供平面几何类型、多边形运算、足迹空间索引和坐标参考系统 (CRS) 标识。
//!
//! # 模块
//!
//! - `geometry`: 平面点 `Point2D`
//! - `polygon`: 足迹多边形 `Polygon`（面积、包含、精确相交面积）与中心线 `Polyline`
//! - `spatial_index`: 基于 R-tree 的包围盒索引
//! - `crs`: CRS 定义与协调规则
//!
//! # 示例
//!
//! ```
//! use tw_geo::prelude::*;
//!
//! let a = Polygon::rectangle(0.0, 0.0, 10.0, 10.0).unwrap();
//! let b = Polygon::rectangle(5.0, 5.0, 15.0, 15.0).unwrap();
//! assert!((a.intersection_area(&b) - 25.0).abs() < 1e-9);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod crs;
pub mod error;
pub mod geometry;
pub mod polygon;
pub mod spatial_index;

/// 预导入模块
pub mod prelude {
    pub use crate::crs::{CrsDefinition, CrsReconciliation};
    pub use crate::geometry::Point2D;
    pub use crate::polygon::{ExtremeVertices, Polygon, Polyline};
    pub use crate::spatial_index::{BoundingBox, FootprintIndex};
}

// 重导出常用类型
pub use crs::{CrsDefinition, CrsReconciliation};
pub use error::{GeoError, GeoResult};
pub use geometry::Point2D;
pub use polygon::{ExtremeVertices, Polygon, Polyline};
pub use spatial_index::{BoundingBox, FootprintIndex};
