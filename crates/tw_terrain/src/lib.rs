// crates/tw_terrain/src/lib.rs

//! 地形栅格处理
//!
//! 提供累积地形面的增量更新所需的栅格算法。
//!
//! # 模块
//!
//! - `grid`: 地形栅格 `TerrainGrid` 与几何 `GridGeometry`
//! - `interpolation`: 无数据感知的重采样
//! - `distance`: 精确欧几里得距离变换
//! - `diff`: 体积差分 `VolumeDiffCalculator`
//! - `merge`: 斜坡投影融合 `SlopeProjectionMerger`
//! - `verify`: 融合前后变化核验
//! - `profile`: 横断面采样 `ProfileSampler`
//! - `classification`: 平均厚度分级

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classification;
pub mod diff;
pub mod distance;
pub mod error;
pub mod grid;
pub mod interpolation;
pub mod merge;
pub mod profile;
pub mod verify;

// 重导出常用类型
pub use classification::ThicknessClass;
pub use diff::{DiffParams, DiffResult, VolumeDiffCalculator};
pub use distance::DistanceField;
pub use error::{TerrainError, TerrainResult};
pub use grid::{GridGeometry, GridStatistics, TerrainGrid, DEFAULT_NODATA};
pub use interpolation::InterpolationMethod;
pub use merge::{MergeOutcome, MergeParams, MergeReport, SlopeProjectionMerger};
pub use profile::{ProfileParams, ProfileRole, ProfileSampler, ProfileSeries};
pub use verify::{MergeChangeReport, VerifyParams};
