// crates/tw_terrain/src/verify.rs

//! 融合变化核验
//!
//! 比较融合前后的累积面，统计发生变化的单元，用于发现"没有生效"的融合
//! （例如测量面完全落在累积面范围之外）。核验结果只做报告，不会使处理失败。

use crate::grid::TerrainGrid;
use crate::interpolation::InterpolationMethod;
use serde::{Deserialize, Serialize};
use tw_foundation::Tolerance;

/// 核验阈值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerifyParams {
    /// 判定有效所需的最少变化单元数
    pub min_changed_cells: usize,
    /// 判定有效所需的最小平均变化 [m]
    pub min_mean_change: f64,
}

impl Default for VerifyParams {
    fn default() -> Self {
        Self {
            min_changed_cells: 100,
            min_mean_change: 0.001,
        }
    }
}

/// 融合变化报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeChangeReport {
    /// 前后都有效的单元数
    pub compared_cells: usize,
    /// 高程变化超过容差的单元数
    pub changed_cells: usize,
    /// 变化单元占比 [%]
    pub percent_changed: f64,
    /// 最大绝对变化 [m]
    pub max_change: f64,
    /// 变化单元的平均绝对变化 [m]
    pub mean_abs_change: f64,
    /// 融合前缺失、融合后有值的单元数
    pub newly_valid_cells: usize,
    /// 是否达到有效阈值
    pub effective: bool,
}

/// 比较融合前后的累积面
///
/// 两者几何不同（如发生上采样）时，先将 `before` 最近邻对齐到 `after`。
pub fn compare(
    before: &TerrainGrid,
    after: &TerrainGrid,
    params: &VerifyParams,
    tolerance: &Tolerance,
) -> MergeChangeReport {
    let aligned = before.warp_to(after.geometry(), InterpolationMethod::Nearest);

    let mut compared = 0usize;
    let mut changed = 0usize;
    let mut newly_valid = 0usize;
    let mut max_change = 0.0f64;
    let mut sum_change = 0.0;

    for i in 0..after.geometry().cell_count() {
        match (aligned.get(i), after.get(i)) {
            (Some(b), Some(a)) => {
                compared += 1;
                if !tolerance.same_elevation(a, b) {
                    let delta = (a - b).abs();
                    changed += 1;
                    sum_change += delta;
                    max_change = max_change.max(delta);
                }
            }
            (None, Some(_)) => newly_valid += 1,
            _ => {}
        }
    }

    let percent_changed = if compared > 0 {
        changed as f64 / compared as f64 * 100.0
    } else {
        0.0
    };
    let mean_abs_change = if changed > 0 {
        sum_change / changed as f64
    } else {
        0.0
    };

    MergeChangeReport {
        compared_cells: compared,
        changed_cells: changed,
        percent_changed,
        max_change,
        mean_abs_change,
        newly_valid_cells: newly_valid,
        effective: changed >= params.min_changed_cells && mean_abs_change >= params.min_mean_change,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridGeometry;

    #[test]
    fn test_counts_changed_cells() {
        let g = GridGeometry::new(0.0, 20.0, 1.0, 1.0, 20, 20).unwrap();
        let before = TerrainGrid::filled(g, 100.0);
        let after = TerrainGrid::from_fn(g, |row, _| Some(if row < 6 { 101.5 } else { 100.0 }));

        let report = compare(&before, &after, &VerifyParams::default(), &Tolerance::default());
        assert_eq!(report.compared_cells, 400);
        assert_eq!(report.changed_cells, 120);
        assert!((report.percent_changed - 30.0).abs() < 1e-12);
        assert!((report.max_change - 1.5).abs() < 1e-12);
        assert!((report.mean_abs_change - 1.5).abs() < 1e-12);
        assert!(report.effective);
    }

    #[test]
    fn test_unchanged_is_ineffective() {
        let g = GridGeometry::new(0.0, 5.0, 1.0, 1.0, 5, 5).unwrap();
        let grid = TerrainGrid::filled(g, 10.0);
        let report = compare(&grid, &grid, &VerifyParams::default(), &Tolerance::default());
        assert_eq!(report.changed_cells, 0);
        assert!(!report.effective);
    }

    #[test]
    fn test_newly_valid_cells() {
        let g = GridGeometry::new(0.0, 2.0, 1.0, 1.0, 2, 2).unwrap();
        let before = TerrainGrid::from_fn(g, |row, _| (row == 0).then_some(1.0));
        let after = TerrainGrid::filled(g, 1.0);
        let report = compare(&before, &after, &VerifyParams::default(), &Tolerance::default());
        assert_eq!(report.newly_valid_cells, 2);
        assert_eq!(report.changed_cells, 0);
    }
}
