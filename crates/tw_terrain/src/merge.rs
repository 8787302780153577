// crates/tw_terrain/src/merge.rs

//! 斜坡投影融合
//!
//! 将测量面并入累积面时不做硬覆盖，而是在测量面周围的过渡带内
//! 按坡比投影出一圈"裙边"：
//!
//! 1. `valid_patch`：patch 对齐到 base 栅格后的有效单元
//! 2. 每个单元到最近 `valid_patch` 单元的距离 d 及其高程 `z_ref_patch`
//! 3. 每个单元最近的 base 有效单元高程 `z_ref_base`
//! 4. `z_ref_base > z_ref_patch` 为挖方过渡（方向 +1），否则为填方过渡（方向 −1）
//! 5. `z_proj = z_ref_patch + 方向 × d / slope_ratio`，仅在 `0 < d ≤ transition_distance` 内求值
//! 6. base 缺失处直接采用 `z_proj`；填方只在 `z_proj` 高于原值时覆盖，
//!    挖方只在 `z_proj` 低于原值时覆盖
//! 7. `valid_patch` 内逐单元写入 patch 原值
//!
//! 过渡带以外的单元与 base 逐位相同。
//!
//! 若 base 像素比 patch 粗超过容差，先将 base 双线性重采样到 patch 分辨率，
//! 之后该构筑物的累积面一直保持较细分辨率。

use crate::distance::DistanceField;
use crate::error::{TerrainError, TerrainResult};
use crate::grid::TerrainGrid;
use crate::interpolation::InterpolationMethod;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// 融合参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeParams {
    /// 坡比（水平/垂直），1.0 表示 45°
    pub slope_ratio: f64,
    /// 过渡带宽度 [m]
    pub transition_distance: f64,
    /// base 比 patch 粗多少（相对）时触发上采样
    pub resolution_tolerance: f64,
    /// patch 对齐到 base 栅格时的插值方法
    pub patch_resample: InterpolationMethod,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            slope_ratio: 1.0,
            transition_distance: 5.0,
            resolution_tolerance: 0.10,
            patch_resample: InterpolationMethod::Nearest,
        }
    }
}

/// 过渡方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionDirection {
    /// 填方：远离测量面时高程下降
    Fill,
    /// 挖方：远离测量面时高程上升
    Cut,
}

impl TransitionDirection {
    /// 符号（挖方 +1，填方 −1）
    pub fn sign(self) -> f64 {
        match self {
            Self::Fill => -1.0,
            Self::Cut => 1.0,
        }
    }
}

/// 分辨率协调记录
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionChange {
    /// 原像素尺寸 (宽, 高)
    pub from: (f64, f64),
    /// 新像素尺寸 (宽, 高)
    pub to: (f64, f64),
}

/// 融合报告
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    /// base 是否被上采样
    pub resolution_change: Option<ResolutionChange>,
    /// 写入 patch 原值的单元数
    pub patch_cells: usize,
    /// 过渡带内被裙边覆盖的单元数（含补洞）
    pub skirt_cells: usize,
    /// 其中 base 原本缺失、由裙边补上的单元数
    pub filled_holes: usize,
    /// 过渡带内判为填方的单元数
    pub fill_transitions: usize,
    /// 过渡带内判为挖方的单元数
    pub cut_transitions: usize,
}

impl MergeReport {
    /// 是否发生了分辨率上采样
    pub fn upsampled(&self) -> bool {
        self.resolution_change.is_some()
    }
}

/// 融合结果
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// 更新后的累积面
    pub grid: TerrainGrid,
    /// 报告
    pub report: MergeReport,
}

/// 斜坡投影融合器
#[derive(Debug, Clone, Default)]
pub struct SlopeProjectionMerger {
    params: MergeParams,
}

impl SlopeProjectionMerger {
    /// 创建融合器
    ///
    /// # Errors
    ///
    /// 坡比非正或过渡带宽度为负时返回错误。
    pub fn new(params: MergeParams) -> TerrainResult<Self> {
        TerrainError::check_positive("slope_ratio", params.slope_ratio)?;
        if !(params.transition_distance >= 0.0 && params.transition_distance.is_finite()) {
            return Err(TerrainError::invalid_parameter(
                "transition_distance",
                params.transition_distance,
                "必须为非负有限数",
            ));
        }
        if !(params.resolution_tolerance >= 0.0) {
            return Err(TerrainError::invalid_parameter(
                "resolution_tolerance",
                params.resolution_tolerance,
                "不得为负",
            ));
        }
        Ok(Self { params })
    }

    /// 参数
    pub fn params(&self) -> &MergeParams {
        &self.params
    }

    /// 将 patch 并入 base，返回新的累积面
    pub fn merge(&self, patch: &TerrainGrid, base: &TerrainGrid) -> TerrainResult<MergeOutcome> {
        let mut report = MergeReport::default();

        let work_base = if base
            .geometry()
            .coarser_than(patch.geometry(), self.params.resolution_tolerance)
        {
            let from = (base.geometry().pixel_width, base.geometry().pixel_height);
            let to = (patch.geometry().pixel_width, patch.geometry().pixel_height);
            info!(?from, ?to, "累积面分辨率低于测量面，双线性上采样");
            report.resolution_change = Some(ResolutionChange { from, to });
            base.resample(to.0, to.1, InterpolationMethod::Bilinear)?
        } else {
            base.clone()
        };

        let geometry = *work_base.geometry();
        let aligned_patch = patch.warp_to(&geometry, self.params.patch_resample);
        let valid_patch = aligned_patch.valid_mask();

        if !valid_patch.iter().any(|&v| v) {
            warn!("测量面在累积面范围内没有有效单元，累积面保持不变");
            return Ok(MergeOutcome {
                grid: work_base,
                report,
            });
        }

        let to_patch = DistanceField::compute(
            &valid_patch,
            geometry.width,
            geometry.height,
            geometry.pixel_width,
            geometry.pixel_height,
        )?;
        let to_base = DistanceField::compute(
            &work_base.valid_mask(),
            geometry.width,
            geometry.height,
            geometry.pixel_width,
            geometry.pixel_height,
        )?;

        let nodata = work_base.nodata();
        let mut data = work_base.data().to_vec();

        for (i, cell) in data.iter_mut().enumerate() {
            if valid_patch[i] {
                if let Some(z) = aligned_patch.get(i) {
                    *cell = z;
                    report.patch_cells += 1;
                }
                continue;
            }

            let d = to_patch.distance(i);
            if !(d > 0.0 && d <= self.params.transition_distance) {
                continue;
            }
            let Some(z_ref_patch) = to_patch.nearest(i).and_then(|j| aligned_patch.get(j)) else {
                continue;
            };
            let z_ref_base = to_base.nearest(i).and_then(|j| work_base.get(j));

            let direction = match z_ref_base {
                Some(zb) if zb > z_ref_patch => TransitionDirection::Cut,
                _ => TransitionDirection::Fill,
            };
            match direction {
                TransitionDirection::Fill => report.fill_transitions += 1,
                TransitionDirection::Cut => report.cut_transitions += 1,
            }

            let z_proj = z_ref_patch + direction.sign() * d / self.params.slope_ratio;
            let overwrite = match work_base.get(i) {
                None => {
                    report.filled_holes += 1;
                    true
                }
                Some(existing) => match direction {
                    TransitionDirection::Fill => z_proj > existing,
                    TransitionDirection::Cut => z_proj < existing,
                },
            };
            if overwrite {
                *cell = z_proj;
                report.skirt_cells += 1;
            }
        }

        debug!(
            patch_cells = report.patch_cells,
            skirt_cells = report.skirt_cells,
            filled_holes = report.filled_holes,
            "斜坡投影融合完成"
        );

        let grid = TerrainGrid::new(geometry, nodata, data)?.with_crs(work_base.crs().cloned());
        Ok(MergeOutcome { grid, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridGeometry, DEFAULT_NODATA};
    use tw_geo::Point2D;

    fn base_grid(value: f64) -> TerrainGrid {
        let g = GridGeometry::new(0.0, 20.0, 1.0, 1.0, 20, 20).unwrap();
        TerrainGrid::filled(g, value)
    }

    /// 4x4 m 测量面，位于 (8,8)-(12,12)
    fn patch_grid(value: f64) -> TerrainGrid {
        let g = GridGeometry::new(8.0, 12.0, 1.0, 1.0, 4, 4).unwrap();
        TerrainGrid::filled(g, value)
    }

    #[test]
    fn test_fill_ramp_builds_up_to_ground() {
        let merger = SlopeProjectionMerger::default();
        let out = merger.merge(&patch_grid(103.0), &base_grid(100.0)).unwrap();
        let g = out.grid;

        assert_eq!(g.sample(&Point2D::new(10.5, 10.5)), Some(103.0));
        // 距测量面 1 m：103 - 1 = 102
        assert_eq!(g.sample(&Point2D::new(12.5, 10.5)), Some(102.0));
        // 距 3 m：100，不高于原值，不覆盖
        assert_eq!(g.sample(&Point2D::new(14.5, 10.5)), Some(100.0));
        assert_eq!(out.report.patch_cells, 16);
        assert!(out.report.fill_transitions > 0);
        assert_eq!(out.report.cut_transitions, 0);
    }

    #[test]
    fn test_cut_ramp_excavates_to_ground() {
        let merger = SlopeProjectionMerger::default();
        let out = merger.merge(&patch_grid(97.0), &base_grid(100.0)).unwrap();
        let g = out.grid;
        assert_eq!(g.sample(&Point2D::new(12.5, 10.5)), Some(98.0));
        assert_eq!(g.sample(&Point2D::new(13.5, 10.5)), Some(99.0));
        assert_eq!(g.sample(&Point2D::new(14.5, 10.5)), Some(100.0));
        assert!(out.report.cut_transitions > 0);
    }

    #[test]
    fn test_holes_in_band_are_filled() {
        let g = GridGeometry::new(0.0, 20.0, 1.0, 1.0, 20, 20).unwrap();
        let base = TerrainGrid::from_fn(g, |row, _| (row < 10).then_some(100.0));
        let out = SlopeProjectionMerger::default()
            .merge(&patch_grid(101.0), &base)
            .unwrap();
        // 南侧 base 缺失，过渡带内由投影补齐
        assert_eq!(out.grid.sample(&Point2D::new(10.5, 6.5)), Some(99.0));
        // 过渡带外仍缺失
        assert_eq!(out.grid.sample(&Point2D::new(10.5, 0.5)), None);
        assert!(out.report.filled_holes > 0);
    }

    #[test]
    fn test_outside_band_unchanged() {
        let base = TerrainGrid::from_fn(
            GridGeometry::new(0.0, 20.0, 1.0, 1.0, 20, 20).unwrap(),
            |row, col| Some(90.0 + (row * 20 + col) as f64 * 0.01),
        );
        let out = SlopeProjectionMerger::default()
            .merge(&patch_grid(120.0), &base)
            .unwrap();
        assert_eq!(out.grid.value(0, 0), base.value(0, 0));
        assert_eq!(out.grid.value(19, 19), base.value(19, 19));
    }

    #[test]
    fn test_base_upsampled_to_patch_resolution() {
        let fine = GridGeometry::new(8.0, 12.0, 0.5, 0.5, 8, 8).unwrap();
        let patch = TerrainGrid::filled(fine, 101.0);
        let out = SlopeProjectionMerger::default()
            .merge(&patch, &base_grid(100.0))
            .unwrap();
        assert!(out.report.upsampled());
        assert_eq!(out.grid.geometry().pixel_width, 0.5);
        assert_eq!((out.grid.width(), out.grid.height()), (40, 40));
    }

    #[test]
    fn test_offset_patch_keeps_its_footprint() {
        // 1 m 测量面错开半个细单元，对齐到 0.5 m 累积面后仍为 4x4 m = 64 个细单元
        let g = GridGeometry::new(0.0, 20.0, 0.5, 0.5, 40, 40).unwrap();
        let base = TerrainGrid::filled(g, 100.0);
        let offset = GridGeometry::new(8.25, 12.25, 1.0, 1.0, 4, 4).unwrap();
        let patch = TerrainGrid::filled(offset, 102.0);

        for method in [InterpolationMethod::Nearest, InterpolationMethod::Bilinear] {
            let merger = SlopeProjectionMerger::new(MergeParams {
                patch_resample: method,
                ..Default::default()
            })
            .unwrap();
            let out = merger.merge(&patch, &base).unwrap();
            assert!(!out.report.upsampled());
            assert_eq!(out.report.patch_cells, 64, "{}", method.name());
            // 东边界上的细单元中心 12.25 距测量面 0.5 m，属于过渡带
            assert_eq!(out.grid.sample(&Point2D::new(12.25, 10.25)), Some(101.5));
        }
    }

    #[test]
    fn test_empty_patch_leaves_base() {
        let patch = TerrainGrid::empty(patch_grid(0.0).geometry().to_owned());
        let base = base_grid(100.0);
        let out = SlopeProjectionMerger::default().merge(&patch, &base).unwrap();
        assert_eq!(out.grid, base);
        assert_eq!(out.report.patch_cells, 0);
        assert_eq!(DEFAULT_NODATA, out.grid.nodata());
    }

    #[test]
    fn test_invalid_params() {
        let params = MergeParams {
            slope_ratio: 0.0,
            ..Default::default()
        };
        assert!(SlopeProjectionMerger::new(params).is_err());
    }
}
