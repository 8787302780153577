// crates/tw_terrain/src/interpolation.rs

//! 栅格重采样
//!
//! 将源栅格插值到目标几何的单元中心。每个目标单元先计算一组
//! (源索引, 权重)，再按无数据规则合成：
//!
//! - 缺失的源单元被跳过，其余权重重新归一化
//! - 有缺失参与且剩余权重之和小于 0.5 时，目标单元为缺失
//! - 目标中心落在源范围外时，目标单元为缺失
//!
//! 双线性窗口越过源栅格边缘时退回最近邻。

use crate::grid::{GridGeometry, TerrainGrid};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// 插值方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// 最近邻（包含目标中心的源单元）
    Nearest,
    /// 双线性
    #[default]
    Bilinear,
}

impl InterpolationMethod {
    /// 获取方法名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
        }
    }

    /// 并行阈值（目标单元数）
    pub fn parallel_threshold(&self) -> usize {
        match self {
            Self::Nearest => 40_000,
            Self::Bilinear => 10_000,
        }
    }
}

/// 插值权重
#[derive(Debug, Clone, Copy)]
struct Weight {
    src_idx: usize,
    val: f64,
}

/// 将 `source` 重采样到 `target`，返回目标缓冲区（缺失单元写入源无数据值）
pub(crate) fn resample(
    source: &TerrainGrid,
    target: &GridGeometry,
    method: InterpolationMethod,
) -> Vec<f64> {
    let mut output = vec![source.nodata(); target.cell_count()];
    let width = target.width;

    let fill_row = |(row, out_row): (usize, &mut [f64])| {
        let mut weights = Vec::with_capacity(4);
        for (col, out) in out_row.iter_mut().enumerate() {
            let center = target.cell_center(row, col);
            weights.clear();
            point_weights(source.geometry(), center.x, center.y, method, &mut weights);
            if let Some(v) = combine(source, &weights) {
                *out = v;
            }
        }
    };

    if target.cell_count() >= method.parallel_threshold() {
        output.par_chunks_mut(width).enumerate().for_each(fill_row);
    } else {
        output.chunks_mut(width).enumerate().for_each(fill_row);
    }
    output
}

fn point_weights(
    src: &GridGeometry,
    x: f64,
    y: f64,
    method: InterpolationMethod,
    weights: &mut Vec<Weight>,
) {
    match method {
        InterpolationMethod::Nearest => nearest_weights(src, x, y, weights),
        InterpolationMethod::Bilinear => bilinear_weights(src, x, y, weights),
    }
}

/// 最近邻权重
///
/// 源范围按半开区间判定，落在东、南边界上的目标中心不取值。
fn nearest_weights(src: &GridGeometry, x: f64, y: f64, weights: &mut Vec<Weight>) {
    if let Some((row, col)) = src.cell_at(x, y) {
        weights.push(Weight {
            src_idx: src.index(row, col),
            val: 1.0,
        });
    }
}

/// 双线性权重（以源单元中心为节点）
fn bilinear_weights(src: &GridGeometry, x: f64, y: f64, weights: &mut Vec<Weight>) {
    let (fc, fr) = src.world_to_pixel(x, y);
    let (px, py) = (fc - 0.5, fr - 0.5);
    let x0 = px.floor() as isize;
    let y0 = py.floor() as isize;
    let x1 = x0 + 1;
    let y1 = y0 + 1;

    if x0 < 0 || y0 < 0 || x1 >= src.width as isize || y1 >= src.height as isize {
        nearest_weights(src, x, y, weights);
        return;
    }

    let dx = px - x0 as f64;
    let dy = py - y0 as f64;
    let (x0, y0, x1, y1) = (x0 as usize, y0 as usize, x1 as usize, y1 as usize);

    weights.extend_from_slice(&[
        Weight { src_idx: src.index(y0, x0), val: (1.0 - dx) * (1.0 - dy) },
        Weight { src_idx: src.index(y0, x1), val: dx * (1.0 - dy) },
        Weight { src_idx: src.index(y1, x0), val: (1.0 - dx) * dy },
        Weight { src_idx: src.index(y1, x1), val: dx * dy },
    ]);
}

/// 按无数据规则合成
fn combine(source: &TerrainGrid, weights: &[Weight]) -> Option<f64> {
    let mut sum = 0.0;
    let mut weight_sum = 0.0;
    let mut has_nodata = false;

    for w in weights {
        match source.get(w.src_idx) {
            Some(val) => {
                sum += val * w.val;
                weight_sum += w.val;
            }
            None => has_nodata = true,
        }
    }

    if weight_sum.abs() < 1e-10 || has_nodata && weight_sum < 0.5 {
        None
    } else {
        Some(sum / weight_sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::DEFAULT_NODATA;
    use tw_geo::Point2D;

    /// 4x4 栅格，值 = col + row * 10，像素 10 m
    fn create_test_grid() -> TerrainGrid {
        let geometry = GridGeometry::new(0.0, 40.0, 10.0, 10.0, 4, 4).unwrap();
        TerrainGrid::from_fn(geometry, |row, col| Some((col + row * 10) as f64))
    }

    #[test]
    fn test_nearest_neighbor() {
        let grid = create_test_grid();
        // (14, 26) 落在 (row 1, col 1) = 11
        let target = GridGeometry::new(13.0, 27.0, 2.0, 2.0, 1, 1).unwrap();
        let out = grid.warp_to(&target, InterpolationMethod::Nearest);
        assert!((out.data()[0] - 11.0).abs() < 1e-10);
    }

    #[test]
    fn test_bilinear_between_centers() {
        let grid = create_test_grid();
        // (10, 30) 位于 (0,0),(0,1),(1,0),(1,1) 四个中心正中
        let target = GridGeometry::new(9.0, 31.0, 2.0, 2.0, 1, 1).unwrap();
        let out = grid.warp_to(&target, InterpolationMethod::Bilinear);
        assert!((out.data()[0] - 5.5).abs() < 1e-10);
    }

    #[test]
    fn test_nodata_does_not_contaminate() {
        let geometry = GridGeometry::new(0.0, 2.0, 1.0, 1.0, 2, 2).unwrap();
        let grid = TerrainGrid::new(
            geometry,
            DEFAULT_NODATA,
            vec![10.0, 10.0, 10.0, DEFAULT_NODATA],
        )
        .unwrap();

        let fine = grid.resample(0.5, 0.5, InterpolationMethod::Bilinear).unwrap();
        assert_eq!(fine.width(), 4);
        // 有效值全为 10，重新归一化后不应出现被 -9999 拉低的值
        let stats = fine.statistics(|_| true).unwrap();
        assert!((stats.min - 10.0).abs() < 1e-10);
        assert!((stats.max - 10.0).abs() < 1e-10);
        // 缺失单元所在象限仍为缺失
        assert_eq!(fine.sample(&Point2D::new(1.75, 0.25)), None);
    }

    #[test]
    fn test_outside_source_is_absent() {
        let grid = create_test_grid();
        let target = GridGeometry::new(100.0, 100.0, 1.0, 1.0, 2, 2).unwrap();
        let out = grid.warp_to(&target, InterpolationMethod::Bilinear);
        assert_eq!(out.valid_count(), 0);
    }

    #[test]
    fn test_method_serde_names() {
        let json = serde_json::to_string(&InterpolationMethod::Nearest).unwrap();
        assert_eq!(json, "\"nearest\"");
        assert_eq!(InterpolationMethod::Bilinear.name(), "bilinear");
    }
}
