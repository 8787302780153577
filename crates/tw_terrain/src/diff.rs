// crates/tw_terrain/src/diff.rs

//! 体积差分计算
//!
//! 将测量面（patch）与当前累积面（base）对齐到 patch 的栅格，
//! 逐单元求差并裁剪到足迹，得到填方、挖方、平均厚度与经离群值过滤的
//! 厚度上下限。
//!
//! 体积始终由**未经过滤**的差值求和：百分位过滤与绝对上限只影响
//! 报告的最小/最大厚度。因此恒有 `fill - cut == Σ diff × cell_area`。

use crate::error::{TerrainError, TerrainResult};
use crate::grid::TerrainGrid;
use crate::interpolation::InterpolationMethod;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tw_geo::Polygon;

/// 差分参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiffParams {
    /// 厚度下限 [m]
    pub min_thickness_floor: f64,
    /// 是否启用百分位过滤
    pub filter_outliers: bool,
    /// 下百分位 [0, 100]
    pub percentile_low: f64,
    /// 上百分位 [0, 100]
    pub percentile_high: f64,
    /// 可选的绝对厚度上限 [m]
    pub abs_cap: Option<f64>,
    /// 启用过滤所需的最少样本数
    pub min_filter_samples: usize,
    /// base 像素比 patch 粗多少（相对）时改用双线性对齐
    pub resolution_tolerance: f64,
}

impl Default for DiffParams {
    fn default() -> Self {
        Self {
            min_thickness_floor: 0.001,
            filter_outliers: true,
            percentile_low: 2.0,
            percentile_high: 98.0,
            abs_cap: None,
            min_filter_samples: 10,
            resolution_tolerance: 0.10,
        }
    }
}

/// 差分结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    /// 差值栅格 (patch − base)，足迹外为缺失；空结果时为 `None`
    #[serde(skip)]
    pub diff: Option<TerrainGrid>,
    /// 填方体积 [m³]
    pub fill_volume: f64,
    /// 挖方体积 [m³]
    pub cut_volume: f64,
    /// 平均厚度 = 净体积 / 分析面积 [m]
    pub mean_thickness: f64,
    /// 最小厚度 [m]
    pub min_thickness: Option<f64>,
    /// 最大厚度 [m]
    pub max_thickness: Option<f64>,
    /// 参与计算的有效单元数
    pub valid_cells: usize,
    /// 单元面积 [m²]
    pub cell_area: f64,
    /// 低于下百分位被丢弃的样本数
    pub low_outliers: usize,
    /// 高于上百分位或上限被丢弃的样本数
    pub high_outliers: usize,
    /// 厚度上下限是否经过过滤
    pub filtered: bool,
}

impl DiffResult {
    /// 空结果（数据不足时由调用方记录）
    pub fn empty() -> Self {
        Self {
            diff: None,
            fill_volume: 0.0,
            cut_volume: 0.0,
            mean_thickness: 0.0,
            min_thickness: None,
            max_thickness: None,
            valid_cells: 0,
            cell_area: 0.0,
            low_outliers: 0,
            high_outliers: 0,
            filtered: false,
        }
    }

    /// 净体积 [m³]
    pub fn net_volume(&self) -> f64 {
        self.fill_volume - self.cut_volume
    }

    /// 分析面积 [m²]
    pub fn analyzed_area(&self) -> f64 {
        self.valid_cells as f64 * self.cell_area
    }
}

/// 体积差分计算器
#[derive(Debug, Clone, Default)]
pub struct VolumeDiffCalculator {
    params: DiffParams,
}

impl VolumeDiffCalculator {
    /// 创建计算器
    ///
    /// # Errors
    ///
    /// 百分位不在 [0, 100] 或下百分位大于上百分位、下限为负、上限非正时返回错误。
    pub fn new(params: DiffParams) -> TerrainResult<Self> {
        for (name, p) in [
            ("percentile_low", params.percentile_low),
            ("percentile_high", params.percentile_high),
        ] {
            if !(0.0..=100.0).contains(&p) {
                return Err(TerrainError::invalid_parameter(name, p, "百分位须在 [0, 100] 内"));
            }
        }
        if params.percentile_low > params.percentile_high {
            return Err(TerrainError::invalid_parameter(
                "percentile_low",
                params.percentile_low,
                "不得大于 percentile_high",
            ));
        }
        if !(params.min_thickness_floor >= 0.0) {
            return Err(TerrainError::invalid_parameter(
                "min_thickness_floor",
                params.min_thickness_floor,
                "不得为负",
            ));
        }
        if let Some(cap) = params.abs_cap {
            TerrainError::check_positive("abs_cap", cap)?;
        }
        Ok(Self { params })
    }

    /// 参数
    pub fn params(&self) -> &DiffParams {
        &self.params
    }

    /// 计算 patch 相对 base 的差分
    ///
    /// # Errors
    ///
    /// 足迹内没有 patch 与 base 同时有效的单元时返回
    /// [`TerrainError::InsufficientData`]，调用方应记录 [`DiffResult::empty`] 并继续。
    pub fn compute(
        &self,
        patch: &TerrainGrid,
        base: &TerrainGrid,
        footprint: &Polygon,
    ) -> TerrainResult<DiffResult> {
        let geometry = *patch.geometry();
        let method = if base
            .geometry()
            .coarser_than(&geometry, self.params.resolution_tolerance)
        {
            InterpolationMethod::Bilinear
        } else {
            InterpolationMethod::Nearest
        };
        let aligned_base = base.warp_to(&geometry, method);

        let diff_grid = TerrainGrid::from_fn(geometry, |row, col| {
            let p = patch.value(row, col)?;
            let b = aligned_base.value(row, col)?;
            Some(p - b)
        })
        .with_crs(patch.crs().cloned())
        .mask(footprint);

        let cell_area = geometry.cell_area();
        let values: Vec<f64> = diff_grid
            .data()
            .iter()
            .copied()
            .filter(|&v| !diff_grid.is_nodata(v))
            .collect();

        if values.is_empty() {
            return Err(TerrainError::insufficient_data(
                "足迹内没有测量面与基准面同时有效的单元",
            ));
        }

        let fill: f64 = values.iter().filter(|&&v| v > 0.0).sum::<f64>() * cell_area;
        let cut: f64 = -values.iter().filter(|&&v| v < 0.0).sum::<f64>() * cell_area;
        let analyzed_area = values.len() as f64 * cell_area;
        let mean_thickness = (fill - cut) / analyzed_area;

        let bounds = self.thickness_bounds(&values);
        debug!(
            valid_cells = values.len(),
            fill,
            cut,
            mean_thickness,
            filtered = bounds.filtered,
            "体积差分完成"
        );

        Ok(DiffResult {
            diff: Some(diff_grid),
            fill_volume: fill,
            cut_volume: cut,
            mean_thickness,
            min_thickness: bounds.min,
            max_thickness: bounds.max,
            valid_cells: values.len(),
            cell_area,
            low_outliers: bounds.low_outliers,
            high_outliers: bounds.high_outliers,
            filtered: bounds.filtered,
        })
    }

    /// 厚度上下限：|diff| 的非零样本，可选百分位与上限过滤，最后施加下限
    fn thickness_bounds(&self, values: &[f64]) -> ThicknessBounds {
        let floor = self.params.min_thickness_floor;
        let mut samples: Vec<f64> = values
            .iter()
            .filter(|&&v| v != 0.0)
            .map(|v| v.abs())
            .collect();
        if samples.is_empty() {
            return ThicknessBounds::default();
        }
        samples.sort_by(f64::total_cmp);

        if !self.params.filter_outliers || samples.len() < self.params.min_filter_samples {
            return ThicknessBounds {
                min: Some(samples[0].max(floor)),
                max: Some(samples[samples.len() - 1].max(floor)),
                ..Default::default()
            };
        }

        let lo = percentile(&samples, self.params.percentile_low);
        let hi = percentile(&samples, self.params.percentile_high);
        let upper = match self.params.abs_cap {
            Some(cap) => hi.min(cap),
            None => hi,
        };

        let low_outliers = samples.iter().filter(|&&v| v < lo).count();
        let high_outliers = samples.iter().filter(|&&v| v > upper && v >= lo).count();
        let mut kept = samples.iter().copied().filter(|&v| v >= lo && v <= upper);
        let first = kept.next();
        let last = kept.last().or(first);

        ThicknessBounds {
            min: first.map(|v| v.max(floor)),
            max: last.map(|v| v.max(floor)),
            low_outliers,
            high_outliers,
            filtered: true,
        }
    }
}

#[derive(Debug, Default)]
struct ThicknessBounds {
    min: Option<f64>,
    max: Option<f64>,
    low_outliers: usize,
    high_outliers: usize,
    filtered: bool,
}

/// 线性插值百分位（已排序样本）
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}
