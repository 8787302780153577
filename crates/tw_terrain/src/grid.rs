// crates/tw_terrain/src/grid.rs

//! 地形栅格
//!
//! `TerrainGrid` 是值类型：所有变换（重采样、裁剪、融合）都返回新栅格，
//! 原栅格保持不变。单元 (row, col) 按行主序存储，第 0 行位于北侧（顶部）。
//!
//! 等于无数据值或非有限的单元视为"缺失"，不参与任何统计。
//!
//! # 示例
//!
//! ```
//! use tw_terrain::grid::{GridGeometry, TerrainGrid};
//! use tw_geo::Point2D;
//!
//! let geometry = GridGeometry::new(0.0, 10.0, 1.0, 1.0, 10, 10).unwrap();
//! let grid = TerrainGrid::filled(geometry, 100.0);
//!
//! assert_eq!(grid.sample(&Point2D::new(2.5, 7.5)), Some(100.0));
//! assert_eq!(grid.sample(&Point2D::new(-1.0, 5.0)), None);
//! ```

use crate::error::{TerrainError, TerrainResult};
use crate::interpolation::{self, InterpolationMethod};
use serde::{Deserialize, Serialize};
use tw_geo::{BoundingBox, CrsDefinition, Point2D, Polygon};

/// 默认无数据值
pub const DEFAULT_NODATA: f64 = -9999.0;

/// 无数据值比较容差
const NODATA_EPS: f64 = 1e-10;

// ============================================================================
// GridGeometry
// ============================================================================

/// 栅格几何（北向上、无旋转）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    /// 左上角 x 坐标
    pub origin_x: f64,
    /// 左上角 y 坐标
    pub origin_y: f64,
    /// 像素宽度 [m]
    pub pixel_width: f64,
    /// 像素高度 [m]（正值，向南递增行号）
    pub pixel_height: f64,
    /// 列数
    pub width: usize,
    /// 行数
    pub height: usize,
}

impl GridGeometry {
    /// 创建栅格几何
    ///
    /// # Errors
    ///
    /// 像素尺寸非有限正数、原点非有限、行列数为零或单元数溢出时返回错误。
    pub fn new(
        origin_x: f64,
        origin_y: f64,
        pixel_width: f64,
        pixel_height: f64,
        width: usize,
        height: usize,
    ) -> TerrainResult<Self> {
        if !(origin_x.is_finite() && origin_y.is_finite()) {
            return Err(TerrainError::invalid_geometry(format!(
                "原点非有限: ({origin_x}, {origin_y})"
            )));
        }
        if !(pixel_width.is_finite() && pixel_width > 0.0)
            || !(pixel_height.is_finite() && pixel_height > 0.0)
        {
            return Err(TerrainError::invalid_geometry(format!(
                "像素尺寸必须为正: {pixel_width} x {pixel_height}"
            )));
        }
        if width == 0 || height == 0 {
            return Err(TerrainError::invalid_geometry(format!(
                "尺寸为零: {width} x {height}"
            )));
        }
        if width.checked_mul(height).is_none() {
            return Err(TerrainError::invalid_geometry(format!(
                "单元数溢出: {width} x {height}"
            )));
        }
        Ok(Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            width,
            height,
        })
    }

    /// 单元总数
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// 单元面积 [m²]
    #[inline]
    pub fn cell_area(&self) -> f64 {
        self.pixel_width * self.pixel_height
    }

    /// 行主序索引
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    /// 索引转 (row, col)
    #[inline]
    pub fn row_col(&self, index: usize) -> (usize, usize) {
        (index / self.width, index % self.width)
    }

    /// 最东 x
    #[inline]
    pub fn max_x(&self) -> f64 {
        self.origin_x + self.pixel_width * self.width as f64
    }

    /// 最南 y
    #[inline]
    pub fn min_y(&self) -> f64 {
        self.origin_y - self.pixel_height * self.height as f64
    }

    /// 栅格范围
    pub fn extent(&self) -> BoundingBox {
        BoundingBox::new(self.origin_x, self.min_y(), self.max_x(), self.origin_y)
    }

    /// 单元中心坐标
    #[inline]
    pub fn cell_center(&self, row: usize, col: usize) -> Point2D {
        Point2D::new(
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y - (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// 世界坐标转连续像素坐标 (col, row)，单元 (0,0) 覆盖 [0,1)×[0,1)
    #[inline]
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (self.origin_y - y) / self.pixel_height,
        )
    }

    /// 包含该点的单元 (row, col)；范围外返回 `None`
    ///
    /// 东、南边界上的点归入最后一列/行，用于点取值。重采样用 [`Self::cell_at`]。
    pub fn locate(&self, point: &Point2D) -> Option<(usize, usize)> {
        let (fc, fr) = self.world_to_pixel(point.x, point.y);
        if !(fc.is_finite() && fr.is_finite()) {
            return None;
        }
        if fc < 0.0 || fr < 0.0 || fc > self.width as f64 || fr > self.height as f64 {
            return None;
        }
        let col = (fc.floor() as usize).min(self.width - 1);
        let row = (fr.floor() as usize).min(self.height - 1);
        Some((row, col))
    }

    /// 半开区间 `[0, width) × [0, height)` 内包含该点的单元 (row, col)
    ///
    /// 东、南边界不属于栅格，相邻栅格的公共边只归入一侧。
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (fc, fr) = self.world_to_pixel(x, y);
        if !(fc >= 0.0 && fr >= 0.0 && fc < self.width as f64 && fr < self.height as f64) {
            return None;
        }
        Some((fr as usize, fc as usize))
    }

    /// 覆盖相同范围、指定像素尺寸的新几何
    ///
    /// 原点不变；行列数取覆盖原范围所需的最小整数。
    pub fn with_resolution(&self, pixel_width: f64, pixel_height: f64) -> TerrainResult<Self> {
        TerrainError::check_positive("pixel_width", pixel_width)?;
        TerrainError::check_positive("pixel_height", pixel_height)?;
        let extent = self.extent();
        Self::new(
            self.origin_x,
            self.origin_y,
            pixel_width,
            pixel_height,
            cells_to_cover(extent.width(), pixel_width),
            cells_to_cover(extent.height(), pixel_height),
        )
    }

    /// 本几何的像素是否比 `finer` 粗超过 `tolerance`（如 0.10 表示 10%）
    pub fn coarser_than(&self, finer: &Self, tolerance: f64) -> bool {
        self.pixel_width > finer.pixel_width * (1.0 + tolerance)
            || self.pixel_height > finer.pixel_height * (1.0 + tolerance)
    }
}

/// 覆盖长度 `extent` 所需的单元数（近整数时不多加一格）
fn cells_to_cover(extent: f64, size: f64) -> usize {
    let n = extent / size;
    let n = if (n - n.round()).abs() < 1e-6 {
        n.round()
    } else {
        n.ceil()
    };
    (n as usize).max(1)
}

// ============================================================================
// GridStatistics
// ============================================================================

/// 栅格统计量（仅统计有效且满足谓词的单元）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridStatistics {
    /// 单元数
    pub count: usize,
    /// 最小值
    pub min: f64,
    /// 最大值
    pub max: f64,
    /// 总和
    pub sum: f64,
    /// 均值
    pub mean: f64,
}

impl GridStatistics {
    fn from_values(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
        for v in values {
            count += 1;
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        (count > 0).then(|| Self {
            count,
            min,
            max,
            sum,
            mean: sum / count as f64,
        })
    }
}

// ============================================================================
// TerrainGrid
// ============================================================================

/// 地形高程栅格
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainGrid {
    geometry: GridGeometry,
    nodata: f64,
    data: Vec<f64>,
    crs: Option<CrsDefinition>,
}

impl TerrainGrid {
    /// 从高程缓冲区创建
    ///
    /// # Errors
    ///
    /// 缓冲区长度不等于 W×H 时返回 [`TerrainError::BufferSizeMismatch`]。
    pub fn new(geometry: GridGeometry, nodata: f64, data: Vec<f64>) -> TerrainResult<Self> {
        if data.len() != geometry.cell_count() {
            return Err(TerrainError::BufferSizeMismatch {
                expected: geometry.cell_count(),
                actual: data.len(),
            });
        }
        Ok(Self {
            geometry,
            nodata,
            data,
            crs: None,
        })
    }

    /// 常值栅格
    pub fn filled(geometry: GridGeometry, value: f64) -> Self {
        Self {
            geometry,
            nodata: DEFAULT_NODATA,
            data: vec![value; geometry.cell_count()],
            crs: None,
        }
    }

    /// 全缺失栅格
    pub fn empty(geometry: GridGeometry) -> Self {
        Self::filled(geometry, DEFAULT_NODATA)
    }

    /// 由单元函数生成；返回 `None` 的单元为缺失
    pub fn from_fn(geometry: GridGeometry, mut f: impl FnMut(usize, usize) -> Option<f64>) -> Self {
        let mut data = Vec::with_capacity(geometry.cell_count());
        for row in 0..geometry.height {
            for col in 0..geometry.width {
                data.push(f(row, col).unwrap_or(DEFAULT_NODATA));
            }
        }
        Self {
            geometry,
            nodata: DEFAULT_NODATA,
            data,
            crs: None,
        }
    }

    /// 附加 CRS
    #[must_use]
    pub fn with_crs(mut self, crs: Option<CrsDefinition>) -> Self {
        self.crs = crs;
        self
    }

    /// 设置 CRS
    pub fn set_crs(&mut self, crs: Option<CrsDefinition>) {
        self.crs = crs;
    }

    /// CRS
    pub fn crs(&self) -> Option<&CrsDefinition> {
        self.crs.as_ref()
    }

    /// 几何
    #[inline]
    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// 无数据值
    #[inline]
    pub fn nodata(&self) -> f64 {
        self.nodata
    }

    /// 原始缓冲区（含无数据值）
    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// 列数
    #[inline]
    pub fn width(&self) -> usize {
        self.geometry.width
    }

    /// 行数
    #[inline]
    pub fn height(&self) -> usize {
        self.geometry.height
    }

    /// 判断是否为无数据
    #[inline]
    pub fn is_nodata(&self, value: f64) -> bool {
        !value.is_finite() || (self.nodata.is_finite() && (value - self.nodata).abs() < NODATA_EPS)
    }

    /// 按索引取有效值
    #[inline]
    pub fn get(&self, index: usize) -> Option<f64> {
        let v = *self.data.get(index)?;
        (!self.is_nodata(v)).then_some(v)
    }

    /// 按 (row, col) 取有效值
    #[inline]
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.geometry.height && col < self.geometry.width {
            self.get(self.geometry.index(row, col))
        } else {
            None
        }
    }

    /// 有效单元掩膜
    pub fn valid_mask(&self) -> Vec<bool> {
        self.data.iter().map(|&v| !self.is_nodata(v)).collect()
    }

    /// 有效单元数
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| !self.is_nodata(v)).count()
    }

    /// 最近单元取值；范围外或缺失返回 `None`
    pub fn sample(&self, point: &Point2D) -> Option<f64> {
        let (row, col) = self.geometry.locate(point)?;
        self.value(row, col)
    }

    /// 重采样到新的像素尺寸（覆盖相同范围）
    ///
    /// 缺失单元不参与插值，也不会污染邻近单元。
    pub fn resample(
        &self,
        pixel_width: f64,
        pixel_height: f64,
        method: InterpolationMethod,
    ) -> TerrainResult<Self> {
        let target = self.geometry.with_resolution(pixel_width, pixel_height)?;
        Ok(self.warp_to(&target, method))
    }

    /// 重采样到指定几何
    pub fn warp_to(&self, target: &GridGeometry, method: InterpolationMethod) -> Self {
        if *target == self.geometry {
            return self.clone();
        }
        let data = interpolation::resample(self, target, method);
        Self {
            geometry: *target,
            nodata: self.nodata,
            data,
            crs: self.crs.clone(),
        }
    }

    /// 以单元中心裁剪到多边形内；多边形外的单元变为缺失
    pub fn mask(&self, polygon: &Polygon) -> Self {
        let bbox = polygon.bbox();
        let mut out = self.clone();
        for (i, v) in out.data.iter_mut().enumerate() {
            let (row, col) = self.geometry.row_col(i);
            let center = self.geometry.cell_center(row, col);
            if !bbox.contains_point(&center) || !polygon.contains(&center) {
                *v = self.nodata;
            }
        }
        out
    }

    /// 对有效且满足谓词的单元求统计量；无此类单元时返回 `None`
    pub fn statistics(&self, predicate: impl Fn(f64) -> bool) -> Option<GridStatistics> {
        GridStatistics::from_values(
            self.data
                .iter()
                .copied()
                .filter(|&v| !self.is_nodata(v) && predicate(v)),
        )
    }
}
