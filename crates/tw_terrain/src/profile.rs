// crates/tw_terrain/src/profile.rs

//! 剖面采样
//!
//! 沿足迹的代表性横断线对多个栅格采样，得到可对比的高程序列。
//!
//! # 横断线选取
//!
//! 取足迹的四个极值顶点（最西 W、最东 E、最北 N、最南 S），
//! 有三种把它们两两配对的方式：{W–E, N–S}、{W–N, E–S}、{W–S, N–E}。
//! 取两条配对线段平均长度最小的那种，横断线连接这两条线段的中点，
//! 近似构筑物的长轴。起点取较西（同经度时较南）的中点。
//! 若足迹带有预先计算的中心线，则改用中心线并按弧长采样。

use crate::error::{TerrainError, TerrainResult};
use crate::grid::TerrainGrid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tw_geo::{Point2D, Polygon, Polyline};

/// 剖面中的栅格角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProfileRole {
    /// 原始地形
    Original,
    /// 本次测量之前的累积面
    Baseline,
    /// 被本次测量取代的前序测量
    Superseded,
    /// 本次测量
    Survey,
}

impl ProfileRole {
    /// 列名
    pub fn label(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Baseline => "baseline",
            Self::Superseded => "superseded",
            Self::Survey => "survey",
        }
    }
}

/// 剖面采样参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileParams {
    /// 采样点数
    pub n_points: usize,
    /// 首个保留点距起点超过横断线长度的该比例时标记稀疏
    pub sparse_start_fraction: f64,
}

impl Default for ProfileParams {
    fn default() -> Self {
        Self {
            n_points: 200,
            sparse_start_fraction: 0.1,
        }
    }
}

/// 剖面序列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSeries {
    /// 距离（从 0 开始）[m]
    pub distances: Vec<f64>,
    /// 各角色的高程
    pub elevations: BTreeMap<ProfileRole, Vec<f64>>,
    /// 横断线总长 [m]
    pub transect_length: f64,
    /// 覆盖稀疏标记
    pub sparse: bool,
}

impl ProfileSeries {
    /// 保留的点数
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

/// 剖面采样器
#[derive(Debug, Clone, Default)]
pub struct ProfileSampler {
    params: ProfileParams,
}

impl ProfileSampler {
    /// 创建采样器
    pub fn new(params: ProfileParams) -> TerrainResult<Self> {
        if params.n_points < 2 {
            return Err(TerrainError::invalid_parameter(
                "n_points",
                params.n_points as f64,
                "至少需要 2 个采样点",
            ));
        }
        if !(0.0..=1.0).contains(&params.sparse_start_fraction) {
            return Err(TerrainError::invalid_parameter(
                "sparse_start_fraction",
                params.sparse_start_fraction,
                "须在 [0, 1] 内",
            ));
        }
        Ok(Self { params })
    }

    /// 参数
    pub fn params(&self) -> &ProfileParams {
        &self.params
    }

    /// 足迹的代表性横断线
    ///
    /// # Errors
    ///
    /// 三种配对的中点都重合（横断线长度为零）时返回错误。
    pub fn transect(footprint: &Polygon) -> TerrainResult<Polyline> {
        let ext = footprint.extreme_vertices();
        let (w, e, n, s) = (ext.west, ext.east, ext.north, ext.south);

        let mut pairings = [
            ((w, e), (n, s)),
            ((w, n), (e, s)),
            ((w, s), (n, e)),
        ]
        .map(|(a, b)| {
            let avg = (a.0.distance_to(&a.1) + b.0.distance_to(&b.1)) / 2.0;
            (avg, a.0.midpoint(&a.1), b.0.midpoint(&b.1))
        });
        pairings.sort_by(|x, y| x.0.total_cmp(&y.0));

        for (_, m1, m2) in pairings {
            if m1.distance_to(&m2) > 0.0 {
                let (start, end) = if westerly_first(&m1, &m2) { (m1, m2) } else { (m2, m1) };
                return Ok(Polyline::segment(start, end)?);
            }
        }
        Err(TerrainError::insufficient_data("足迹无法确定横断线"))
    }

    /// 沿横断线（或中心线）对各栅格采样
    ///
    /// 任一栅格缺失的点被整体丢弃，以保持各序列的距离对齐。
    pub fn sample(
        &self,
        footprint: &Polygon,
        centerline: Option<&Polyline>,
        grids: &BTreeMap<ProfileRole, &TerrainGrid>,
    ) -> TerrainResult<ProfileSeries> {
        let line = match centerline {
            Some(line) => line.clone(),
            None => Self::transect(footprint)?,
        };
        let length = line.length();

        let mut raw_distances = Vec::with_capacity(self.params.n_points);
        let mut elevations: BTreeMap<ProfileRole, Vec<f64>> =
            grids.keys().map(|&role| (role, Vec::new())).collect();

        'points: for (s, point) in line.sample_evenly(self.params.n_points) {
            let mut row = Vec::with_capacity(grids.len());
            for (&role, grid) in grids {
                match grid.sample(&point) {
                    Some(z) => row.push((role, z)),
                    None => continue 'points,
                }
            }
            raw_distances.push(s);
            for (role, z) in row {
                if let Some(series) = elevations.get_mut(&role) {
                    series.push(z);
                }
            }
        }

        let start = raw_distances.first().copied();
        let sparse = match start {
            Some(first) => first > self.params.sparse_start_fraction * length,
            None => true,
        };
        let offset = start.unwrap_or(0.0);
        let distances = raw_distances.into_iter().map(|d| d - offset).collect();

        Ok(ProfileSeries {
            distances,
            elevations,
            transect_length: length,
            sparse,
        })
    }
}

fn westerly_first(a: &Point2D, b: &Point2D) -> bool {
    a.x < b.x || (a.x == b.x && a.y <= b.y)
}
