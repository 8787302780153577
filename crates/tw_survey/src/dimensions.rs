// crates/tw_survey/src/dimensions.rs
//! 足迹尺寸与极值点
//!
//! - 面积：足迹多边形面积
//! - 宽度：沿最小面积外接矩形长边均布 51 条垂直截线，取截线在足迹内各段长度的均值
//! - 长度：轴对齐包围盒的较大边
//!
//! 极值点取足迹最西、最东、最北、最南的顶点，高程从测量面补丁上取值。

use serde::{Deserialize, Serialize};
use tw_geo::{Point2D, Polygon};
use tw_terrain::TerrainGrid;

/// 宽度截线数
pub const WIDTH_TRANSECTS: usize = 51;

/// 足迹尺寸
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FootprintDimensions {
    /// 面积 [m²]
    pub area: f64,
    /// 平均宽度 [m]；没有任何截线落入足迹时为 `None`
    pub width: Option<f64>,
    /// 长度 [m]
    pub length: f64,
}

impl FootprintDimensions {
    /// 量测足迹尺寸
    pub fn measure(polygon: &Polygon) -> Self {
        let bbox = polygon.bbox();
        let length = (bbox.max_x - bbox.min_x).max(bbox.max_y - bbox.min_y);

        let corners = polygon.minimum_area_rectangle();
        let long = (0..4)
            .max_by(|&a, &b| {
                let side = |i: usize| corners[i].distance_to(&corners[(i + 1) % 4]);
                side(a).total_cmp(&side(b))
            })
            .unwrap_or(0);
        let (start, end) = (corners[long], corners[(long + 1) % 4]);
        let along = end - start;
        let across = Point2D::new(-along.y, along.x);

        let chords: Vec<f64> = (0..WIDTH_TRANSECTS)
            .flat_map(|i| {
                let t = i as f64 / (WIDTH_TRANSECTS - 1) as f64;
                polygon.chord_lengths(start.lerp(&end, t), across)
            })
            .collect();
        let width = (!chords.is_empty()).then(|| chords.iter().sum::<f64>() / chords.len() as f64);

        Self {
            area: polygon.area(),
            width,
            length,
        }
    }
}

/// 带高程的足迹顶点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FootprintVertex {
    /// 东坐标
    pub easting: f64,
    /// 北坐标
    pub northing: f64,
    /// 高程 [m]；补丁无有效单元时为 `None`
    pub elevation: Option<f64>,
}

/// 足迹极值点 P1..P4
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtremePoints {
    /// P1 最西
    pub west: FootprintVertex,
    /// P2 最东
    pub east: FootprintVertex,
    /// P3 最北
    pub north: FootprintVertex,
    /// P4 最南
    pub south: FootprintVertex,
}

impl ExtremePoints {
    /// 取足迹极值顶点并从补丁取高程
    ///
    /// 顶点所在单元缺失时（补丁按单元中心裁剪，边界单元常为缺失）取最近的有效单元。
    pub fn locate(polygon: &Polygon, patch: &TerrainGrid) -> Self {
        let ext = polygon.extreme_vertices();
        let vertex = |p: Point2D| FootprintVertex {
            easting: p.x,
            northing: p.y,
            elevation: patch.sample(&p).or_else(|| nearest_valid(patch, &p)),
        };
        Self {
            west: vertex(ext.west),
            east: vertex(ext.east),
            north: vertex(ext.north),
            south: vertex(ext.south),
        }
    }

    /// 按 P1..P4 顺序
    pub fn as_array(&self) -> [FootprintVertex; 4] {
        [self.west, self.east, self.north, self.south]
    }
}

fn nearest_valid(patch: &TerrainGrid, point: &Point2D) -> Option<f64> {
    let geometry = patch.geometry();
    patch
        .data()
        .iter()
        .enumerate()
        .filter(|(_, &v)| !patch.is_nodata(v))
        .map(|(i, &v)| {
            let (row, col) = geometry.row_col(i);
            (geometry.cell_center(row, col).distance_squared_to(point), v)
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, v)| v)
}
