// crates/tw_geo/src/spatial_index.rs
//! 足迹空间索引
//!
//! 以足迹多边形的包围盒为键的 R-tree，用于在出处解析时快速筛选
//! 可能与新测量面重叠的历史足迹。包围盒筛选只是候选集，
//! 精确的重叠面积仍由 [`Polygon::intersection_area`](crate::polygon::Polygon::intersection_area) 计算。
//!
//! # 示例
//!
//! ```
//! use tw_geo::spatial_index::{BoundingBox, FootprintIndex};
//!
//! let mut index: FootprintIndex<&str> = FootprintIndex::new();
//! index.insert(BoundingBox::new(0.0, 0.0, 10.0, 10.0), "A");
//! index.insert(BoundingBox::new(20.0, 20.0, 30.0, 30.0), "B");
//!
//! let hits = index.query_intersecting(&BoundingBox::new(5.0, 5.0, 12.0, 12.0));
//! assert_eq!(hits, vec![&"A"]);
//! ```

use crate::geometry::Point2D;
use rstar::{RTree, RTreeObject, AABB};

/// 边界框
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// 最小 x
    pub min_x: f64,
    /// 最小 y
    pub min_y: f64,
    /// 最大 x
    pub max_x: f64,
    /// 最大 y
    pub max_y: f64,
}

impl BoundingBox {
    /// 创建新的边界框（自动整理角点顺序）
    #[must_use]
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
        }
    }

    /// 点集的包围盒；空集返回原点处的零面积框
    #[must_use]
    pub fn from_points(points: &[Point2D]) -> Self {
        let Some(first) = points.first() else {
            return Self::new(0.0, 0.0, 0.0, 0.0);
        };
        points.iter().skip(1).fold(
            Self::new(first.x, first.y, first.x, first.y),
            |acc, p| Self {
                min_x: acc.min_x.min(p.x),
                min_y: acc.min_y.min(p.y),
                max_x: acc.max_x.max(p.x),
                max_y: acc.max_y.max(p.y),
            },
        )
    }

    /// 检查点是否在边界框内
    #[must_use]
    pub fn contains_point(&self, point: &Point2D) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }

    /// 检查两个边界框是否相交（含边界接触）
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// 合并两个边界框
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// 宽度
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// 高度
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// 对角线长度
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        self.width().hypot(self.height())
    }

    fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

// ============================================================================
// R-tree 包装
// ============================================================================

#[derive(Debug, Clone)]
struct FootprintEntry<T> {
    bbox: BoundingBox,
    data: T,
}

impl<T> RTreeObject for FootprintEntry<T> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bbox.envelope()
    }
}

/// 足迹包围盒索引
pub struct FootprintIndex<T> {
    tree: RTree<FootprintEntry<T>>,
}

impl<T> Default for FootprintIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FootprintIndex<T> {
    /// 创建空索引
    #[must_use]
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// 批量构建
    #[must_use]
    pub fn bulk_load(items: Vec<(BoundingBox, T)>) -> Self {
        let entries = items
            .into_iter()
            .map(|(bbox, data)| FootprintEntry { bbox, data })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// 插入足迹
    pub fn insert(&mut self, bbox: BoundingBox, data: T) {
        self.tree.insert(FootprintEntry { bbox, data });
    }

    /// 查询包围盒与 `bbox` 相交的全部条目
    #[must_use]
    pub fn query_intersecting(&self, bbox: &BoundingBox) -> Vec<&T> {
        self.tree
            .locate_in_envelope_intersecting(&bbox.envelope())
            .map(|entry| &entry.data)
            .collect()
    }

    /// 条目数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// 是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_from_points() {
        let bbox = BoundingBox::from_points(&[
            Point2D::new(3.0, -1.0),
            Point2D::new(-2.0, 4.0),
            Point2D::new(0.0, 0.0),
        ]);
        assert_eq!(bbox, BoundingBox::new(-2.0, -1.0, 3.0, 4.0));
        assert!((bbox.diagonal() - 50f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_bbox_intersects_touching() {
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BoundingBox::new(1.0, 0.0, 2.0, 1.0);
        let c = BoundingBox::new(1.5, 1.5, 2.0, 2.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_footprint_index_query() {
        let index = FootprintIndex::bulk_load(vec![
            (BoundingBox::new(0.0, 0.0, 10.0, 10.0), 1u32),
            (BoundingBox::new(8.0, 8.0, 20.0, 20.0), 2),
            (BoundingBox::new(100.0, 100.0, 110.0, 110.0), 3),
        ]);
        assert_eq!(index.len(), 3);

        let mut hits: Vec<u32> = index
            .query_intersecting(&BoundingBox::new(9.0, 9.0, 9.5, 9.5))
            .into_iter()
            .copied()
            .collect();
        hits.sort_unstable();
        assert_eq!(hits, vec![1, 2]);

        let empty: FootprintIndex<u32> = FootprintIndex::new();
        assert!(empty.is_empty());
    }
}
