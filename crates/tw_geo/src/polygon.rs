// crates/tw_geo/src/polygon.rs
//! 多边形与折线
//!
//! 测量足迹以单个简单多边形（单环、无孔）表示。本模块提供：
//!
//! - 鞋带公式面积与包围盒
//! - 点包含判定（边界视为内部）
//! - 两个简单多边形（可为凹多边形）的精确相交面积
//! - 四个极值顶点（最西、最东、最北、最南）
//! - 凸包、最小面积外接矩形与直线截取的弦长
//! - 中心线折线的弧长参数化与均匀采样
//!
//! # 相交面积算法
//!
//! 由格林公式，区域面积等于其正向边界上 `½∮(x dy − y dx)` 的积分。
//! 两个逆时针多边形 A、B 的交集边界由两部分组成：
//! A 的边中位于 B 内部的片段，以及 B 的边中位于 A 内部的片段。
//! 每条边在与另一多边形所有边的交点处切分，再以片段中点判定归属。
//! 重合边只在方向相同时计入一次（取自 A），方向相反时交集在该处宽度为零。

use crate::error::{GeoError, GeoResult};
use crate::geometry::Point2D;
use crate::spatial_index::BoundingBox;
use serde::{Deserialize, Serialize};

/// 相对几何容差（乘以包围盒对角线长度）
const RELATIVE_EPS: f64 = 1e-9;

/// 平行判定的相对阈值
const PARALLEL_EPS: f64 = 1e-12;

// ============================================================================
// Polygon
// ============================================================================

/// 简单多边形（开放环，首尾顶点不重复，内部统一为逆时针方向）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point2D>", into = "Vec<Point2D>")]
pub struct Polygon {
    ring: Vec<Point2D>,
}

/// 点相对多边形的位置
#[derive(Debug, Clone, Copy, PartialEq)]
enum Location {
    Inside,
    Outside,
    /// 位于边界上，附带所在边的方向向量
    Boundary(Point2D),
}

/// 足迹的四个极值顶点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtremeVertices {
    /// 最西（x 最小）
    pub west: Point2D,
    /// 最东（x 最大）
    pub east: Point2D,
    /// 最北（y 最大）
    pub north: Point2D,
    /// 最南（y 最小）
    pub south: Point2D,
}

impl Polygon {
    /// 从顶点序列创建多边形
    ///
    /// 闭合重复点与连续重复点会被移除；方向统一为逆时针。
    ///
    /// # Errors
    ///
    /// 顶点含非有限坐标、去重后少于 3 个顶点或面积为零时返回错误。
    pub fn new(vertices: Vec<Point2D>) -> GeoResult<Self> {
        for p in &vertices {
            GeoError::check_finite("多边形顶点", p.x, p.y)?;
        }

        let mut ring: Vec<Point2D> = Vec::with_capacity(vertices.len());
        for p in vertices {
            if ring.last() != Some(&p) {
                ring.push(p);
            }
        }
        while ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }

        if ring.len() < 3 {
            return Err(GeoError::invalid_polygon(format!(
                "顶点不足: 需要至少 3 个不同顶点, 实际 {}",
                ring.len()
            )));
        }

        let signed = signed_area_of(&ring);
        let diag = BoundingBox::from_points(&ring).diagonal();
        if signed.abs() <= RELATIVE_EPS * diag * diag {
            return Err(GeoError::invalid_polygon("面积为零（顶点共线）"));
        }
        if signed < 0.0 {
            ring.reverse();
        }

        Ok(Self { ring })
    }

    /// 轴对齐矩形
    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> GeoResult<Self> {
        Self::new(vec![
            Point2D::new(min_x, min_y),
            Point2D::new(max_x, min_y),
            Point2D::new(max_x, max_y),
            Point2D::new(min_x, max_y),
        ])
    }

    /// 顶点（逆时针）
    #[must_use]
    pub fn vertices(&self) -> &[Point2D] {
        &self.ring
    }

    /// 边迭代器 (起点, 终点)
    pub fn edges(&self) -> impl Iterator<Item = (Point2D, Point2D)> + '_ {
        let n = self.ring.len();
        (0..n).map(move |i| (self.ring[i], self.ring[(i + 1) % n]))
    }

    /// 面积 [m²]
    #[must_use]
    pub fn area(&self) -> f64 {
        signed_area_of(&self.ring).abs()
    }

    /// 包围盒
    #[must_use]
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_points(&self.ring)
    }

    /// 点是否在多边形内（边界视为内部）
    #[must_use]
    pub fn contains(&self, point: &Point2D) -> bool {
        let eps = RELATIVE_EPS * self.bbox().diagonal().max(1.0);
        !matches!(self.locate(point, eps), Location::Outside)
    }

    /// 四个极值顶点
    ///
    /// 并列时取环上首次出现的顶点。
    #[must_use]
    pub fn extreme_vertices(&self) -> ExtremeVertices {
        let first = self.ring[0];
        let mut ext = ExtremeVertices {
            west: first,
            east: first,
            north: first,
            south: first,
        };
        for p in &self.ring[1..] {
            if p.x < ext.west.x {
                ext.west = *p;
            }
            if p.x > ext.east.x {
                ext.east = *p;
            }
            if p.y > ext.north.y {
                ext.north = *p;
            }
            if p.y < ext.south.y {
                ext.south = *p;
            }
        }
        ext
    }

    /// 凸包（逆时针，不含共线点）
    ///
    /// Andrew 单调链算法。
    #[must_use]
    pub fn convex_hull(&self) -> Vec<Point2D> {
        let mut pts = self.ring.clone();
        pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));

        let turn = |o: Point2D, a: Point2D, b: Point2D| (a - o).cross(&(b - o));
        let mut hull: Vec<Point2D> = Vec::with_capacity(pts.len() * 2);
        // 下链
        for &p in &pts {
            while hull.len() >= 2 && turn(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
                hull.pop();
            }
            hull.push(p);
        }
        // 上链
        let lower_len = hull.len() + 1;
        for &p in pts.iter().rev().skip(1) {
            while hull.len() >= lower_len
                && turn(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
            {
                hull.pop();
            }
            hull.push(p);
        }
        hull.pop();
        hull
    }

    /// 最小面积外接矩形的四个角点（逆时针）
    ///
    /// 最小外接矩形必有一条边与凸包某条边共线，逐边旋转取面积最小者。
    #[must_use]
    pub fn minimum_area_rectangle(&self) -> [Point2D; 4] {
        let hull = self.convex_hull();
        let n = hull.len();
        let mut best: Option<(f64, [Point2D; 4])> = None;

        for i in 0..n {
            let edge = hull[(i + 1) % n] - hull[i];
            let len = edge.length();
            if len <= PARALLEL_EPS {
                continue;
            }
            let u = edge * (1.0 / len);
            let v = Point2D::new(-u.y, u.x);

            let (mut u_min, mut u_max) = (f64::INFINITY, f64::NEG_INFINITY);
            let (mut v_min, mut v_max) = (f64::INFINITY, f64::NEG_INFINITY);
            for p in &hull {
                let (pu, pv) = (p.dot(&u), p.dot(&v));
                u_min = u_min.min(pu);
                u_max = u_max.max(pu);
                v_min = v_min.min(pv);
                v_max = v_max.max(pv);
            }

            let area = (u_max - u_min) * (v_max - v_min);
            if best.as_ref().map_or(true, |(a, _)| area < *a) {
                let corner = |a: f64, b: f64| u * a + v * b;
                best = Some((
                    area,
                    [
                        corner(u_min, v_min),
                        corner(u_max, v_min),
                        corner(u_max, v_max),
                        corner(u_min, v_max),
                    ],
                ));
            }
        }

        // 合法多边形的凸包至少有三条非零边
        best.map_or_else(
            || {
                let b = self.bbox();
                [
                    Point2D::new(b.min_x, b.min_y),
                    Point2D::new(b.max_x, b.min_y),
                    Point2D::new(b.max_x, b.max_y),
                    Point2D::new(b.min_x, b.max_y),
                ]
            },
            |(_, corners)| corners,
        )
    }

    /// 直线穿过多边形内部的各段长度 [m]
    ///
    /// 直线经过 `origin`，方向为 `direction`（无需单位化）。
    /// 顶点恰在直线上时按半开规则计数，只擦过顶点或沿边贴合时不产生长度为零的片段。
    #[must_use]
    pub fn chord_lengths(&self, origin: Point2D, direction: Point2D) -> Vec<f64> {
        let len = direction.length();
        if len <= PARALLEL_EPS {
            return Vec::new();
        }
        let u = direction * (1.0 / len);
        let normal = Point2D::new(-u.y, u.x);
        let eps = RELATIVE_EPS * self.bbox().diagonal().max(1.0);

        let side = |p: Point2D| {
            let s = (p - origin).dot(&normal);
            if s.abs() <= eps {
                0.0
            } else {
                s
            }
        };

        let mut params = Vec::new();
        for (a, b) in self.edges() {
            let (sa, sb) = (side(a), side(b));
            if (sa > 0.0) != (sb > 0.0) {
                let hit = if sa == 0.0 {
                    a
                } else if sb == 0.0 {
                    b
                } else {
                    a.lerp(&b, sa / (sa - sb))
                };
                params.push((hit - origin).dot(&u));
            }
        }
        params.sort_by(f64::total_cmp);

        params
            .chunks_exact(2)
            .map(|pair| pair[1] - pair[0])
            .filter(|&l| l > eps)
            .collect()
    }

    /// 与另一多边形的精确相交面积 [m²]
    #[must_use]
    pub fn intersection_area(&self, other: &Self) -> f64 {
        let (ba, bb) = (self.bbox(), other.bbox());
        if !ba.intersects(&bb) {
            return 0.0;
        }
        let eps = RELATIVE_EPS * ba.merge(&bb).diagonal().max(1.0);

        let twice = boundary_inside(self, other, eps, true) + boundary_inside(other, self, eps, false);
        (twice * 0.5).max(0.0)
    }

    /// 判定点位置
    fn locate(&self, p: &Point2D, eps: f64) -> Location {
        for (a, b) in self.edges() {
            if distance_to_segment(p, &a, &b) <= eps {
                return Location::Boundary(b - a);
            }
        }

        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x {
                    inside = !inside;
                }
            }
        }
        if inside {
            Location::Inside
        } else {
            Location::Outside
        }
    }
}

impl TryFrom<Vec<Point2D>> for Polygon {
    type Error = GeoError;

    fn try_from(vertices: Vec<Point2D>) -> Result<Self, Self::Error> {
        Self::new(vertices)
    }
}

impl From<Polygon> for Vec<Point2D> {
    fn from(polygon: Polygon) -> Self {
        polygon.ring
    }
}

/// 鞋带公式有符号面积（逆时针为正）
fn signed_area_of(ring: &[Point2D]) -> f64 {
    let n = ring.len();
    let twice: f64 = (0..n).map(|i| ring[i].cross(&ring[(i + 1) % n])).sum();
    twice * 0.5
}

/// 点到线段距离
fn distance_to_segment(p: &Point2D, a: &Point2D, b: &Point2D) -> f64 {
    let d = *b - *a;
    let len2 = d.dot(&d);
    if len2 == 0.0 {
        return p.distance_to(a);
    }
    let t = ((*p - *a).dot(&d) / len2).clamp(0.0, 1.0);
    p.distance_to(&a.lerp(b, t))
}

/// 多边形 `p` 的边中位于 `q` 内部部分对 2×面积 的贡献
fn boundary_inside(p: &Polygon, q: &Polygon, eps: f64, keep_shared: bool) -> f64 {
    let mut twice = 0.0;
    let mut params: Vec<f64> = Vec::new();

    for (a, b) in p.edges() {
        params.clear();
        params.push(0.0);
        params.push(1.0);
        for (c, e) in q.edges() {
            collect_split_params(&a, &b, &c, &e, eps, &mut params);
        }
        params.sort_by(f64::total_cmp);

        let dir = b - a;
        let min_dt = eps / dir.length();
        let mut t0 = params[0];
        for &t1 in &params[1..] {
            if t1 - t0 <= min_dt {
                continue;
            }
            let p0 = a.lerp(&b, t0);
            let p1 = a.lerp(&b, t1);
            let keep = match q.locate(&p0.midpoint(&p1), eps) {
                Location::Inside => true,
                Location::Outside => false,
                Location::Boundary(q_dir) => keep_shared && dir.dot(&q_dir) > 0.0,
            };
            if keep {
                twice += p0.cross(&p1);
            }
            t0 = t1;
        }
    }
    twice
}

/// 收集线段 a→b 被线段 c→e 切分的参数位置
fn collect_split_params(
    a: &Point2D,
    b: &Point2D,
    c: &Point2D,
    e: &Point2D,
    eps: f64,
    params: &mut Vec<f64>,
) {
    let d = *b - *a;
    let f = *e - *c;
    let w = *c - *a;
    let (len_d, len_f) = (d.length(), f.length());
    if len_d == 0.0 || len_f == 0.0 {
        return;
    }

    let denom = d.cross(&f);
    if denom.abs() > PARALLEL_EPS * len_d * len_f {
        let t = w.cross(&f) / denom;
        let u = w.cross(&d) / denom;
        let (tol_t, tol_u) = (eps / len_d, eps / len_f);
        if (-tol_t..=1.0 + tol_t).contains(&t) && (-tol_u..=1.0 + tol_u).contains(&u) {
            params.push(t.clamp(0.0, 1.0));
        }
    } else if w.cross(&d).abs() / len_d <= eps {
        // 共线：重叠段端点
        let len2 = d.dot(&d);
        for pt in [c, e] {
            let t = (*pt - *a).dot(&d) / len2;
            if t > 0.0 && t < 1.0 {
                params.push(t);
            }
        }
    }
}

// ============================================================================
// Polyline
// ============================================================================

/// 折线（足迹中心线）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point2D>", into = "Vec<Point2D>")]
pub struct Polyline {
    points: Vec<Point2D>,
    /// 各顶点处的累计弧长
    #[serde(skip)]
    cumulative: Vec<f64>,
}

impl Polyline {
    /// 创建折线
    ///
    /// # Errors
    ///
    /// 少于 2 个点、含非有限坐标或总长度为零时返回错误。
    pub fn new(points: Vec<Point2D>) -> GeoResult<Self> {
        for p in &points {
            GeoError::check_finite("折线顶点", p.x, p.y)?;
        }
        if points.len() < 2 {
            return Err(GeoError::invalid_polyline("至少需要 2 个点"));
        }

        let mut cumulative = Vec::with_capacity(points.len());
        let mut acc = 0.0;
        cumulative.push(0.0);
        for w in points.windows(2) {
            acc += w[0].distance_to(&w[1]);
            cumulative.push(acc);
        }
        if acc <= 0.0 {
            return Err(GeoError::invalid_polyline("总长度为零"));
        }

        Ok(Self { points, cumulative })
    }

    /// 两点线段
    pub fn segment(start: Point2D, end: Point2D) -> GeoResult<Self> {
        Self::new(vec![start, end])
    }

    /// 顶点
    #[must_use]
    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    /// 总弧长
    #[must_use]
    pub fn length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// 弧长 `s` 处的点（超出范围时截断到端点）
    #[must_use]
    pub fn point_at(&self, s: f64) -> Point2D {
        let s = s.clamp(0.0, self.length());
        let seg = match self.cumulative.partition_point(|&c| c <= s) {
            0 => 0,
            i => (i - 1).min(self.points.len() - 2),
        };
        let seg_len = self.cumulative[seg + 1] - self.cumulative[seg];
        if seg_len <= 0.0 {
            return self.points[seg];
        }
        let t = (s - self.cumulative[seg]) / seg_len;
        self.points[seg].lerp(&self.points[seg + 1], t)
    }

    /// 沿弧长均匀采样 `n` 个点（含两端），返回 (弧长, 点)
    #[must_use]
    pub fn sample_evenly(&self, n: usize) -> Vec<(f64, Point2D)> {
        match n {
            0 => Vec::new(),
            1 => vec![(0.0, self.points[0])],
            _ => {
                let total = self.length();
                (0..n)
                    .map(|i| {
                        let s = total * i as f64 / (n - 1) as f64;
                        (s, self.point_at(s))
                    })
                    .collect()
            }
        }
    }
}

impl TryFrom<Vec<Point2D>> for Polyline {
    type Error = GeoError;

    fn try_from(points: Vec<Point2D>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<Polyline> for Vec<Point2D> {
    fn from(line: Polyline) -> Self {
        line.points
    }
}

// ============================================================================
// 测试
// ============================================================================
