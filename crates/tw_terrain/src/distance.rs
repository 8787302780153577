// crates/tw_terrain/src/distance.rs

//! 精确欧几里得距离变换
//!
//! 对每个单元求到最近"特征单元"的欧氏距离（世界单位，支持各向异性像素）
//! 以及该特征单元的索引。采用可分离的下包络抛物线算法：
//! 先沿列方向求一维平方距离，再沿行方向合并，复杂度 O(W×H)。
//!
//! # 示例
//!
//! ```
//! use tw_terrain::distance::DistanceField;
//!
//! // 3x1 栅格，只有中间单元是特征
//! let field = DistanceField::compute(&[false, true, false], 3, 1, 2.0, 1.0).unwrap();
//! assert_eq!(field.distance(0), 2.0);
//! assert_eq!(field.nearest(2), Some(1));
//! ```

use crate::error::{TerrainError, TerrainResult};
use rayon::prelude::*;

const NO_SITE: usize = usize::MAX;

/// 距离场
#[derive(Debug, Clone)]
pub struct DistanceField {
    distance: Vec<f64>,
    nearest: Vec<usize>,
}

impl DistanceField {
    /// 计算距离场
    ///
    /// `features` 为行主序掩膜；没有任何特征单元时，所有距离为 +∞。
    ///
    /// # Errors
    ///
    /// 掩膜长度与尺寸不符或像素尺寸非正时返回错误。
    pub fn compute(
        features: &[bool],
        width: usize,
        height: usize,
        pixel_width: f64,
        pixel_height: f64,
    ) -> TerrainResult<Self> {
        if features.len() != width * height {
            return Err(TerrainError::BufferSizeMismatch {
                expected: width * height,
                actual: features.len(),
            });
        }
        TerrainError::check_positive("pixel_width", pixel_width)?;
        TerrainError::check_positive("pixel_height", pixel_height)?;

        // 第一遍：沿列（行号方向，间距 pixel_height）
        let columns: Vec<(Vec<f64>, Vec<usize>)> = (0..width)
            .into_par_iter()
            .map(|col| {
                let f: Vec<f64> = (0..height)
                    .map(|row| {
                        if features[row * width + col] {
                            0.0
                        } else {
                            f64::INFINITY
                        }
                    })
                    .collect();
                let mut d = vec![f64::INFINITY; height];
                let mut arg = vec![NO_SITE; height];
                lower_envelope(&f, pixel_height, &mut d, &mut arg);
                (d, arg)
            })
            .collect();

        let mut col_dist = vec![f64::INFINITY; width * height];
        let mut col_row = vec![NO_SITE; width * height];
        for (col, (d, arg)) in columns.into_iter().enumerate() {
            for row in 0..height {
                col_dist[row * width + col] = d[row];
                col_row[row * width + col] = arg[row];
            }
        }

        // 第二遍：沿行（列号方向，间距 pixel_width）
        let mut distance = vec![f64::INFINITY; width * height];
        let mut nearest = vec![NO_SITE; width * height];
        distance
            .par_chunks_mut(width)
            .zip(nearest.par_chunks_mut(width))
            .enumerate()
            .for_each(|(row, (d_row, n_row))| {
                let f = &col_dist[row * width..(row + 1) * width];
                let mut arg = vec![NO_SITE; width];
                lower_envelope(f, pixel_width, d_row, &mut arg);
                for (col, out) in n_row.iter_mut().enumerate() {
                    let q = arg[col];
                    if q != NO_SITE {
                        let site_row = col_row[row * width + q];
                        if site_row != NO_SITE {
                            *out = site_row * width + q;
                        }
                    }
                }
                for d in d_row.iter_mut() {
                    *d = d.sqrt();
                }
            });

        Ok(Self { distance, nearest })
    }

    /// 单元到最近特征的距离 [m]
    #[inline]
    pub fn distance(&self, index: usize) -> f64 {
        self.distance[index]
    }

    /// 最近特征单元的索引
    #[inline]
    pub fn nearest(&self, index: usize) -> Option<usize> {
        match self.nearest[index] {
            NO_SITE => None,
            i => Some(i),
        }
    }

    /// 单元数
    pub fn len(&self) -> usize {
        self.distance.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.distance.is_empty()
    }
}

/// 一维平方距离的下包络
///
/// `f[q]` 为站点 q 的附加代价（+∞ 表示非站点），输出
/// `d[p] = min_q ((p-q)·spacing)² + f[q]` 及取得最小值的 q。
fn lower_envelope(f: &[f64], spacing: f64, d: &mut [f64], arg: &mut [usize]) {
    let n = f.len();
    let pos = |i: usize| i as f64 * spacing;
    let intersect = |a: usize, b: usize| {
        ((f[b] + pos(b) * pos(b)) - (f[a] + pos(a) * pos(a))) / (2.0 * (pos(b) - pos(a)))
    };

    let mut sites: Vec<usize> = Vec::with_capacity(n);
    let mut bounds: Vec<f64> = Vec::with_capacity(n);

    for q in (0..n).filter(|&q| f[q].is_finite()) {
        let mut s = f64::NEG_INFINITY;
        while let Some(&last) = sites.last() {
            s = intersect(last, q);
            if s <= bounds[bounds.len() - 1] {
                sites.pop();
                bounds.pop();
                s = f64::NEG_INFINITY;
            } else {
                break;
            }
        }
        sites.push(q);
        bounds.push(s);
    }

    if sites.is_empty() {
        d.fill(f64::INFINITY);
        arg.fill(NO_SITE);
        return;
    }

    let mut k = 0;
    for p in 0..n {
        let x = pos(p);
        while k + 1 < sites.len() && bounds[k + 1] < x {
            k += 1;
        }
        let q = sites[k];
        let dx = x - pos(q);
        d[p] = dx * dx + f[q];
        arg[p] = q;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 暴力参考实现
    fn brute_force(features: &[bool], w: usize, h: usize, sx: f64, sy: f64) -> Vec<f64> {
        (0..w * h)
            .map(|i| {
                let (r, c) = (i / w, i % w);
                features
                    .iter()
                    .enumerate()
                    .filter(|(_, &f)| f)
                    .map(|(j, _)| {
                        let dr = (r as f64 - (j / w) as f64) * sy;
                        let dc = (c as f64 - (j % w) as f64) * sx;
                        (dr * dr + dc * dc).sqrt()
                    })
                    .fold(f64::INFINITY, f64::min)
            })
            .collect()
    }

    #[test]
    fn test_matches_brute_force_anisotropic() {
        let (w, h) = (9, 7);
        let mut features = vec![false; w * h];
        for &i in &[3, 20, 21, 44, 60] {
            features[i] = true;
        }
        let field = DistanceField::compute(&features, w, h, 0.5, 2.0).unwrap();
        let expected = brute_force(&features, w, h, 0.5, 2.0);
        for i in 0..w * h {
            assert!((field.distance(i) - expected[i]).abs() < 1e-9, "cell {i}");
            let site = field.nearest(i).unwrap();
            assert!(features[site]);
            let (r, c) = (i / w, i % w);
            let dr = (r as f64 - (site / w) as f64) * 2.0;
            let dc = (c as f64 - (site % w) as f64) * 0.5;
            assert!(((dr * dr + dc * dc).sqrt() - expected[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_feature_cells_have_zero_distance() {
        let features = vec![true, false, false, true];
        let field = DistanceField::compute(&features, 2, 2, 1.0, 1.0).unwrap();
        assert_eq!(field.distance(0), 0.0);
        assert_eq!(field.nearest(0), Some(0));
        assert_eq!(field.distance(1), 1.0);
    }

    #[test]
    fn test_no_features() {
        let field = DistanceField::compute(&[false; 6], 3, 2, 1.0, 1.0).unwrap();
        assert_eq!(field.len(), 6);
        assert!(field.distance(4).is_infinite());
        assert_eq!(field.nearest(4), None);
    }

    #[test]
    fn test_size_checked() {
        assert!(DistanceField::compute(&[true; 5], 3, 2, 1.0, 1.0).is_err());
    }
}
