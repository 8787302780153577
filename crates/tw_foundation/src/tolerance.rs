// crates/tw_foundation/src/tolerance.rs

//! 数值容差
//!
//! 通过参数注入使用，不提供全局可变实例。

use serde::{Deserialize, Serialize};

/// 数值容差
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// 高程变化判定阈值 [m]，不超过此值视为未变化
    pub elevation_change: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            elevation_change: 1e-6,
        }
    }
}

impl Tolerance {
    /// 两个高程是否视为相同
    #[inline]
    pub fn same_elevation(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.elevation_change
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_elevation() {
        let tol = Tolerance::default();
        assert!(tol.same_elevation(100.0, 100.0 + 1e-8));
        assert!(!tol.same_elevation(100.0, 100.001));

        let coarse = Tolerance { elevation_change: 0.01 };
        assert!(coarse.same_elevation(100.0, 100.005));
    }
}
