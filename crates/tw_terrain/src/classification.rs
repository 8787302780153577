// crates/tw_terrain/src/classification.rs

//! 平均厚度分级

use serde::{Deserialize, Serialize};
use std::fmt;

/// 厚度等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThicknessClass {
    /// > 1.3 m
    TripleLayer,
    /// (0.8, 1.3] m
    DoubleLayer,
    /// (0.2, 0.8] m
    Fill,
    /// [-0.2, 0.2] m
    CutFill,
    /// < -0.2 m
    Cut,
}

impl ThicknessClass {
    /// 按平均厚度分级；非有限值返回 `None`
    pub fn classify(mean_thickness: f64) -> Option<Self> {
        if !mean_thickness.is_finite() {
            return None;
        }
        Some(if mean_thickness > 1.3 {
            Self::TripleLayer
        } else if mean_thickness > 0.8 {
            Self::DoubleLayer
        } else if mean_thickness > 0.2 {
            Self::Fill
        } else if mean_thickness >= -0.2 {
            Self::CutFill
        } else {
            Self::Cut
        })
    }

    /// 显示标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::TripleLayer => "Triple Capa",
            Self::DoubleLayer => "Doble Capa",
            Self::Fill => "Relleno",
            Self::CutFill => "Corte Relleno",
            Self::Cut => "Corte",
        }
    }
}

impl fmt::Display for ThicknessClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(ThicknessClass::classify(1.31), Some(ThicknessClass::TripleLayer));
        assert_eq!(ThicknessClass::classify(1.3), Some(ThicknessClass::DoubleLayer));
        assert_eq!(ThicknessClass::classify(0.8), Some(ThicknessClass::Fill));
        assert_eq!(ThicknessClass::classify(0.2), Some(ThicknessClass::CutFill));
        assert_eq!(ThicknessClass::classify(-0.2), Some(ThicknessClass::CutFill));
        assert_eq!(ThicknessClass::classify(-0.21), Some(ThicknessClass::Cut));
        assert_eq!(ThicknessClass::classify(f64::NAN), None);
    }
}
