// crates/tw_survey/src/naming.rs
//! 测量名称解析
//!
//! 现场命名约定为 `YYMMDD_<WALL>_S<n>_<material>`，例如
//! `240110_MP_S3_relleno` 表示 2024-01-10 在主坝 (MP) 第 3 区段的填筑测量。

use crate::error::{SurveyError, SurveyResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 已知构筑物代码与显示名
const WALL_NAMES: [(&str, &str); 3] = [("MP", "Principal"), ("ME", "Este"), ("MO", "Oeste")];

/// 解析后的测量名称
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyName {
    /// 测量日期
    pub date: NaiveDate,
    /// 构筑物代码（如 `MP`）
    pub wall_code: String,
    /// 构筑物显示名；未知代码保持原样
    pub wall_name: String,
    /// 区段（如 `SECTOR 3`）
    pub sector: String,
    /// 填筑材料
    pub material: String,
}

/// 构筑物代码对应的显示名
pub fn wall_display_name(code: &str) -> &str {
    WALL_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map_or(code, |(_, name)| *name)
}

/// 解析测量名称
///
/// # Errors
///
/// 段数不为 4、日期段非法、区段不是 `S<数字>` 或任一段为空时返回
/// [`SurveyError::InvalidName`]。
pub fn parse_survey_name(name: &str) -> SurveyResult<SurveyName> {
    let parts: Vec<&str> = name.trim().split('_').collect();
    let [date_raw, wall, sector_raw, material] = parts.as_slice() else {
        return Err(SurveyError::invalid_name(
            name,
            format!("应有 4 段，实际 {} 段", parts.len()),
        ));
    };

    let date = parse_compact_date(date_raw)
        .ok_or_else(|| SurveyError::invalid_name(name, format!("日期段无效: '{date_raw}'")))?;

    if wall.is_empty() || material.is_empty() {
        return Err(SurveyError::invalid_name(name, "构筑物或材料段为空"));
    }

    let sector_no = sector_raw
        .strip_prefix('S')
        .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        .ok_or_else(|| SurveyError::invalid_name(name, format!("区段段无效: '{sector_raw}'")))?;

    Ok(SurveyName {
        date,
        wall_code: (*wall).to_string(),
        wall_name: wall_display_name(wall).to_string(),
        sector: format!("SECTOR {sector_no}"),
        material: (*material).to_string(),
    })
}

/// `YYMMDD` → 20YY-MM-DD
fn parse_compact_date(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 6 || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let yy: i32 = raw[0..2].parse().ok()?;
    let mm: u32 = raw[2..4].parse().ok()?;
    let dd: u32 = raw[4..6].parse().ok()?;
    NaiveDate::from_ymd_opt(2000 + yy, mm, dd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_name() {
        let parsed = parse_survey_name("240110_MP_S3_relleno").unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(parsed.wall_code, "MP");
        assert_eq!(parsed.wall_name, "Principal");
        assert_eq!(parsed.sector, "SECTOR 3");
        assert_eq!(parsed.material, "relleno");
    }

    #[test]
    fn test_unknown_wall_keeps_code() {
        let parsed = parse_survey_name("231201_MN_S12_arena").unwrap();
        assert_eq!(parsed.wall_name, "MN");
        assert_eq!(wall_display_name("MO"), "Oeste");
    }

    #[test]
    fn test_malformed_names_rejected() {
        for bad in [
            "240110_MP_S3",
            "240110_MP_S3_relleno_extra",
            "241310_MP_S3_relleno",
            "24011_MP_S3_relleno",
            "240110_MP_X3_relleno",
            "240110_MP_S_relleno",
            "240110__S3_relleno",
        ] {
            let err = parse_survey_name(bad).unwrap_err();
            assert!(matches!(err, SurveyError::InvalidName { .. }), "{bad}");
        }
    }
}
