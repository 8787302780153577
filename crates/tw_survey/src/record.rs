// crates/tw_survey/src/record.rs
//! 测量记录
//!
//! 外部提供的 [`SurveyCandidate`] 在入口处一次性校验为 [`ValidatedSurvey`]，
//! 排序器解析日期后得到 [`SurveyRecord`]。之后各阶段只访问强类型字段。

use crate::error::{SurveyError, SurveyResult};
use crate::naming::parse_survey_name;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tw_geo::{Point2D, Polygon, Polyline};
use tw_terrain::{DiffResult, ThicknessClass};

// ============================================================================
// Footprint
// ============================================================================

/// 测量足迹
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    /// 测量 ID
    pub survey_id: String,
    /// 构筑物代码
    pub structure: String,
    /// 区段
    pub sector: Option<String>,
    /// 足迹多边形
    pub polygon: Polygon,
    /// 预先计算的中心线
    pub centerline: Option<Polyline>,
}

impl Footprint {
    /// 足迹面积 [m²]
    pub fn area(&self) -> f64 {
        self.polygon.area()
    }
}

// ============================================================================
// SurveyCandidate
// ============================================================================

/// 外部输入的测量候选记录
///
/// 可以只给出现场名称（由其推出日期、构筑物、区段、材料），
/// 也可以显式给出各字段；显式字段优先。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyCandidate {
    /// 测量 ID；缺省时使用名称
    #[serde(default)]
    pub id: Option<String>,
    /// 现场名称 `YYMMDD_<WALL>_S<n>_<material>`
    #[serde(default)]
    pub name: Option<String>,
    /// 构筑物代码
    #[serde(default)]
    pub structure: Option<String>,
    /// 区段
    #[serde(default)]
    pub sector: Option<String>,
    /// 原始日期字符串
    #[serde(default)]
    pub date: Option<String>,
    /// 填筑材料
    #[serde(default)]
    pub material: Option<String>,
    /// 足迹顶点
    pub footprint: Vec<Point2D>,
    /// 中心线顶点
    #[serde(default)]
    pub centerline: Option<Vec<Point2D>>,
}

/// 已校验、尚未解析日期的测量
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSurvey {
    /// 测量 ID
    pub id: String,
    /// 构筑物代码
    pub structure: String,
    /// 区段
    pub sector: Option<String>,
    /// 日期
    pub date: DateField,
    /// 填筑材料
    pub material: Option<String>,
    /// 足迹
    pub footprint: Footprint,
    /// 入队顺序
    pub ingestion_index: usize,
}

/// 日期字段来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateField {
    /// 从名称中解析出的日期
    Parsed(NaiveDate),
    /// 待按配置格式解析的原始字符串
    Raw(String),
}

impl SurveyCandidate {
    /// 候选记录的标识（用于报告，可能为空）
    pub fn label(&self) -> String {
        self.resolved_id().unwrap_or_default()
    }

    /// 记录 ID：非空的 `id`，否则非空的名称
    pub fn resolved_id(&self) -> Option<String> {
        non_empty(self.id.as_deref())
            .or(non_empty(self.name.as_deref()))
            .map(str::to_string)
    }

    /// 构筑物代码提示：显式字段或名称第二段
    pub fn structure_hint(&self) -> Option<String> {
        non_empty(self.structure.as_deref()).map(str::to_string).or_else(|| {
            self.name
                .as_deref()
                .and_then(|n| n.split('_').nth(1))
                .and_then(|s| non_empty(Some(s)))
                .map(str::to_string)
        })
    }

    /// 校验候选记录
    ///
    /// # Errors
    ///
    /// - 名称存在但格式错误：[`SurveyError::InvalidName`]
    /// - ID、构筑物或日期缺失：[`SurveyError::InvalidRecord`]
    /// - 足迹少于 3 个不同顶点或面积为零：[`SurveyError::InvalidFootprint`]
    pub fn validate(&self, ingestion_index: usize) -> SurveyResult<ValidatedSurvey> {
        let parsed_name = match non_empty(self.name.as_deref()) {
            Some(name) => Some(parse_survey_name(name)?),
            None => None,
        };

        let id = self
            .resolved_id()
            .ok_or_else(|| SurveyError::invalid_record("", "缺少测量 ID 与名称"))?;

        let structure = non_empty(self.structure.as_deref())
            .map(str::to_string)
            .or_else(|| parsed_name.as_ref().map(|n| n.wall_code.clone()))
            .ok_or_else(|| SurveyError::invalid_record(&id, "缺少构筑物代码"))?;

        let sector = non_empty(self.sector.as_deref())
            .map(str::to_string)
            .or_else(|| parsed_name.as_ref().map(|n| n.sector.clone()));

        let material = non_empty(self.material.as_deref())
            .map(str::to_string)
            .or_else(|| parsed_name.as_ref().map(|n| n.material.clone()));

        let date = match (non_empty(self.date.as_deref()), &parsed_name) {
            (Some(raw), _) => DateField::Raw(raw.to_string()),
            (None, Some(n)) => DateField::Parsed(n.date),
            (None, None) => return Err(SurveyError::invalid_record(&id, "缺少日期")),
        };

        let polygon = Polygon::new(self.footprint.clone()).map_err(|source| {
            SurveyError::InvalidFootprint {
                survey: id.clone(),
                source,
            }
        })?;
        let centerline = match &self.centerline {
            Some(points) => Some(Polyline::new(points.clone()).map_err(|source| {
                SurveyError::InvalidFootprint {
                    survey: id.clone(),
                    source,
                }
            })?),
            None => None,
        };

        Ok(ValidatedSurvey {
            footprint: Footprint {
                survey_id: id.clone(),
                structure: structure.clone(),
                sector: sector.clone(),
                polygon,
                centerline,
            },
            id,
            structure,
            sector,
            date,
            material,
            ingestion_index,
        })
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

// ============================================================================
// SurveyRecord
// ============================================================================

/// 基准来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "survey")]
pub enum BaseReference {
    /// 排名最高的前序测量
    Predecessor(String),
    /// 构筑物原始地形
    Original,
}

impl BaseReference {
    /// 显示标签
    pub fn label(&self) -> &str {
        match self {
            Self::Predecessor(id) => id,
            Self::Original => "original",
        }
    }
}

/// 测量派生指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyMetrics {
    /// 填方 [m³]
    pub fill_volume: f64,
    /// 挖方 [m³]
    pub cut_volume: f64,
    /// 平均厚度 [m]
    pub mean_thickness: f64,
    /// 最小厚度 [m]
    pub min_thickness: Option<f64>,
    /// 最大厚度 [m]
    pub max_thickness: Option<f64>,
    /// 厚度等级
    pub classification: Option<ThicknessClass>,
    /// 参与计算的单元数
    pub valid_cells: usize,
    /// 数据不足，指标为零
    pub insufficient_data: bool,
}

impl SurveyMetrics {
    /// 数据不足时的空指标
    pub fn insufficient() -> Self {
        Self {
            insufficient_data: true,
            ..Self::from(&DiffResult::empty())
        }
    }
}

impl From<&DiffResult> for SurveyMetrics {
    fn from(diff: &DiffResult) -> Self {
        Self {
            fill_volume: diff.fill_volume,
            cut_volume: diff.cut_volume,
            mean_thickness: diff.mean_thickness,
            min_thickness: diff.min_thickness,
            max_thickness: diff.max_thickness,
            classification: (diff.valid_cells > 0)
                .then(|| ThicknessClass::classify(diff.mean_thickness))
                .flatten(),
            valid_cells: diff.valid_cells,
            insufficient_data: false,
        }
    }
}

/// 测量记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyRecord {
    /// 测量 ID
    pub id: String,
    /// 构筑物代码
    pub structure: String,
    /// 区段
    pub sector: Option<String>,
    /// 测量日期
    pub date: NaiveDate,
    /// 填筑材料
    pub material: Option<String>,
    /// 足迹
    pub footprint: Footprint,
    /// 入队顺序（同日排序键）
    pub ingestion_index: usize,
    /// 派生指标（差分后填入）
    pub metrics: Option<SurveyMetrics>,
    /// 基准来源（出处解析后填入）
    pub base_reference: Option<BaseReference>,
}

impl SurveyRecord {
    /// 由已校验记录和解析后的日期构造
    pub fn from_validated(survey: ValidatedSurvey, date: NaiveDate) -> Self {
        Self {
            id: survey.id,
            structure: survey.structure,
            sector: survey.sector,
            date,
            material: survey.material,
            footprint: survey.footprint,
            ingestion_index: survey.ingestion_index,
            metrics: None,
            base_reference: None,
        }
    }

    /// 填入处理结果
    #[must_use]
    pub fn with_results(mut self, metrics: SurveyMetrics, base_reference: BaseReference) -> Self {
        self.metrics = Some(metrics);
        self.base_reference = Some(base_reference);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point2D> {
        vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(10.0, 0.0),
            Point2D::new(10.0, 10.0),
            Point2D::new(0.0, 10.0),
        ]
    }

    #[test]
    fn test_validate_from_name() {
        let candidate = SurveyCandidate {
            name: Some("240110_MP_S3_relleno".into()),
            footprint: square(),
            ..Default::default()
        };
        let v = candidate.validate(4).unwrap();
        assert_eq!(v.id, "240110_MP_S3_relleno");
        assert_eq!(v.structure, "MP");
        assert_eq!(v.sector.as_deref(), Some("SECTOR 3"));
        assert_eq!(v.material.as_deref(), Some("relleno"));
        assert_eq!(v.date, DateField::Parsed(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()));
        assert_eq!(v.ingestion_index, 4);
        assert!((v.footprint.area() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_fields_take_precedence() {
        let candidate = SurveyCandidate {
            name: Some("240110_MP_S3_relleno".into()),
            structure: Some("ME".into()),
            date: Some("05-03-2024".into()),
            footprint: square(),
            ..Default::default()
        };
        let v = candidate.validate(0).unwrap();
        assert_eq!(v.structure, "ME");
        assert_eq!(v.date, DateField::Raw("05-03-2024".into()));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let no_id = SurveyCandidate {
            structure: Some("MP".into()),
            date: Some("2024-01-10".into()),
            footprint: square(),
            ..Default::default()
        };
        assert!(matches!(no_id.validate(0), Err(SurveyError::InvalidRecord { .. })));

        let no_structure = SurveyCandidate {
            id: Some("S1".into()),
            date: Some("2024-01-10".into()),
            footprint: square(),
            ..Default::default()
        };
        assert!(matches!(no_structure.validate(0), Err(SurveyError::InvalidRecord { .. })));

        let blank_date = SurveyCandidate {
            id: Some("S1".into()),
            structure: Some("MP".into()),
            date: Some("  ".into()),
            footprint: square(),
            ..Default::default()
        };
        assert!(matches!(blank_date.validate(0), Err(SurveyError::InvalidRecord { .. })));
    }

    #[test]
    fn test_degenerate_footprint_rejected() {
        let candidate = SurveyCandidate {
            id: Some("S1".into()),
            structure: Some("MP".into()),
            date: Some("2024-01-10".into()),
            footprint: vec![Point2D::new(0.0, 0.0), Point2D::new(1.0, 1.0), Point2D::new(0.0, 0.0)],
            ..Default::default()
        };
        assert!(matches!(candidate.validate(0), Err(SurveyError::InvalidFootprint { .. })));
    }

    #[test]
    fn test_metrics_from_diff() {
        let metrics = SurveyMetrics::insufficient();
        assert!(metrics.insufficient_data);
        assert_eq!(metrics.fill_volume, 0.0);
        assert_eq!(metrics.classification, None);
    }

    #[test]
    fn test_candidate_json() {
        let json = r#"{"name":"240305_MO_S1_arena","footprint":[{"x":0,"y":0},{"x":5,"y":0},{"x":5,"y":5}]}"#;
        let candidate: SurveyCandidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.structure_hint().as_deref(), Some("MO"));
        assert!(candidate.validate(0).is_ok());
    }
}
