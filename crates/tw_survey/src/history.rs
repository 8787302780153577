// crates/tw_survey/src/history.rs
//! 历史分析
//!
//! 在同一构筑物、同一区段的已提交记录上计算：
//! - 上一次干预日期（严格早于给定日期的最晚记录）
//! - 年增长（滑动窗口内平均厚度之和，窗口两端闭区间）
//! - 年土方量（窗口内填方、挖方及净量）
//!
//! 数据不足或尚无指标的记录不参与累计。

use crate::record::SurveyRecord;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// 默认窗口长度 [天]
pub const DEFAULT_GROWTH_WINDOW_DAYS: i64 = 365;

/// 窗口内土方量
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EarthMovement {
    /// 填方合计 [m³]
    pub fill: f64,
    /// 挖方合计 [m³]
    pub cut: f64,
    /// 净量 [m³]
    pub net: f64,
}

/// 单条记录的历史指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSummary {
    /// 测量 ID
    pub survey_id: String,
    /// 上一次干预日期
    pub last_intervention: Option<NaiveDate>,
    /// 年增长 [m]
    pub annual_growth: f64,
    /// 年土方量
    pub earth_movement: EarthMovement,
}

/// 历史分析器
#[derive(Debug, Clone)]
pub struct HistoryAnalyzer {
    window_days: i64,
}

impl Default for HistoryAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_GROWTH_WINDOW_DAYS)
    }
}

impl HistoryAnalyzer {
    /// 以窗口长度 [天] 创建
    pub fn new(window_days: i64) -> Self {
        Self { window_days }
    }

    /// 窗口长度
    pub fn window_days(&self) -> i64 {
        self.window_days
    }

    /// 上一次干预日期
    pub fn last_intervention(
        &self,
        records: &[SurveyRecord],
        structure: &str,
        sector: Option<&str>,
        date: NaiveDate,
    ) -> Option<NaiveDate> {
        same_place(records, structure, sector)
            .map(|r| r.date)
            .filter(|d| *d < date)
            .max()
    }

    /// 年增长：窗口 `[date - window, date]` 内平均厚度之和
    pub fn annual_growth(
        &self,
        records: &[SurveyRecord],
        structure: &str,
        sector: Option<&str>,
        date: NaiveDate,
    ) -> f64 {
        self.in_window(records, structure, sector, date)
            .filter_map(|r| r.metrics.as_ref())
            .filter(|m| !m.insufficient_data)
            .map(|m| m.mean_thickness)
            .sum()
    }

    /// 年土方量
    pub fn annual_earth_movement(
        &self,
        records: &[SurveyRecord],
        structure: &str,
        sector: Option<&str>,
        date: NaiveDate,
    ) -> EarthMovement {
        let (fill, cut) = self
            .in_window(records, structure, sector, date)
            .filter_map(|r| r.metrics.as_ref())
            .filter(|m| !m.insufficient_data)
            .fold((0.0, 0.0), |(f, c), m| (f + m.fill_volume, c + m.cut_volume));
        EarthMovement {
            fill,
            cut,
            net: fill - cut,
        }
    }

    /// 为全部记录生成历史指标（保持输入顺序）
    pub fn summarize(&self, records: &[SurveyRecord]) -> Vec<HistoricalSummary> {
        records
            .iter()
            .map(|r| {
                let sector = r.sector.as_deref();
                HistoricalSummary {
                    survey_id: r.id.clone(),
                    last_intervention: self.last_intervention(records, &r.structure, sector, r.date),
                    annual_growth: self.annual_growth(records, &r.structure, sector, r.date),
                    earth_movement: self.annual_earth_movement(records, &r.structure, sector, r.date),
                }
            })
            .collect()
    }

    fn in_window<'a>(
        &self,
        records: &'a [SurveyRecord],
        structure: &'a str,
        sector: Option<&'a str>,
        date: NaiveDate,
    ) -> impl Iterator<Item = &'a SurveyRecord> + 'a {
        let start = date - Duration::days(self.window_days);
        same_place(records, structure, sector).filter(move |r| r.date >= start && r.date <= date)
    }
}

fn same_place<'a>(
    records: &'a [SurveyRecord],
    structure: &'a str,
    sector: Option<&'a str>,
) -> impl Iterator<Item = &'a SurveyRecord> + 'a {
    records
        .iter()
        .filter(move |r| r.structure == structure && r.sector.as_deref() == sector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Footprint, SurveyMetrics};
    use tw_geo::Polygon;

    fn record(id: &str, sector: &str, date: (i32, u32, u32), fill: f64, cut: f64, mean: f64) -> SurveyRecord {
        SurveyRecord {
            id: id.into(),
            structure: "MP".into(),
            sector: Some(sector.into()),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            material: None,
            footprint: Footprint {
                survey_id: id.into(),
                structure: "MP".into(),
                sector: Some(sector.into()),
                polygon: Polygon::rectangle(0.0, 0.0, 1.0, 1.0).unwrap(),
                centerline: None,
            },
            ingestion_index: 0,
            metrics: Some(SurveyMetrics {
                fill_volume: fill,
                cut_volume: cut,
                mean_thickness: mean,
                min_thickness: None,
                max_thickness: None,
                classification: None,
                valid_cells: 1,
                insufficient_data: false,
            }),
            base_reference: None,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_last_intervention_is_strictly_before() {
        let records = vec![
            record("a", "SECTOR 1", (2023, 5, 1), 0.0, 0.0, 0.0),
            record("b", "SECTOR 1", (2024, 1, 10), 0.0, 0.0, 0.0),
            record("c", "SECTOR 2", (2024, 1, 5), 0.0, 0.0, 0.0),
        ];
        let h = HistoryAnalyzer::default();
        assert_eq!(
            h.last_intervention(&records, "MP", Some("SECTOR 1"), day(2024, 1, 10)),
            Some(day(2023, 5, 1))
        );
        assert_eq!(h.last_intervention(&records, "MP", Some("SECTOR 1"), day(2023, 5, 1)), None);
    }

    #[test]
    fn test_window_is_inclusive() {
        let records = vec![
            record("old", "SECTOR 1", (2023, 1, 9), 100.0, 0.0, 5.0),
            record("edge", "SECTOR 1", (2023, 1, 10), 10.0, 2.0, 0.5),
            record("now", "SECTOR 1", (2024, 1, 10), 20.0, 5.0, 1.0),
        ];
        // 2024 为闰年，2024-01-10 往前 365 天为 2023-01-10
        let h = HistoryAnalyzer::default();
        let growth = h.annual_growth(&records, "MP", Some("SECTOR 1"), day(2024, 1, 10));
        assert!((growth - 1.5).abs() < 1e-12);

        let movement = h.annual_earth_movement(&records, "MP", Some("SECTOR 1"), day(2024, 1, 10));
        assert_eq!(movement.fill, 30.0);
        assert_eq!(movement.cut, 7.0);
        assert_eq!(movement.net, 23.0);
    }

    #[test]
    fn test_insufficient_records_skipped() {
        let mut empty = record("x", "SECTOR 1", (2024, 1, 1), 0.0, 0.0, 0.0);
        empty.metrics = Some(SurveyMetrics::insufficient());
        let records = vec![empty, record("y", "SECTOR 1", (2024, 1, 2), 4.0, 0.0, 0.4)];
        let summaries = HistoryAnalyzer::default().summarize(&records);
        assert_eq!(summaries[1].last_intervention, Some(day(2024, 1, 1)));
        assert!((summaries[1].annual_growth - 0.4).abs() < 1e-12);
    }
}
