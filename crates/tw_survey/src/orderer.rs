// crates/tw_survey/src/orderer.rs
//! 时间排序
//!
//! 将一个构筑物的待处理测量按日期升序排列；同日按入队顺序（稳定排序）。
//! 日期无法解析的记录被排除并逐条报告，不影响其他记录。

use crate::error::SurveyError;
use crate::record::{DateField, SurveyCandidate, SurveyRecord, ValidatedSurvey};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::warn;

/// 默认接受的日期格式
pub const DEFAULT_DATE_FORMATS: [&str; 2] = ["%d-%m-%Y", "%Y-%m-%d"];

/// 被拒绝的测量
#[derive(Debug)]
pub struct RejectedSurvey {
    /// 测量标识（可能为空）
    pub survey: String,
    /// 拒绝原因
    pub error: SurveyError,
}

/// 单个构筑物的有序队列
#[derive(Debug, Default)]
pub struct SurveyQueue {
    /// 按日期升序的记录
    pub records: Vec<SurveyRecord>,
    /// 被拒绝的记录
    pub rejected: Vec<RejectedSurvey>,
}

/// 入口分组结果
#[derive(Debug, Default)]
pub struct Ingestion {
    /// 构筑物代码 → 有序队列
    pub queues: BTreeMap<String, SurveyQueue>,
    /// 无法归属到任何构筑物的拒绝记录
    pub unassigned: Vec<RejectedSurvey>,
}

/// 测量排序器
#[derive(Debug, Clone)]
pub struct SurveyOrderer {
    date_formats: Vec<String>,
}

impl Default for SurveyOrderer {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_FORMATS.iter().map(|s| s.to_string()).collect())
    }
}

impl SurveyOrderer {
    /// 使用指定日期格式（按顺序尝试）创建
    pub fn new(date_formats: Vec<String>) -> Self {
        Self { date_formats }
    }

    /// 按配置格式解析日期
    pub fn parse_date(&self, raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        self.date_formats
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
    }

    /// 对单个构筑物的已校验记录排序
    pub fn order(&self, surveys: Vec<ValidatedSurvey>) -> SurveyQueue {
        let mut queue = SurveyQueue::default();

        for survey in surveys {
            let date = match &survey.date {
                DateField::Parsed(date) => Some(*date),
                DateField::Raw(raw) => self.parse_date(raw),
            };
            match date {
                Some(date) => queue.records.push(SurveyRecord::from_validated(survey, date)),
                None => {
                    let raw = match &survey.date {
                        DateField::Raw(raw) => raw.clone(),
                        DateField::Parsed(date) => date.to_string(),
                    };
                    warn!(survey = %survey.id, raw = %raw, "日期无法解析，测量被排除");
                    queue.rejected.push(RejectedSurvey {
                        survey: survey.id.clone(),
                        error: SurveyError::date_parse(survey.id, raw),
                    });
                }
            }
        }

        queue
            .records
            .sort_by(|a, b| a.date.cmp(&b.date).then(a.ingestion_index.cmp(&b.ingestion_index)));
        queue
    }

    /// 校验全部候选记录，按构筑物分组后排序
    ///
    /// 候选记录的入队顺序即其在输入中的位置。
    pub fn ingest(&self, candidates: &[SurveyCandidate]) -> Ingestion {
        let mut ingestion = Ingestion::default();
        let mut grouped: BTreeMap<String, Vec<ValidatedSurvey>> = BTreeMap::new();
        let mut early_rejects: BTreeMap<String, Vec<RejectedSurvey>> = BTreeMap::new();

        for (index, candidate) in candidates.iter().enumerate() {
            match candidate.validate(index) {
                Ok(survey) => grouped.entry(survey.structure.clone()).or_default().push(survey),
                Err(error) => {
                    let rejected = RejectedSurvey {
                        survey: candidate.label(),
                        error,
                    };
                    warn!(survey = %rejected.survey, error = %rejected.error, "测量记录被拒绝");
                    match candidate.structure_hint() {
                        Some(structure) => early_rejects.entry(structure).or_default().push(rejected),
                        None => ingestion.unassigned.push(rejected),
                    }
                }
            }
        }

        for (structure, surveys) in grouped {
            ingestion.queues.insert(structure, self.order(surveys));
        }
        for (structure, rejects) in early_rejects {
            ingestion
                .queues
                .entry(structure)
                .or_default()
                .rejected
                .extend(rejects);
        }
        ingestion
    }
}
