// crates/tw_workflow/src/report.rs

//! 批处理结果
//!
//! 结果总是按构筑物给出成功/失败/跳过的计数与逐条失败原因，
//! 不会退化为单个布尔值。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tw_survey::{
    BaseReference, ExtremePoints, FootprintDimensions, HistoricalSummary, ProvenanceEdge,
    RejectedSurvey, SurveyMetrics,
};
use tw_terrain::{DiffResult, MergeChangeReport, MergeReport, ProfileSeries};
use uuid::Uuid;

use crate::error::PipelineError;

/// 批处理运行ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// 创建新的运行ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// 获取内部UUID
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// 单条失败
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEntry {
    /// 测量 ID（入口拒绝时可能为空）
    pub survey: String,
    /// 错误类别
    pub kind: String,
    /// 错误信息
    pub message: String,
}

impl FailureEntry {
    /// 由管线错误构造
    pub fn from_error(survey: impl Into<String>, error: &PipelineError) -> Self {
        Self {
            survey: survey.into(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

impl From<&RejectedSurvey> for FailureEntry {
    fn from(rejected: &RejectedSurvey) -> Self {
        Self {
            survey: rejected.survey.clone(),
            kind: rejected.error.kind().to_string(),
            message: rejected.error.to_string(),
        }
    }
}

/// 单条测量的处理结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyOutcome {
    /// 测量 ID
    pub survey: String,
    /// 测量日期
    pub date: NaiveDate,
    /// 区段
    pub sector: Option<String>,
    /// 填筑材料
    pub material: Option<String>,
    /// 提交后的版本
    pub version: u64,
    /// 基准来源
    pub base_reference: BaseReference,
    /// 全部显著重叠的前序测量（按排名）
    pub predecessors: Vec<ProvenanceEdge>,
    /// 派生指标
    pub metrics: SurveyMetrics,
    /// 足迹尺寸
    pub dimensions: FootprintDimensions,
    /// 足迹极值点 P1..P4
    pub extremes: ExtremePoints,
    /// 差分诊断；数据不足时为空
    pub diff: Option<DiffResult>,
    /// 融合报告
    pub merge: MergeReport,
    /// 融合前后变化
    pub change: MergeChangeReport,
    /// 剖面序列（单独写出为 CSV）
    #[serde(skip)]
    pub profile: Option<ProfileSeries>,
    /// 剖面覆盖稀疏
    pub profile_sparse: bool,
    /// 是否自动赋予了 CRS
    pub crs_assigned: bool,
}

/// 构筑物处理状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StructureStatus {
    /// 队列处理完毕（允许有单条失败）
    Completed,
    /// 队列被致命错误中止
    Aborted {
        /// 错误类别
        kind: String,
        /// 错误信息
        message: String,
    },
}

impl StructureStatus {
    /// 是否中止
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// 单个构筑物的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureReport {
    /// 构筑物代码
    pub structure: String,
    /// 状态
    pub status: StructureStatus,
    /// 成功提交的测量数
    pub succeeded: usize,
    /// 失败的测量数（含入口拒绝）
    pub failed: usize,
    /// 因构筑物中止而未处理的测量数
    pub skipped: usize,
    /// 失败明细
    pub failures: Vec<FailureEntry>,
    /// 成功的测量（按处理顺序）
    pub surveys: Vec<SurveyOutcome>,
    /// 历史指标
    pub history: Vec<HistoricalSummary>,
    /// 最终版本
    pub final_version: u64,
}

impl StructureReport {
    /// 空报告
    pub fn new(structure: impl Into<String>) -> Self {
        Self {
            structure: structure.into(),
            status: StructureStatus::Completed,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            failures: Vec::new(),
            surveys: Vec::new(),
            history: Vec::new(),
            final_version: 0,
        }
    }

    /// 记录一条失败
    pub fn record_failure(&mut self, entry: FailureEntry) {
        self.failed += 1;
        self.failures.push(entry);
    }

    /// 按 ID 查找测量结果
    pub fn survey(&self, id: &str) -> Option<&SurveyOutcome> {
        self.surveys.iter().find(|s| s.survey == id)
    }
}

/// 批处理结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// 运行ID
    pub run_id: RunId,
    /// 开始时间
    pub started_at: DateTime<Utc>,
    /// 结束时间
    pub finished_at: DateTime<Utc>,
    /// 各构筑物结果（按代码排序）
    pub structures: Vec<StructureReport>,
    /// 无法归属到构筑物的拒绝记录
    pub unassigned: Vec<FailureEntry>,
}

impl BatchReport {
    /// 按代码查找构筑物结果
    pub fn structure(&self, code: &str) -> Option<&StructureReport> {
        self.structures.iter().find(|s| s.structure == code)
    }

    /// 成功总数
    pub fn total_succeeded(&self) -> usize {
        self.structures.iter().map(|s| s.succeeded).sum()
    }

    /// 失败总数（含无法归属的记录）
    pub fn total_failed(&self) -> usize {
        self.structures.iter().map(|s| s.failed).sum::<usize>() + self.unassigned.len()
    }

    /// 跳过总数
    pub fn total_skipped(&self) -> usize {
        self.structures.iter().map(|s| s.skipped).sum()
    }

    /// 运行时长 (秒)
    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
