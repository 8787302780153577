// crates/tw_survey/src/error.rs
//! 测量记录错误类型
//!
//! 这些错误都只影响单条测量：被拒绝的记录单独报告，不会中断批处理。

use thiserror::Error;
use tw_foundation::TwError;
use tw_geo::GeoError;

/// Survey 模块结果类型
pub type SurveyResult<T> = Result<T, SurveyError>;

/// 测量记录错误
#[derive(Error, Debug)]
pub enum SurveyError {
    /// 日期无法解析
    #[error("测量 {survey} 的日期无法解析: '{raw}'")]
    DateParse {
        /// 测量 ID
        survey: String,
        /// 原始日期字符串
        raw: String,
    },

    /// 测量名称不符合 `YYMMDD_<WALL>_S<n>_<material>`
    #[error("无效的测量名称 '{name}': {reason}")]
    InvalidName {
        /// 名称
        name: String,
        /// 原因
        reason: String,
    },

    /// 记录字段无效
    #[error("无效的测量记录 {survey}: {reason}")]
    InvalidRecord {
        /// 测量 ID（可能为空）
        survey: String,
        /// 原因
        reason: String,
    },

    /// 足迹几何无效
    #[error("测量 {survey} 的足迹无效: {source}")]
    InvalidFootprint {
        /// 测量 ID
        survey: String,
        /// 几何错误
        #[source]
        source: GeoError,
    },
}

impl From<SurveyError> for TwError {
    fn from(err: SurveyError) -> Self {
        match err {
            SurveyError::InvalidFootprint { survey, source } => {
                TwError::invalid_input(format!("测量 {survey} 的足迹无效: {source}"))
            }
            other => TwError::invalid_input(other.to_string()),
        }
    }
}

impl SurveyError {
    /// 创建日期解析错误
    pub fn date_parse(survey: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::DateParse {
            survey: survey.into(),
            raw: raw.into(),
        }
    }

    /// 创建名称错误
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// 创建记录错误
    pub fn invalid_record(survey: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            survey: survey.into(),
            reason: reason.into(),
        }
    }

    /// 错误类别名（用于报告）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DateParse { .. } => "DateParseError",
            Self::InvalidName { .. } => "InvalidName",
            Self::InvalidRecord { .. } => "InvalidRecord",
            Self::InvalidFootprint { .. } => "InvalidFootprint",
        }
    }
}
