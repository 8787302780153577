// crates/tw_workflow/src/error.rs

//! 管线错误类型
//!
//! 错误按影响范围分为两类：
//!
//! - 单条测量：记录失败并继续处理该构筑物的后续测量
//! - 整个构筑物：停止该构筑物的剩余队列，已提交的结果保持有效，
//!   其他构筑物不受影响

use crate::storage::StorageError;
use thiserror::Error;
use tw_config::ConfigError;
use tw_foundation::TwError;
use tw_io::IoError;
use tw_survey::SurveyError;
use tw_terrain::TerrainError;

/// 管线结果类型
pub type PipelineResult<T> = Result<T, PipelineError>;

/// 管线错误
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 构筑物没有可用的原始/基准地形
    #[error("构筑物 {structure} 缺少基准地形: {reason}")]
    MissingReference {
        /// 构筑物代码
        structure: String,
        /// 原因
        reason: String,
    },

    /// 测量面与累积面的 CRS 不一致且都已定义
    #[error("测量 {survey} 的 CRS ({patch}) 与构筑物累积面 ({base}) 不一致")]
    CrsMismatch {
        /// 测量 ID
        survey: String,
        /// 测量面 CRS
        patch: String,
        /// 累积面 CRS
        base: String,
    },

    /// 工作栅格读写失败
    #[error("构筑物 {structure} 的工作栅格读写失败: {source}")]
    Io {
        /// 构筑物代码
        structure: String,
        /// 存储错误
        #[source]
        source: StorageError,
    },

    /// 提交时版本已前进（另一次提交先完成）
    #[error("构筑物 {structure} 版本冲突: 期望 {expected}, 实际 {actual}")]
    StaleVersion {
        /// 构筑物代码
        structure: String,
        /// 读取时的版本
        expected: u64,
        /// 当前版本
        actual: u64,
    },

    /// 测量面无法读取
    #[error("测量 {survey} 的测量面无法读取: {source}")]
    Surface {
        /// 测量 ID
        survey: String,
        /// IO 错误
        #[source]
        source: IoError,
    },

    /// 栅格算法错误
    #[error("测量 {survey} 处理失败: {source}")]
    Terrain {
        /// 测量 ID
        survey: String,
        /// 地形错误
        #[source]
        source: TerrainError,
    },

    /// 测量记录错误
    #[error("测量记录错误: {0}")]
    Survey(#[from] SurveyError),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 基础层错误
    #[error("基础层错误: {0}")]
    Foundation(#[from] TwError),
}

impl PipelineError {
    /// 创建缺少基准错误
    pub fn missing_reference(structure: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MissingReference {
            structure: structure.into(),
            reason: reason.into(),
        }
    }

    /// 包装存储错误
    pub fn io(structure: impl Into<String>, source: StorageError) -> Self {
        Self::Io {
            structure: structure.into(),
            source,
        }
    }

    /// 包装地形错误
    pub fn terrain(survey: impl Into<String>, source: TerrainError) -> Self {
        Self::Terrain {
            survey: survey.into(),
            source,
        }
    }

    /// 是否使整个构筑物的剩余队列停止
    pub fn is_fatal_for_structure(&self) -> bool {
        matches!(
            self,
            Self::MissingReference { .. } | Self::Io { .. } | Self::StaleVersion { .. }
        )
    }

    /// 错误类别名（用于报告）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingReference { .. } => "MissingReferenceError",
            Self::CrsMismatch { .. } => "CRSMismatchError",
            Self::Io { .. } => "IOError",
            Self::StaleVersion { .. } => "StaleVersion",
            Self::Surface { .. } => "SurfaceUnreadable",
            Self::Terrain { .. } => "TerrainError",
            Self::Survey(e) => e.kind(),
            Self::Config(_) => "ConfigError",
            Self::Foundation(_) => "InternalError",
        }
    }
}

impl From<PipelineError> for TwError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Surface { source, .. } => source.into(),
            PipelineError::Terrain { source, .. } => source.into(),
            PipelineError::Survey(e) => e.into(),
            PipelineError::Config(e) => e.into(),
            PipelineError::Foundation(e) => e,
            PipelineError::MissingReference { structure, reason } => {
                TwError::state(structure, reason)
            }
            PipelineError::Io { structure, source } => {
                TwError::state(structure, source.to_string())
            }
            PipelineError::StaleVersion {
                structure,
                expected,
                actual,
            } => TwError::state(structure, format!("版本冲突: 读取 {expected}, 当前 {actual}")),
            other @ PipelineError::CrsMismatch { .. } => TwError::crs(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_classification() {
        assert!(PipelineError::missing_reference("MP", "无原始地形").is_fatal_for_structure());
        assert!(PipelineError::io("MP", StorageError::Other("磁盘已满".into())).is_fatal_for_structure());

        let mismatch = PipelineError::CrsMismatch {
            survey: "S1".into(),
            patch: "EPSG:32719".into(),
            base: "EPSG:4326".into(),
        };
        assert!(!mismatch.is_fatal_for_structure());
        assert_eq!(mismatch.kind(), "CRSMismatchError");

        let survey: PipelineError = SurveyError::date_parse("S2", "ayer").into();
        assert!(!survey.is_fatal_for_structure());
        assert_eq!(survey.kind(), "DateParseError");
    }

    #[test]
    fn test_into_foundation() {
        let err: TwError = PipelineError::StaleVersion {
            structure: "MP".into(),
            expected: 2,
            actual: 3,
        }
        .into();
        assert!(err.invalidates_state());

        let err: TwError = PipelineError::missing_reference("ME", "无原始地形").into();
        assert!(err.invalidates_state());
    }
}
