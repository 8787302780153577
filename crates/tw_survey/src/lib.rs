// crates/tw_survey/src/lib.rs

//! 测量记录处理
//!
//! 外部测量记录在入口处校验为强类型记录，按构筑物分组并按时间排序；
//! 每条测量处理时解析其出处（被覆盖的前序测量），提交后参与历史分析。
//!
//! # 模块
//!
//! - `naming`: 现场名称 `YYMMDD_<WALL>_S<n>_<material>` 解析
//! - `record`: 候选记录、校验与 `SurveyRecord`
//! - `dimensions`: 足迹尺寸（面积、平均宽度、长度）与极值点 P1..P4
//! - `orderer`: 时间排序 `SurveyOrderer`
//! - `provenance`: 出处解析 `ProvenanceResolver`
//! - `history`: 历史分析（上次干预、年增长、年土方量）

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dimensions;
pub mod error;
pub mod history;
pub mod naming;
pub mod orderer;
pub mod provenance;
pub mod record;

// 重导出常用类型
pub use dimensions::{ExtremePoints, FootprintDimensions, FootprintVertex, WIDTH_TRANSECTS};
pub use error::{SurveyError, SurveyResult};
pub use history::{EarthMovement, HistoricalSummary, HistoryAnalyzer, DEFAULT_GROWTH_WINDOW_DAYS};
pub use naming::{parse_survey_name, wall_display_name, SurveyName};
pub use orderer::{Ingestion, RejectedSurvey, SurveyOrderer, SurveyQueue, DEFAULT_DATE_FORMATS};
pub use provenance::{HistoryEntry, Provenance, ProvenanceEdge, ProvenanceResolver};
pub use record::{
    BaseReference, DateField, Footprint, SurveyCandidate, SurveyMetrics, SurveyRecord,
    ValidatedSurvey,
};
