// crates/tw_config/src/lib.rs

//! TerraWall Config Layer (Layer 4)
//!
//! 批处理管线的全部可调参数。配置以 JSON 存储，所有字段都有默认值，
//! 加载后经 [`PipelineConfig::validate`] 校验，再转换为各算法层的参数结构。
//!
//! # 层级架构
//!
//! ```text
//! Layer 5: tw_cli       ─> 读取配置文件
//! Layer 4: tw_config    ─> PipelineConfig (本层)
//!          tw_workflow  ─> 使用 PipelineConfig 构建各阶段
//! Layer 3: tw_survey, tw_io
//! Layer 2: tw_geo, tw_terrain
//! Layer 1: tw_foundation
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod pipeline_config;

/// 层级标识
pub const LAYER: u8 = 4;

// 重导出核心类型
pub use error::ConfigError;
pub use pipeline_config::{
    DiffConfig, HistoryConfig, MergeConfig, PatchResample, PipelineConfig, ProfileConfig,
    ProvenanceConfig, RunConfig,
};
