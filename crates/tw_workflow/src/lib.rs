// crates/tw_workflow/src/lib.rs

//! TerraWall 工作流模块
//!
//! 把各层算法串成按构筑物顺序执行的批处理。
//!
//! # 模块结构
//!
//! - [`storage`]: 工作栅格存储后端（内存 / 文件）
//! - [`store`]: 累积地形状态存储 `WallStateStore`
//! - [`sources`]: 原始地形与测量面来源
//! - [`events`]: 事件系统
//! - [`runner`]: 批处理运行器
//! - [`report`]: 批处理结果
//! - [`error`]: 管线错误
//!
//! # 示例
//!
//! ```rust,ignore
//! use tw_workflow::{BatchRunner, FileGridStorage, ManifestSurfaces, WallStateStore};
//!
//! let manifest = BatchManifest::load(Path::new("batch.json"))?;
//! let store = Arc::new(WallStateStore::new(Arc::new(FileGridStorage::new("work")?)));
//! let surfaces = Arc::new(ManifestSurfaces::from_manifest(&manifest));
//! let runner = BatchRunner::new(PipelineConfig::default(), store, surfaces)?;
//!
//! let report = runner.run(&manifest.candidates(), &structures);
//! println!("成功 {} 条", report.total_succeeded());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod events;
pub mod report;
pub mod runner;
pub mod sources;
pub mod storage;
pub mod store;

// 重导出核心类型
pub use error::{PipelineError, PipelineResult};
pub use events::{EventDispatcher, EventListener, FnListener, LoggingListener, PipelineEvent};
pub use report::{
    BatchReport, FailureEntry, RunId, StructureReport, StructureStatus, SurveyOutcome,
};
pub use runner::{BatchRunner, StructureSpec};
pub use sources::{InMemorySurfaces, ManifestSurfaces, SurfaceProvider};
pub use storage::{FileGridStorage, GridStorage, MemoryGridStorage, StorageError};
pub use store::{WallSnapshot, WallStateStore};
