// crates/tw_io/src/lib.rs

//! TerraWall IO 模块
//!
//! 提供数据输入输出功能。
//!
//! # 模块
//!
//! - [`ascii_grid`]: ESRI ASCII 栅格 (`.asc`) 读写，CRS 取自同名 `.prj`
//! - [`grid_file`]: 工作栅格二进制文件（魔数 + 版本 + CRC32，临时文件原子替换）
//! - [`manifest`]: 批处理清单（构筑物与测量列表）
//! - [`report`]: 报告 JSON 与剖面 CSV 输出
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use tw_io::{ascii_grid, grid_file::GridFile};
//!
//! let grid = ascii_grid::read_ascii_grid(Path::new("original_MP.asc"))?;
//! GridFile::new(grid).save(Path::new("work/MP_work.twg"))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ascii_grid;
pub mod error;
pub mod grid_file;
pub mod manifest;
pub mod report;

// 重导出常用类型
pub use ascii_grid::{read_ascii_grid, write_ascii_grid};
pub use error::{IoError, IoResult};
pub use grid_file::GridFile;
pub use manifest::{BatchManifest, ManifestSurvey, StructureEntry};
pub use report::{write_json, write_profile_csv};
