// crates/tw_foundation/src/lib.rs

//! TerraWall Foundation Layer
//!
//! 基础层，提供整个项目共享的错误类型和数值容差。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `TwError` 与 `TwResult`
//! - [`tolerance`]: 高程比较与几何计算使用的容差

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod tolerance;

// 重导出常用类型
pub use error::{TwError, TwResult};
pub use tolerance::Tolerance;
