// crates/tw_io/src/report.rs

//! 报告输出
//!
//! - 任意可序列化结构写为格式化 JSON
//! - 剖面序列写为 CSV：首列 `distance`，其后每个栅格角色一列

use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;
use tw_terrain::ProfileSeries;

use crate::error::{IoError, IoResult};

/// 写出格式化 JSON
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> IoResult<()> {
    ensure_parent(path)?;
    let content = serde_json::to_string_pretty(value).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, content).map_err(|e| IoError::file(path, e))
}

/// 剖面序列的 CSV 文本
pub fn profile_csv(series: &ProfileSeries) -> String {
    let mut out = String::from("distance");
    for role in series.elevations.keys() {
        out.push(',');
        out.push_str(role.label());
    }
    out.push('\n');

    for (i, d) in series.distances.iter().enumerate() {
        let _ = write!(out, "{d:.3}");
        for values in series.elevations.values() {
            match values.get(i) {
                Some(z) => {
                    let _ = write!(out, ",{z:.3}");
                }
                None => out.push(','),
            }
        }
        out.push('\n');
    }
    out
}

/// 写出剖面 CSV
pub fn write_profile_csv(series: &ProfileSeries, path: &Path) -> IoResult<()> {
    ensure_parent(path)?;
    std::fs::write(path, profile_csv(series)).map_err(|e| IoError::file(path, e))
}

fn ensure_parent(path: &Path) -> IoResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| IoError::file(parent, e))
        }
        _ => Ok(()),
    }
}
