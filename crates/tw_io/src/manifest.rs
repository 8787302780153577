// crates/tw_io/src/manifest.rs

//! 批处理清单
//!
//! 清单以 JSON 描述一次批处理的全部输入：
//!
//! ```json
//! {
//!   "structures": [
//!     { "code": "MP", "original": "grids/MP_original.asc", "epsg": 32719 }
//!   ],
//!   "surveys": [
//!     {
//!       "name": "240110_MP_S3_relleno",
//!       "surface": "grids/240110_MP_S3.asc",
//!       "footprint": [{"x": 0, "y": 0}, {"x": 10, "y": 0}, {"x": 10, "y": 10}]
//!     }
//!   ]
//! }
//! ```
//!
//! 相对路径以清单文件所在目录为基准解析。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use tw_geo::CrsDefinition;
use tw_survey::SurveyCandidate;

use crate::error::{IoError, IoResult};

/// 构筑物条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureEntry {
    /// 构筑物代码
    pub code: String,
    /// 原始地形栅格
    pub original: PathBuf,
    /// 规范 EPSG 代码；缺省时使用配置中的值
    #[serde(default)]
    pub epsg: Option<u32>,
}

impl StructureEntry {
    /// 规范 CRS
    pub fn canonical_crs(&self) -> Option<CrsDefinition> {
        self.epsg.map(CrsDefinition::Epsg)
    }
}

/// 测量条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestSurvey {
    /// 候选记录字段
    #[serde(flatten)]
    pub candidate: SurveyCandidate,
    /// 测量面栅格
    pub surface: PathBuf,
}

/// 批处理清单
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchManifest {
    /// 构筑物
    #[serde(default)]
    pub structures: Vec<StructureEntry>,
    /// 测量（顺序即入队顺序）
    #[serde(default)]
    pub surveys: Vec<ManifestSurvey>,
}

impl BatchManifest {
    /// 从文件加载并解析相对路径
    pub fn load(path: &Path) -> IoResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| IoError::file(path, e))?;
        let mut manifest: Self = serde_json::from_str(&content).map_err(|source| IoError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            manifest.resolve_relative(base);
        }
        info!(
            path = %path.display(),
            structures = manifest.structures.len(),
            surveys = manifest.surveys.len(),
            "清单已加载"
        );
        Ok(manifest)
    }

    /// 保存到文件
    pub fn save(&self, path: &Path) -> IoResult<()> {
        crate::report::write_json(self, path)
    }

    /// 将相对路径解析到 `base` 下
    pub fn resolve_relative(&mut self, base: &Path) {
        for s in &mut self.structures {
            s.original = join_relative(base, &s.original);
        }
        for s in &mut self.surveys {
            s.surface = join_relative(base, &s.surface);
        }
    }

    /// 按代码查找构筑物
    pub fn structure(&self, code: &str) -> Option<&StructureEntry> {
        self.structures.iter().find(|s| s.code == code)
    }

    /// 全部候选记录（按清单顺序）
    pub fn candidates(&self) -> Vec<SurveyCandidate> {
        self.surveys.iter().map(|s| s.candidate.clone()).collect()
    }
}

fn join_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "structures": [
            {"code": "MP", "original": "grids/MP.asc", "epsg": 32719},
            {"code": "ME", "original": "/data/ME.asc"}
        ],
        "surveys": [
            {
                "name": "240110_MP_S3_relleno",
                "surface": "s1.asc",
                "footprint": [{"x": 0, "y": 0}, {"x": 10, "y": 0}, {"x": 10, "y": 10}]
            },
            {
                "id": "extra",
                "structure": "ME",
                "date": "05-03-2024",
                "material": "arena",
                "surface": "s2.asc",
                "footprint": [{"x": 0, "y": 0}, {"x": 5, "y": 0}, {"x": 5, "y": 5}],
                "centerline": [{"x": 0, "y": 2.5}, {"x": 5, "y": 2.5}]
            }
        ]
    }"#;

    #[test]
    fn test_parse_and_resolve() {
        let mut manifest: BatchManifest = serde_json::from_str(MANIFEST).unwrap();
        manifest.resolve_relative(Path::new("/batch"));

        assert_eq!(manifest.structures[0].original, PathBuf::from("/batch/grids/MP.asc"));
        assert_eq!(manifest.structures[1].original, PathBuf::from("/data/ME.asc"));
        assert_eq!(manifest.structure("MP").and_then(|s| s.canonical_crs()), Some(CrsDefinition::Epsg(32719)));
        assert_eq!(manifest.surveys[0].surface, PathBuf::from("/batch/s1.asc"));

        let candidates = manifest.candidates();
        assert_eq!(candidates[0].name.as_deref(), Some("240110_MP_S3_relleno"));
        assert_eq!(candidates[1].structure.as_deref(), Some("ME"));
        assert!(candidates[1].centerline.is_some());
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("tw_io_manifest_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("batch.json");
        std::fs::write(&path, MANIFEST).unwrap();

        let manifest = BatchManifest::load(&path).unwrap();
        std::fs::remove_dir_all(&dir).ok();
        assert_eq!(manifest.surveys[1].surface, dir.join("s2.asc"));
    }

    #[test]
    fn test_invalid_json() {
        let dir = std::env::temp_dir().join(format!("tw_io_manifest_bad_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("batch.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = BatchManifest::load(&path).unwrap_err();
        std::fs::remove_dir_all(&dir).ok();
        assert!(matches!(err, IoError::Json { .. }));
    }
}
