// crates/tw_workflow/src/sources.rs

//! 地形面来源
//!
//! 运行器只通过 [`SurfaceProvider`] 取得构筑物原始地形与各测量的测量面，
//! 不关心它们来自清单中的 `.asc` 文件还是内存。

use crate::error::{PipelineError, PipelineResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;
use tw_io::{read_ascii_grid, BatchManifest, IoError};
use tw_terrain::TerrainGrid;

/// 地形面来源 trait
pub trait SurfaceProvider: Send + Sync {
    /// 构筑物原始地形
    ///
    /// # Errors
    ///
    /// 无法取得时返回 [`PipelineError::MissingReference`]。
    fn original(&self, structure: &str) -> PipelineResult<TerrainGrid>;

    /// 测量面
    ///
    /// # Errors
    ///
    /// 无法取得时返回 [`PipelineError::Surface`]。
    fn surface(&self, survey: &str) -> PipelineResult<TerrainGrid>;

    /// 来源名称 (用于日志)
    fn name(&self) -> &str {
        "anonymous"
    }
}

fn not_found(path: PathBuf) -> IoError {
    IoError::file(
        path,
        std::io::Error::new(std::io::ErrorKind::NotFound, "未登记的地形面"),
    )
}

/// 内存来源
#[derive(Debug, Default)]
pub struct InMemorySurfaces {
    originals: RwLock<HashMap<String, TerrainGrid>>,
    surfaces: RwLock<HashMap<String, TerrainGrid>>,
}

impl InMemorySurfaces {
    /// 创建空来源
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记原始地形
    pub fn insert_original(&self, structure: impl Into<String>, grid: TerrainGrid) {
        self.originals.write().insert(structure.into(), grid);
    }

    /// 登记测量面
    pub fn insert_surface(&self, survey: impl Into<String>, grid: TerrainGrid) {
        self.surfaces.write().insert(survey.into(), grid);
    }

    /// 链式登记原始地形
    #[must_use]
    pub fn with_original(self, structure: impl Into<String>, grid: TerrainGrid) -> Self {
        self.insert_original(structure, grid);
        self
    }

    /// 链式登记测量面
    #[must_use]
    pub fn with_surface(self, survey: impl Into<String>, grid: TerrainGrid) -> Self {
        self.insert_surface(survey, grid);
        self
    }
}

impl SurfaceProvider for InMemorySurfaces {
    fn original(&self, structure: &str) -> PipelineResult<TerrainGrid> {
        self.originals
            .read()
            .get(structure)
            .cloned()
            .ok_or_else(|| PipelineError::missing_reference(structure, "未登记原始地形"))
    }

    fn surface(&self, survey: &str) -> PipelineResult<TerrainGrid> {
        self.surfaces
            .read()
            .get(survey)
            .cloned()
            .ok_or_else(|| PipelineError::Surface {
                survey: survey.to_string(),
                source: not_found(PathBuf::from(format!("memory://{survey}"))),
            })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// 清单来源：按清单中的路径读取 ESRI ASCII 栅格
#[derive(Debug, Clone, Default)]
pub struct ManifestSurfaces {
    originals: HashMap<String, PathBuf>,
    surfaces: HashMap<String, PathBuf>,
}

impl ManifestSurfaces {
    /// 由清单构造；没有 ID 与名称的测量不登记（会在入口校验时被拒绝）
    pub fn from_manifest(manifest: &BatchManifest) -> Self {
        let originals = manifest
            .structures
            .iter()
            .map(|s| (s.code.clone(), s.original.clone()))
            .collect();
        let surfaces = manifest
            .surveys
            .iter()
            .filter_map(|s| s.candidate.resolved_id().map(|id| (id, s.surface.clone())))
            .collect();
        Self {
            originals,
            surfaces,
        }
    }
}

impl SurfaceProvider for ManifestSurfaces {
    fn original(&self, structure: &str) -> PipelineResult<TerrainGrid> {
        let path = self
            .originals
            .get(structure)
            .ok_or_else(|| PipelineError::missing_reference(structure, "清单中没有该构筑物"))?;
        debug!(structure, path = %path.display(), "读取原始地形");
        read_ascii_grid(path).map_err(|e| PipelineError::missing_reference(structure, e.to_string()))
    }

    fn surface(&self, survey: &str) -> PipelineResult<TerrainGrid> {
        let path = self.surfaces.get(survey).ok_or_else(|| PipelineError::Surface {
            survey: survey.to_string(),
            source: not_found(PathBuf::from(survey)),
        })?;
        debug!(survey, path = %path.display(), "读取测量面");
        read_ascii_grid(path).map_err(|source| PipelineError::Surface {
            survey: survey.to_string(),
            source,
        })
    }

    fn name(&self) -> &str {
        "manifest"
    }
}
