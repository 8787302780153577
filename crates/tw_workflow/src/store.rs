// crates/tw_workflow/src/store.rs

//! 累积地形状态存储
//!
//! `WallStateStore` 按构筑物代码持有累积地形面、版本号与已提交足迹的历史，
//! 是唯一允许替换累积面的组件：
//!
//! - [`WallStateStore::current`] 每次都从存储后端读取最新提交的栅格，
//!   返回的快照是值，不会随后续提交改变
//! - [`WallStateStore::commit`] 校验快照版本后整体写入新栅格、版本加一并追加足迹；
//!   写入失败时状态保持不变
//!
//! 同一构筑物的提交由该构筑物自己的互斥锁串行化，不同构筑物互不阻塞。

use crate::error::{PipelineError, PipelineResult};
use crate::storage::GridStorage;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use tw_survey::{Footprint, HistoryEntry};
use tw_terrain::TerrainGrid;

/// 单个构筑物的状态
#[derive(Debug)]
struct WallState {
    /// 原始地形
    original: Arc<TerrainGrid>,
    /// 已提交次数
    version: u64,
    /// 已提交足迹（按处理顺序）
    history: Vec<HistoryEntry>,
}

/// 某一版本的累积面快照
#[derive(Debug, Clone)]
pub struct WallSnapshot {
    /// 构筑物代码
    pub structure: String,
    /// 版本（0 表示原始地形）
    pub version: u64,
    /// 累积地形面
    pub grid: TerrainGrid,
    /// 已提交足迹
    pub history: Vec<HistoryEntry>,
}

impl WallSnapshot {
    /// 是否仍为原始地形
    pub fn is_original(&self) -> bool {
        self.version == 0
    }
}

/// 累积地形状态存储
pub struct WallStateStore {
    storage: Arc<dyn GridStorage>,
    states: RwLock<HashMap<String, Arc<Mutex<WallState>>>>,
}

impl WallStateStore {
    /// 使用存储后端创建
    pub fn new(storage: Arc<dyn GridStorage>) -> Self {
        Self {
            storage,
            states: RwLock::new(HashMap::new()),
        }
    }

    /// 登记构筑物的原始地形，清除已有的工作栅格与历史
    pub fn initialize(&self, structure: &str, original: TerrainGrid) -> PipelineResult<()> {
        self.storage
            .remove(structure)
            .map_err(|e| PipelineError::io(structure, e))?;
        let state = WallState {
            original: Arc::new(original),
            version: 0,
            history: Vec::new(),
        };
        self.states
            .write()
            .insert(structure.to_string(), Arc::new(Mutex::new(state)));
        info!(structure, backend = self.storage.name(), "构筑物状态已初始化");
        Ok(())
    }

    /// 构筑物是否已登记
    pub fn contains(&self, structure: &str) -> bool {
        self.states.read().contains_key(structure)
    }

    /// 已登记的构筑物代码
    pub fn structures(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.states.read().keys().cloned().collect();
        codes.sort();
        codes
    }

    fn state(&self, structure: &str) -> PipelineResult<Arc<Mutex<WallState>>> {
        self.states
            .read()
            .get(structure)
            .cloned()
            .ok_or_else(|| PipelineError::missing_reference(structure, "构筑物未登记原始地形"))
    }

    /// 原始地形
    pub fn original(&self, structure: &str) -> PipelineResult<Arc<TerrainGrid>> {
        let state = self.state(structure)?;
        let original = Arc::clone(&state.lock().original);
        Ok(original)
    }

    /// 当前版本
    pub fn version(&self, structure: &str) -> PipelineResult<u64> {
        let state = self.state(structure)?;
        let version = state.lock().version;
        Ok(version)
    }

    /// 当前累积面快照
    ///
    /// 尚未提交过时返回原始地形与空历史。
    pub fn current(&self, structure: &str) -> PipelineResult<WallSnapshot> {
        let state = self.state(structure)?;
        let state = state.lock();

        let grid = if state.version == 0 {
            (*state.original).clone()
        } else {
            self.storage
                .load(structure)
                .map_err(|e| PipelineError::io(structure, e))?
                .ok_or_else(|| {
                    PipelineError::missing_reference(
                        structure,
                        format!("版本 {} 的工作栅格不存在", state.version),
                    )
                })?
        };

        Ok(WallSnapshot {
            structure: structure.to_string(),
            version: state.version,
            grid,
            history: state.history.clone(),
        })
    }

    /// 提交新的累积面
    ///
    /// `expected_version` 必须等于读取快照时的版本。成功时返回新版本号。
    pub fn commit(
        &self,
        structure: &str,
        expected_version: u64,
        grid: &TerrainGrid,
        footprint: Footprint,
    ) -> PipelineResult<u64> {
        let state = self.state(structure)?;
        let mut state = state.lock();

        if state.version != expected_version {
            return Err(PipelineError::StaleVersion {
                structure: structure.to_string(),
                expected: expected_version,
                actual: state.version,
            });
        }

        self.storage
            .store(structure, grid)
            .map_err(|e| PipelineError::io(structure, e))?;

        let processed_index = state.history.len();
        state.version += 1;
        state.history.push(HistoryEntry {
            footprint,
            processed_index,
        });
        debug!(structure, version = state.version, "累积面已提交");
        Ok(state.version)
    }
}

impl std::fmt::Debug for WallStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WallStateStore")
            .field("backend", &self.storage.name())
            .field("structures", &self.structures())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryGridStorage;
    use tw_geo::Polygon;
    use tw_terrain::GridGeometry;

    fn grid(value: f64) -> TerrainGrid {
        TerrainGrid::filled(GridGeometry::new(0.0, 10.0, 1.0, 1.0, 10, 10).unwrap(), value)
    }

    fn footprint(id: &str) -> Footprint {
        Footprint {
            survey_id: id.into(),
            structure: "MP".into(),
            sector: None,
            polygon: Polygon::rectangle(0.0, 0.0, 5.0, 5.0).unwrap(),
            centerline: None,
        }
    }

    fn store() -> WallStateStore {
        WallStateStore::new(Arc::new(MemoryGridStorage::new()))
    }

    #[test]
    fn test_first_use_returns_original() {
        let store = store();
        store.initialize("MP", grid(100.0)).unwrap();

        let snap = store.current("MP").unwrap();
        assert!(snap.is_original());
        assert!(snap.history.is_empty());
        assert_eq!(snap.grid.value(0, 0), Some(100.0));
    }

    #[test]
    fn test_unknown_structure_is_missing_reference() {
        let err = store().current("MO").unwrap_err();
        assert!(matches!(err, PipelineError::MissingReference { .. }));
        assert!(err.is_fatal_for_structure());
    }

    #[test]
    fn test_commit_advances_version_and_history() {
        let store = store();
        store.initialize("MP", grid(100.0)).unwrap();

        let snap = store.current("MP").unwrap();
        let v1 = store.commit("MP", snap.version, &grid(101.0), footprint("A")).unwrap();
        assert_eq!(v1, 1);

        let snap = store.current("MP").unwrap();
        assert_eq!(snap.grid.value(0, 0), Some(101.0));
        assert_eq!(snap.history.len(), 1);
        assert_eq!(snap.history[0].processed_index, 0);

        let v2 = store.commit("MP", snap.version, &grid(102.0), footprint("B")).unwrap();
        assert_eq!(v2, 2);
        assert_eq!(store.current("MP").unwrap().history[1].processed_index, 1);
        // 原始地形不受提交影响
        assert_eq!(store.original("MP").unwrap().value(0, 0), Some(100.0));
    }

    #[test]
    fn test_stale_snapshot_rejected() {
        let store = store();
        store.initialize("MP", grid(100.0)).unwrap();
        let stale = store.current("MP").unwrap();
        store.commit("MP", stale.version, &grid(101.0), footprint("A")).unwrap();

        let err = store
            .commit("MP", stale.version, &grid(99.0), footprint("B"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::StaleVersion { expected: 0, actual: 1, .. }));
        assert_eq!(store.current("MP").unwrap().grid.value(0, 0), Some(101.0));
    }

    #[test]
    fn test_snapshot_is_a_value() {
        let store = store();
        store.initialize("MP", grid(100.0)).unwrap();
        let before = store.current("MP").unwrap();
        store.commit("MP", 0, &grid(105.0), footprint("A")).unwrap();
        assert_eq!(before.grid.value(0, 0), Some(100.0));
        assert_eq!(before.version, 0);
    }
}
