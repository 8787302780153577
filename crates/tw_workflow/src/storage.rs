// crates/tw_workflow/src/storage.rs

//! 工作栅格存储后端
//!
//! 每个构筑物的累积地形面以"整体替换"方式保存：`store` 返回时数据已写入并刷盘，
//! 随后的 `load` 读到的一定是最近一次提交的完整栅格。

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tw_io::{GridFile, IoError};
use tw_terrain::TerrainGrid;

/// 工作文件后缀
const WORK_SUFFIX: &str = "_work.twg";

/// 存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 工作栅格读写错误
    #[error("工作栅格错误: {0}")]
    GridFile(#[from] IoError),

    /// 构筑物代码不能用作文件名
    #[error("无效的构筑物代码: '{0}'")]
    InvalidKey(String),

    /// 其他错误
    #[error("{0}")]
    Other(String),
}

/// 工作栅格存储 trait
pub trait GridStorage: Send + Sync {
    /// 读取构筑物的工作栅格；尚未写入时返回 `None`
    fn load(&self, structure: &str) -> Result<Option<TerrainGrid>, StorageError>;

    /// 整体替换构筑物的工作栅格
    fn store(&self, structure: &str, grid: &TerrainGrid) -> Result<(), StorageError>;

    /// 删除构筑物的工作栅格
    fn remove(&self, structure: &str) -> Result<(), StorageError>;

    /// 已保存的构筑物代码
    fn structures(&self) -> Result<Vec<String>, StorageError>;

    /// 后端名称 (用于日志)
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryGridStorage {
    grids: RwLock<HashMap<String, TerrainGrid>>,
}

impl MemoryGridStorage {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 已保存的栅格数量
    pub fn len(&self) -> usize {
        self.grids.read().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.grids.read().is_empty()
    }
}

impl GridStorage for MemoryGridStorage {
    fn load(&self, structure: &str) -> Result<Option<TerrainGrid>, StorageError> {
        Ok(self.grids.read().get(structure).cloned())
    }

    fn store(&self, structure: &str, grid: &TerrainGrid) -> Result<(), StorageError> {
        self.grids.write().insert(structure.to_string(), grid.clone());
        Ok(())
    }

    fn remove(&self, structure: &str) -> Result<(), StorageError> {
        self.grids.write().remove(structure);
        Ok(())
    }

    fn structures(&self) -> Result<Vec<String>, StorageError> {
        let mut codes: Vec<String> = self.grids.read().keys().cloned().collect();
        codes.sort();
        Ok(codes)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// 文件存储
///
/// 每个构筑物一个文件 `<dir>/<structure>_work.twg`。
#[derive(Debug)]
pub struct FileGridStorage {
    /// 存储目录
    dir: PathBuf,
}

impl FileGridStorage {
    /// 创建新的文件存储
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// 获取存储目录
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// 构筑物工作文件路径
    pub fn grid_path(&self, structure: &str) -> Result<PathBuf, StorageError> {
        let valid = !structure.is_empty()
            && structure
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(structure.to_string()));
        }
        Ok(self.dir.join(format!("{structure}{WORK_SUFFIX}")))
    }
}

impl GridStorage for FileGridStorage {
    fn load(&self, structure: &str) -> Result<Option<TerrainGrid>, StorageError> {
        let path = self.grid_path(structure)?;
        match GridFile::load(&path) {
            Ok(file) => Ok(Some(file.into_grid())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, structure: &str, grid: &TerrainGrid) -> Result<(), StorageError> {
        let path = self.grid_path(structure)?;
        GridFile::new(grid.clone()).save(&path)?;
        Ok(())
    }

    fn remove(&self, structure: &str) -> Result<(), StorageError> {
        let path = self.grid_path(structure)?;
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn structures(&self) -> Result<Vec<String>, StorageError> {
        let mut codes = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(code) = name.to_str().and_then(|n| n.strip_suffix(WORK_SUFFIX)) {
                codes.push(code.to_string());
            }
        }
        codes.sort();
        Ok(codes)
    }

    fn name(&self) -> &str {
        "file"
    }
}
