// crates/tw_io/src/grid_file.rs

//! 工作栅格文件
//!
//! 每个构筑物的累积地形面在批处理期间保存为一个工作文件，
//! 每次提交整体替换：先写临时文件并刷盘，再原子重命名。
//!
//! # 文件格式 (v1)
//!
//! ```text
//! [魔数: 4 bytes] "TWGR"
//! [版本: u32]
//! [原点 x: f64] [原点 y: f64]
//! [像素宽: f64] [像素高: f64]
//! [列数: u64] [行数: u64]
//! [无数据值: f64]
//! [CRS 长度: u32] [CRS 文本: UTF-8]   (长度 0 表示未定义)
//! [高程数据: W*H * f64]
//! [CRC32: u32]
//! ```
//!
//! 所有数值均为小端序。

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;
use tw_geo::CrsDefinition;
use tw_terrain::{GridGeometry, TerrainGrid};

use crate::error::{IoError, IoResult};

// ============================================================
// 常量
// ============================================================

/// 工作栅格文件格式版本
const GRID_FILE_VERSION: u32 = 1;

/// 工作栅格魔数
const GRID_FILE_MAGIC: &[u8; 4] = b"TWGR";

/// 最小文件长度：魔数 + 版本 + 几何 + 无数据值 + CRS 长度 + CRC
const MIN_FILE_LEN: usize = 4 + 4 + 4 * 8 + 2 * 8 + 8 + 4 + 4;

// ============================================================
// 工作栅格文件
// ============================================================

/// 工作栅格文件
#[derive(Debug, Clone)]
pub struct GridFile {
    /// 版本号
    pub version: u32,
    /// 栅格
    pub grid: TerrainGrid,
}

impl GridFile {
    /// 包装栅格
    pub fn new(grid: TerrainGrid) -> Self {
        Self {
            version: GRID_FILE_VERSION,
            grid,
        }
    }

    /// 编码为字节（含 CRC）
    pub fn encode(&self) -> Vec<u8> {
        let grid = &self.grid;
        let g = grid.geometry();
        let crs = grid.crs().map(ToString::to_string).unwrap_or_default();

        let mut data = Vec::with_capacity(MIN_FILE_LEN + crs.len() + grid.data().len() * 8);
        data.extend_from_slice(GRID_FILE_MAGIC);
        data.extend_from_slice(&self.version.to_le_bytes());

        // 几何
        data.extend_from_slice(&g.origin_x.to_le_bytes());
        data.extend_from_slice(&g.origin_y.to_le_bytes());
        data.extend_from_slice(&g.pixel_width.to_le_bytes());
        data.extend_from_slice(&g.pixel_height.to_le_bytes());
        data.extend_from_slice(&(g.width as u64).to_le_bytes());
        data.extend_from_slice(&(g.height as u64).to_le_bytes());
        data.extend_from_slice(&grid.nodata().to_le_bytes());

        // CRS
        data.extend_from_slice(&(crs.len() as u32).to_le_bytes());
        data.extend_from_slice(crs.as_bytes());

        // 高程
        for &z in grid.data() {
            data.extend_from_slice(&z.to_le_bytes());
        }

        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        data
    }

    /// 从字节解码
    ///
    /// `path` 仅用于错误信息。
    pub fn decode(bytes: &[u8], path: &Path) -> IoResult<Self> {
        if bytes.len() < MIN_FILE_LEN {
            return Err(IoError::corrupted(path, "文件太小"));
        }

        // 分离 CRC
        let crc_offset = bytes.len() - 4;
        let (data, crc_bytes) = bytes.split_at(crc_offset);
        let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let computed = compute_crc32(data);
        if stored != computed {
            return Err(IoError::Checksum {
                path: path.to_path_buf(),
                expected: stored,
                found: computed,
            });
        }

        let mut cursor = Cursor { data, offset: 0, path };

        if &cursor.take::<4>()? != GRID_FILE_MAGIC {
            return Err(IoError::corrupted(path, "无效的工作栅格文件格式"));
        }
        let version = u32::from_le_bytes(cursor.take()?);
        if version > GRID_FILE_VERSION {
            return Err(IoError::Version {
                file: version,
                current: GRID_FILE_VERSION,
            });
        }

        let origin_x = f64::from_le_bytes(cursor.take()?);
        let origin_y = f64::from_le_bytes(cursor.take()?);
        let pixel_width = f64::from_le_bytes(cursor.take()?);
        let pixel_height = f64::from_le_bytes(cursor.take()?);
        let width = u64::from_le_bytes(cursor.take()?) as usize;
        let height = u64::from_le_bytes(cursor.take()?) as usize;
        let nodata = f64::from_le_bytes(cursor.take()?);
        let geometry = GridGeometry::new(origin_x, origin_y, pixel_width, pixel_height, width, height)?;

        let crs_len = u32::from_le_bytes(cursor.take()?) as usize;
        let crs = if crs_len == 0 {
            None
        } else {
            let text = std::str::from_utf8(cursor.slice(crs_len)?)
                .map_err(|_| IoError::corrupted(path, "CRS 文本不是 UTF-8"))?;
            Some(CrsDefinition::parse(text).map_err(|e| IoError::corrupted(path, e.to_string()))?)
        };

        let n_cells = geometry.cell_count();
        if cursor.remaining() != n_cells * 8 {
            return Err(IoError::corrupted(
                path,
                format!("高程数据长度 {} 与 {n_cells} 个单元不符", cursor.remaining()),
            ));
        }
        let mut values = Vec::with_capacity(n_cells);
        for _ in 0..n_cells {
            values.push(f64::from_le_bytes(cursor.take()?));
        }

        Ok(Self {
            version,
            grid: TerrainGrid::new(geometry, nodata, values)?.with_crs(crs),
        })
    }

    /// 保存到文件（临时文件 + 刷盘 + 原子重命名）
    pub fn save(&self, path: &Path) -> IoResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| IoError::file(parent, e))?;
            }
        }

        let temp_path = path.with_extension("twg.tmp");
        {
            let file = File::create(&temp_path).map_err(|e| IoError::file(&temp_path, e))?;
            let mut writer = BufWriter::new(file);
            writer
                .write_all(&self.encode())
                .map_err(|e| IoError::file(&temp_path, e))?;
            writer.flush().map_err(|e| IoError::file(&temp_path, e))?;
            writer
                .get_ref()
                .sync_all()
                .map_err(|e| IoError::file(&temp_path, e))?;
        }

        std::fs::rename(&temp_path, path).map_err(|e| IoError::file(path, e))?;
        debug!(path = %path.display(), cells = self.grid.data().len(), "工作栅格已写入");
        Ok(())
    }

    /// 从文件加载
    pub fn load(path: &Path) -> IoResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| IoError::file(path, e))?;
        Self::decode(&bytes, path)
    }

    /// 取出栅格
    pub fn into_grid(self) -> TerrainGrid {
        self.grid
    }
}

/// 顺序读取游标
struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
    path: &'a Path,
}

impl<'a> Cursor<'a> {
    fn slice(&mut self, len: usize) -> IoResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| IoError::corrupted(self.path, "数据意外结束"))?;
        let out = &self.data[self.offset..end];
        self.offset = end;
        Ok(out)
    }

    fn take<const N: usize>(&mut self) -> IoResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.slice(N)?);
        Ok(out)
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }
}

/// 计算 CRC32 校验和（IEEE 多项式）
fn compute_crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        let index = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = CRC32_TABLE[index] ^ (crc >> 8);
    }
    !crc
}

/// 生成 CRC32 查找表（编译期计算）
const fn generate_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = 0xEDB8_8320 ^ (crc >> 1);
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC32 查找表
const CRC32_TABLE: [u32; 256] = generate_crc32_table();

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid() -> TerrainGrid {
        let geometry = GridGeometry::new(500.0, 1000.0, 0.5, 0.5, 4, 3).unwrap();
        TerrainGrid::from_fn(geometry, |r, c| (r != 1 || c != 2).then(|| (r * 4 + c) as f64))
            .with_crs(Some(CrsDefinition::Epsg(32719)))
    }

    #[test]
    fn test_crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_encode_decode() {
        let file = GridFile::new(sample_grid());
        let decoded = GridFile::decode(&file.encode(), Path::new("mem.twg")).unwrap();
        assert_eq!(decoded.grid.geometry(), file.grid.geometry());
        assert_eq!(decoded.grid.data(), file.grid.data());
        assert_eq!(decoded.grid.crs(), Some(&CrsDefinition::Epsg(32719)));
        assert_eq!(decoded.grid.value(1, 2), None);
    }

    #[test]
    fn test_corruption_detected() {
        let mut bytes = GridFile::new(sample_grid()).encode();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        assert!(matches!(
            GridFile::decode(&bytes, Path::new("bad.twg")),
            Err(IoError::Checksum { .. })
        ));

        assert!(matches!(
            GridFile::decode(&bytes[..10], Path::new("short.twg")),
            Err(IoError::GridFileCorruption { .. })
        ));
    }

    #[test]
    fn test_atomic_save_and_load() {
        let dir = std::env::temp_dir().join(format!("tw_io_twg_{}", std::process::id()));
        let path = dir.join("MP_work.twg");
        GridFile::new(sample_grid()).save(&path).unwrap();

        assert!(!path.with_extension("twg.tmp").exists());
        let loaded = GridFile::load(&path).unwrap().into_grid();
        std::fs::remove_dir_all(&dir).ok();
        assert_eq!(loaded.valid_count(), 11);
    }

    #[test]
    fn test_missing_file() {
        let err = GridFile::load(Path::new("/nonexistent/tw/none.twg")).unwrap_err();
        assert!(err.is_not_found());
    }
}
