// crates/tw_io/src/ascii_grid.rs

//! ESRI ASCII 栅格读写
//!
//! 支持的头部关键字（不区分大小写）：
//!
//! ```text
//! ncols         4
//! nrows         3
//! xllcorner     500000.0     (或 xllcenter)
//! yllcorner     6200000.0    (或 yllcenter)
//! cellsize      0.5          (或 dx / dy 分别给出)
//! NODATA_value  -9999        (可选)
//! ```
//!
//! 其后按行（北到南）列出 `nrows × ncols` 个高程值。
//! CRS 从同名 `.prj` 文件读取；写出时若栅格带有 CRS 也一并写出 `.prj`。

use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, warn};
use tw_geo::CrsDefinition;
use tw_terrain::{GridGeometry, TerrainGrid, DEFAULT_NODATA};

use crate::error::{IoError, IoResult};

/// 解析得到的头部
#[derive(Debug, Default)]
struct Header {
    ncols: Option<usize>,
    nrows: Option<usize>,
    xll: Option<(f64, bool)>,
    yll: Option<(f64, bool)>,
    cellsize: Option<f64>,
    dx: Option<f64>,
    dy: Option<f64>,
    nodata: Option<f64>,
}

/// 读取 ESRI ASCII 栅格
///
/// # 错误
///
/// - 文件读取失败
/// - 头部缺项或数值非法
/// - 数据个数与 `nrows × ncols` 不符
pub fn read_ascii_grid(path: &Path) -> IoResult<TerrainGrid> {
    let content = std::fs::read_to_string(path).map_err(|e| IoError::file(path, e))?;
    let grid = parse_ascii_grid(&content, path)?;
    let crs = read_prj(path);
    debug!(
        path = %path.display(),
        width = grid.width(),
        height = grid.height(),
        crs = ?crs.as_ref().map(ToString::to_string),
        "读取 ASCII 栅格"
    );
    Ok(grid.with_crs(crs))
}

/// 从字符串解析 ESRI ASCII 栅格
///
/// `source` 仅用于错误信息。
pub fn parse_ascii_grid(content: &str, source: &Path) -> IoResult<TerrainGrid> {
    let mut header = Header::default();
    let mut lines = content.lines().enumerate().peekable();

    while let Some(&(line_no, line)) = lines.peek() {
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else {
            lines.next();
            continue;
        };
        if key.parse::<f64>().is_ok() {
            break;
        }
        lines.next();
        let line_no = line_no + 1;
        let value = tokens
            .next()
            .ok_or_else(|| IoError::parse(source, line_no, format!("关键字 {key} 缺少取值")))?;
        let number = |v: &str| {
            v.parse::<f64>()
                .map_err(|_| IoError::parse(source, line_no, format!("{key} 的值无效: '{v}'")))
        };
        let count = |v: &str| {
            v.parse::<usize>()
                .map_err(|_| IoError::parse(source, line_no, format!("{key} 的值无效: '{v}'")))
        };

        match key.to_ascii_lowercase().as_str() {
            "ncols" => header.ncols = Some(count(value)?),
            "nrows" => header.nrows = Some(count(value)?),
            "xllcorner" => header.xll = Some((number(value)?, false)),
            "xllcenter" => header.xll = Some((number(value)?, true)),
            "yllcorner" => header.yll = Some((number(value)?, false)),
            "yllcenter" => header.yll = Some((number(value)?, true)),
            "cellsize" => header.cellsize = Some(number(value)?),
            "dx" => header.dx = Some(number(value)?),
            "dy" => header.dy = Some(number(value)?),
            "nodata_value" => header.nodata = Some(number(value)?),
            other => {
                return Err(IoError::parse(source, line_no, format!("未知关键字: {other}")));
            }
        }
    }

    let missing = |name: &str| IoError::parse(source, 0, format!("头部缺少 {name}"));
    let ncols = header.ncols.ok_or_else(|| missing("ncols"))?;
    let nrows = header.nrows.ok_or_else(|| missing("nrows"))?;
    let (xll, x_center) = header.xll.ok_or_else(|| missing("xllcorner"))?;
    let (yll, y_center) = header.yll.ok_or_else(|| missing("yllcorner"))?;
    let dx = header.dx.or(header.cellsize).ok_or_else(|| missing("cellsize"))?;
    let dy = header.dy.or(header.cellsize).ok_or_else(|| missing("cellsize"))?;
    let nodata = header.nodata.unwrap_or(DEFAULT_NODATA);

    let expected = ncols
        .checked_mul(nrows)
        .ok_or_else(|| IoError::parse(source, 0, format!("头部 {nrows}×{ncols} 单元数溢出")))?;
    // 先清点数据个数，再按头部分配缓冲区
    let tokens: usize = lines
        .clone()
        .map(|(_, line)| line.split_whitespace().count())
        .sum();
    if tokens != expected {
        return Err(IoError::parse(
            source,
            0,
            format!("数据个数 {tokens} 与 {nrows}×{ncols} 不符"),
        ));
    }

    let x0 = if x_center { xll - dx / 2.0 } else { xll };
    let y_bottom = if y_center { yll - dy / 2.0 } else { yll };
    let geometry = GridGeometry::new(x0, y_bottom + nrows as f64 * dy, dx, dy, ncols, nrows)?;

    let mut data = Vec::with_capacity(expected);
    for (line_no, line) in lines {
        for token in line.split_whitespace() {
            let value = token.parse::<f64>().map_err(|_| {
                IoError::parse(source, line_no + 1, format!("高程值无效: '{token}'"))
            })?;
            data.push(value);
        }
    }

    Ok(TerrainGrid::new(geometry, nodata, data)?)
}

/// 写出 ESRI ASCII 栅格
///
/// 缺失单元写为栅格的无数据值。像素非正方形时使用 `dx`/`dy` 关键字。
pub fn write_ascii_grid(grid: &TerrainGrid, path: &Path) -> IoResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| IoError::file(parent, e))?;
        }
    }

    let file = std::fs::File::create(path).map_err(|e| IoError::file(path, e))?;
    let mut writer = BufWriter::new(file);
    write_ascii_to(grid, &mut writer).map_err(|e| IoError::file(path, e))?;
    writer.flush().map_err(|e| IoError::file(path, e))?;

    if let Some(crs) = grid.crs() {
        let prj = path.with_extension("prj");
        std::fs::write(&prj, crs.to_string()).map_err(|e| IoError::file(&prj, e))?;
    }
    Ok(())
}

/// 将栅格以 ESRI ASCII 格式写入任意输出
pub fn write_ascii_to<W: Write>(grid: &TerrainGrid, out: &mut W) -> std::io::Result<()> {
    let g = grid.geometry();
    writeln!(out, "ncols         {}", g.width)?;
    writeln!(out, "nrows         {}", g.height)?;
    writeln!(out, "xllcorner     {}", g.origin_x)?;
    writeln!(out, "yllcorner     {}", g.min_y())?;
    if (g.pixel_width - g.pixel_height).abs() <= f64::EPSILON * g.pixel_width {
        writeln!(out, "cellsize      {}", g.pixel_width)?;
    } else {
        writeln!(out, "dx            {}", g.pixel_width)?;
        writeln!(out, "dy            {}", g.pixel_height)?;
    }
    writeln!(out, "NODATA_value  {}", grid.nodata())?;

    let mut line = String::new();
    for row in 0..g.height {
        line.clear();
        for col in 0..g.width {
            if col > 0 {
                line.push(' ');
            }
            let value = grid.value(row, col).unwrap_or(grid.nodata());
            line.push_str(&value.to_string());
        }
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// 读取同名 `.prj`；不存在或无法识别时返回 `None`
fn read_prj(path: &Path) -> Option<CrsDefinition> {
    let prj = path.with_extension("prj");
    let text = std::fs::read_to_string(&prj).ok()?;
    match CrsDefinition::parse(&text) {
        Ok(crs) => Some(crs),
        Err(e) => {
            warn!(path = %prj.display(), error = %e, "无法识别 .prj，视为未定义 CRS");
            None
        }
    }
}
