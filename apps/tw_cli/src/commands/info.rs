// apps/tw_cli/src/commands/info.rs

//! 栅格信息命令
//!
//! 显示 ESRI ASCII 栅格的几何、CRS 与高程统计。

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;
use tw_io::read_ascii_grid;

/// 栅格信息参数
#[derive(Args)]
pub struct InfoArgs {
    /// 栅格文件路径 (.asc)
    pub grid: PathBuf,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== TerraWall 栅格信息 ===");

    let grid = read_ascii_grid(&args.grid)
        .with_context(|| format!("无法读取栅格: {}", args.grid.display()))?;
    let g = grid.geometry();

    println!("=== 几何 ===");
    println!("文件: {}", args.grid.display());
    println!("尺寸: {} 列 x {} 行", g.width, g.height);
    println!("像素: {} x {} m", g.pixel_width, g.pixel_height);
    println!("左上角: ({}, {})", g.origin_x, g.origin_y);
    let extent = g.extent();
    println!(
        "范围: x [{:.3}, {:.3}], y [{:.3}, {:.3}]",
        extent.min_x, extent.max_x, extent.min_y, extent.max_y
    );
    println!("无数据值: {}", grid.nodata());
    match grid.crs() {
        Some(crs) => println!("CRS: {}", crs),
        None => println!("CRS: 未定义"),
    }

    println!("\n=== 高程统计 ===");
    let valid = grid.valid_count();
    println!(
        "有效单元: {} / {} ({:.1}%)",
        valid,
        g.cell_count(),
        100.0 * valid as f64 / g.cell_count().max(1) as f64
    );
    match grid.statistics(|_| true) {
        Some(stats) => {
            println!("最小值: {:.3} m", stats.min);
            println!("最大值: {:.3} m", stats.max);
            println!("平均值: {:.3} m", stats.mean);
        }
        None => println!("栅格中没有有效单元"),
    }

    Ok(())
}
