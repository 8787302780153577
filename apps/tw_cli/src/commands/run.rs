// apps/tw_cli/src/commands/run.rs

//! 运行批处理命令
//!
//! 读取清单与配置，按构筑物顺序处理全部测量，写出报告、剖面与最终地形面。
//! 单条测量或单个构筑物的失败只体现在报告中，命令本身仍返回成功；
//! 只有清单、配置或输出目录无法使用时才返回错误。

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tw_config::PipelineConfig;
use tw_io::{write_ascii_grid, write_json, write_profile_csv, BatchManifest};
use tw_workflow::{
    BatchReport, BatchRunner, FileGridStorage, GridStorage, LoggingListener, ManifestSurfaces,
    MemoryGridStorage, StructureSpec, WallStateStore,
};

/// 运行批处理参数
#[derive(Args)]
pub struct RunArgs {
    /// 批处理清单 (JSON)
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 输出目录
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// 导出各构筑物最终累积面 (.asc)
    #[arg(long)]
    pub export: bool,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== TerraWall 批处理启动 ===");

    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("无法加载配置: {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.validate().context("配置无效")?;

    let manifest = BatchManifest::load(&args.manifest)
        .with_context(|| format!("无法加载清单: {}", args.manifest.display()))?;

    let storage: Arc<dyn GridStorage> = match &config.run.working_dir {
        Some(dir) => {
            info!("工作栅格目录: {}", dir.display());
            Arc::new(
                FileGridStorage::new(dir)
                    .with_context(|| format!("无法创建工作目录: {}", dir.display()))?,
            )
        }
        None => Arc::new(MemoryGridStorage::new()),
    };
    let store = Arc::new(WallStateStore::new(storage));
    let surfaces = Arc::new(ManifestSurfaces::from_manifest(&manifest));

    let runner = BatchRunner::new(config, store, surfaces).context("构建运行器失败")?;
    runner
        .events()
        .add_listener(Arc::new(LoggingListener::new("batch")));

    let specs: Vec<StructureSpec> = manifest
        .structures
        .iter()
        .map(|s| StructureSpec {
            code: s.code.clone(),
            canonical_crs: s.canonical_crs(),
        })
        .collect();

    let start = Instant::now();
    let report = runner.run(&manifest.candidates(), &specs);
    let elapsed = start.elapsed();

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("无法创建输出目录: {}", args.output.display()))?;
    write_outputs(&report, &args.output)?;
    if args.export {
        export_final(&runner, &report, &args.output)?;
    }

    print_summary(&report);
    info!("=== 批处理完成 ({:.2} s) ===", elapsed.as_secs_f64());
    Ok(())
}

fn write_outputs(report: &BatchReport, output: &Path) -> Result<()> {
    let report_path = output.join("report.json");
    write_json(report, &report_path).context("无法写出报告")?;
    info!("报告: {}", report_path.display());

    let profiles = output.join("profiles");
    for structure in &report.structures {
        for survey in &structure.surveys {
            let Some(profile) = &survey.profile else {
                continue;
            };
            let path = profiles.join(format!("{}.csv", file_stem(&survey.survey)));
            write_profile_csv(profile, &path)
                .with_context(|| format!("无法写出剖面: {}", path.display()))?;
        }
    }
    Ok(())
}

fn export_final(runner: &BatchRunner, report: &BatchReport, output: &Path) -> Result<()> {
    for structure in &report.structures {
        let code = &structure.structure;
        if !runner.store().contains(code) {
            warn!("构筑物 {} 没有累积面，跳过导出", code);
            continue;
        }
        let snapshot = runner
            .store()
            .current(code)
            .with_context(|| format!("无法读取构筑物 {} 的累积面", code))?;
        let path = output.join(format!("{}_final.asc", file_stem(code)));
        write_ascii_grid(&snapshot.grid, &path)
            .with_context(|| format!("无法导出: {}", path.display()))?;
        info!("导出 {} (版本 {}): {}", code, snapshot.version, path.display());
    }
    Ok(())
}

/// 可用作文件名的测量/构筑物标识
fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

fn print_summary(report: &BatchReport) {
    println!("\n=== 批处理结果 ({}) ===", report.run_id);
    for s in &report.structures {
        let status = if s.status.is_aborted() { "中止" } else { "完成" };
        println!(
            "{:<8} {}  成功 {:>3}  失败 {:>3}  跳过 {:>3}  版本 {}",
            s.structure, status, s.succeeded, s.failed, s.skipped, s.final_version
        );
        for outcome in &s.surveys {
            println!(
                "    {} {}  填方 {:>10.2} m³  挖方 {:>10.2} m³  基准 {}",
                outcome.date,
                outcome.survey,
                outcome.metrics.fill_volume,
                outcome.metrics.cut_volume,
                outcome.base_reference.label()
            );
            let d = &outcome.dimensions;
            let width = d.width.map_or_else(|| "-".to_string(), |w| format!("{w:.3}"));
            println!(
                "        面积 {:.3} m²  宽 {} m  长 {:.3} m",
                d.area, width, d.length
            );
        }
        for failure in &s.failures {
            println!("    ✗ {} [{}] {}", failure.survey, failure.kind, failure.message);
        }
    }
    for failure in &report.unassigned {
        println!("未归属: [{}] {}", failure.kind, failure.message);
    }
    println!(
        "\n合计: 成功 {}, 失败 {}, 跳过 {}",
        report.total_succeeded(),
        report.total_failed(),
        report.total_skipped()
    );
}
