// apps/tw_cli/src/commands/validate.rs

//! 验证命令
//!
//! 在运行批处理之前检查配置与清单：配置能否加载并通过校验，
//! 原始地形是否存在，每条测量能否通过入库校验，测量面文件是否齐全。

use anyhow::{bail, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use tw_config::PipelineConfig;
use tw_io::BatchManifest;

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件 (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 批处理清单 (JSON)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// 把警告也当作失败
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Warning,
    Error,
}

/// 单条检查结果
#[derive(Debug)]
struct Finding {
    severity: Severity,
    source: &'static str,
    message: String,
}

#[derive(Debug, Default)]
struct Findings(Vec<Finding>);

impl Findings {
    fn error(&mut self, source: &'static str, message: impl Into<String>) {
        self.push(Severity::Error, source, message.into());
    }

    fn warning(&mut self, source: &'static str, message: impl Into<String>) {
        self.push(Severity::Warning, source, message.into());
    }

    fn push(&mut self, severity: Severity, source: &'static str, message: String) {
        match severity {
            Severity::Error => error!(source, "{message}"),
            Severity::Warning => warn!(source, "{message}"),
        }
        self.0.push(Finding {
            severity,
            source,
            message,
        });
    }

    fn count(&self, severity: Severity) -> usize {
        self.0.iter().filter(|f| f.severity == severity).count()
    }

    fn passes(&self, strict: bool) -> bool {
        self.count(Severity::Error) == 0 && (!strict || self.count(Severity::Warning) == 0)
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    if args.config.is_none() && args.manifest.is_none() {
        println!("用法: tw_cli validate [--config <配置>] [--manifest <清单>] [--strict]");
        return Ok(());
    }

    let mut findings = Findings::default();
    if let Some(path) = &args.config {
        check_config(path, &mut findings);
    }
    if let Some(path) = &args.manifest {
        check_manifest(path, &mut findings);
    }

    for finding in &findings.0 {
        let mark = match finding.severity {
            Severity::Error => "✗",
            Severity::Warning => "⚠",
        };
        println!("{mark} [{}] {}", finding.source, finding.message);
    }

    let (errors, warnings) = (
        findings.count(Severity::Error),
        findings.count(Severity::Warning),
    );
    if findings.passes(args.strict) {
        println!("验证通过 ({warnings} 个警告)");
        Ok(())
    } else {
        bail!("验证失败: {errors} 个错误, {warnings} 个警告")
    }
}

fn check_config(path: &Path, findings: &mut Findings) {
    let config = match PipelineConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => return findings.error("config", format!("{}: {e}", path.display())),
    };
    if let Err(e) = config.validate() {
        return findings.error("config", e.to_string());
    }

    if config.canonical_epsg.is_none() {
        findings.warning("config", "未设置 canonical_epsg，CRS 未定义的栅格将保持未定义");
    }
    if config.merge.transition_distance == 0.0 {
        findings.warning("config", "transition_distance = 0，融合退化为直接覆盖");
    }
    if !config.diff.filter_outliers {
        findings.warning("config", "已关闭厚度离群值过滤");
    }
    if let Some(dir) = &config.run.working_dir {
        if dir.exists() && !dir.is_dir() {
            findings.error("config", format!("working_dir 不是目录: {}", dir.display()));
        }
    }
}

fn check_manifest(path: &Path, findings: &mut Findings) {
    let manifest = match BatchManifest::load(path) {
        Ok(manifest) => manifest,
        Err(e) => return findings.error("manifest", e.to_string()),
    };

    for s in &manifest.structures {
        if !s.original.exists() {
            findings.error(
                "manifest",
                format!("构筑物 {} 的原始地形不存在: {}", s.code, s.original.display()),
            );
        }
    }
    for (index, s) in manifest.surveys.iter().enumerate() {
        if let Err(e) = s.candidate.validate(index) {
            findings.error("manifest", format!("第 {} 条测量: {e}", index + 1));
        } else if !s.surface.exists() {
            findings.warning(
                "manifest",
                format!("测量 {} 的测量面不存在: {}", s.candidate.label(), s.surface.display()),
            );
        }
    }
    println!(
        "清单 {}: {} 个构筑物, {} 条测量",
        path.display(),
        manifest.structures.len(),
        manifest.surveys.len()
    );
}
