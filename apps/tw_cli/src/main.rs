// apps/tw_cli/src/main.rs

//! TerraWall 命令行界面
//!
//! 按时间顺序把测量并入构筑物的累积地形面，输出体积、出处与剖面。
//!
//! # 架构层级
//!
//! 本模块属于 **Layer 5: Application**，只负责参数解析、日志初始化和文件输出；
//! 错误在这一层统一转为 `anyhow::Error`。

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// TerraWall 累积地形面批处理工具
#[derive(Parser)]
#[command(name = "tw_cli", version, author = "TerraWall Team")]
#[command(about = "TerraWall incremental terrain update and volume tracking", long_about = None)]
struct Cli {
    /// 日志级别
    #[arg(short, long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 按清单运行批处理
    Run(commands::run::RunArgs),
    /// 显示 ESRI ASCII 栅格信息
    Info(commands::info::InfoArgs),
    /// 验证配置与清单
    Validate(commands::validate::ValidateArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    }
}
