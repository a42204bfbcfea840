//! # Punch CLI
//!
//! 回放录制数据、管理配置。
//!
//! ```bash
//! # 写入默认配置
//! punch-cli config init
//!
//! # 回放姿态与加速度录制
//! punch-cli replay --pose pose.jsonl --motion motion.jsonl
//!
//! # 使用指定配置文件
//! punch-cli --config ./punch.toml replay --motion motion.jsonl
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{ConfigCommand, ReplayCommand};

/// Punch CLI - 出拳检测命令行工具
#[derive(Parser, Debug)]
#[command(name = "punch-cli")]
#[command(about = "Replay punch recordings and manage punchlink configuration", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件（默认: <config_dir>/punchlink/config.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 回放录制文件并打印检测结果
    Replay {
        #[command(flatten)]
        args: ReplayCommand,
    },
}

fn main() -> Result<()> {
    // 初始化日志（输出到 stderr）
    punch_sdk::logging::init_with_directive("punch=warn");

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(cli.config.as_deref()),
        Commands::Replay { args } => args.execute(cli.config.as_deref()),
    }
}
