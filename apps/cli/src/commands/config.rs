//! 配置管理命令
//!
//! 默认配置文件位于 `<config_dir>/punchlink/config.toml`，`--config` 可覆盖。

use anyhow::{Context, Result};
use clap::Subcommand;
use punch_sdk::PunchConfig;
use std::path::{Path, PathBuf};
use tracing::info;

/// 默认配置文件路径
fn default_config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("punchlink");
    path.push("config.toml");
    Ok(path)
}

/// 解析配置文件路径（显式路径优先）
pub fn config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_file(),
    }
}

/// 加载生效的配置
///
/// 显式指定的文件必须存在；默认位置没有文件时使用内置默认值。
pub fn load_config(explicit: Option<&Path>) -> Result<PunchConfig> {
    let path = config_file(explicit)?;
    if explicit.is_none() && !path.exists() {
        return Ok(PunchConfig::default());
    }
    let config = PunchConfig::load(&path)
        .with_context(|| format!("加载配置失败: {}", path.display()))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 打印生效的配置（TOML）
    Show,

    /// 打印配置文件路径
    Path,

    /// 写入默认配置
    Init {
        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(self, explicit: Option<&Path>) -> Result<()> {
        match self {
            ConfigCommand::Show => Self::show_(explicit),
            ConfigCommand::Path => Self::path_(explicit),
            ConfigCommand::Init { force } => Self::init_(explicit, force),
        }
    }

    fn show_(explicit: Option<&Path>) -> Result<()> {
        let config = load_config(explicit)?;
        print!("{}", config.to_toml_string()?);
        Ok(())
    }

    fn path_(explicit: Option<&Path>) -> Result<()> {
        println!("{}", config_file(explicit)?.display());
        Ok(())
    }

    fn init_(explicit: Option<&Path>, force: bool) -> Result<()> {
        let path = config_file(explicit)?;
        if path.exists() && !force {
            anyhow::bail!(
                "配置文件已存在: {}（使用 --force 覆盖）",
                path.display()
            );
        }
        PunchConfig::default()
            .save(&path)
            .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
        println!("✅ 已写入默认配置: {}", path.display());
        Ok(())
    }
}
