//! SDK 错误类型定义

use punch_detect::DetectError;
use punch_link::LinkError;
use punch_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// SDK 层错误类型
#[derive(Error, Debug)]
pub enum SdkError {
    /// 分类器配置错误
    #[error("Detector error: {0}")]
    Detect(#[from] DetectError),

    /// 连接层错误
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 协议错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 配置文件读写失败
    #[error("Failed to access config file {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 配置文件解析失败
    #[error("Invalid config TOML: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// 配置序列化失败
    #[error("Failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}
