//! 配置文件（TOML）
//!
//! ```toml
//! [pose]
//! min_confidence = 0.2
//! cooldown_ms = 500
//!
//! [motion]
//! threshold_g = 2.5
//! cooldown_ms = 300
//! worn_on = "left"
//!
//! [link]
//! backoff_step_ms = 2000
//! max_retries = 3
//! transient_min_interval_ms = 500
//! auto_reconnect = true
//! ```
//!
//! 缺失的节和字段使用默认值。

use crate::error::SdkError;
use punch_detect::{MotionClassifierConfig, PoseClassifierConfig};
use punch_link::LinkConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PunchConfig {
    pub pose: PoseClassifierConfig,
    pub motion: MotionClassifierConfig,
    pub link: LinkConfig,
}

impl PunchConfig {
    /// 从文件加载并校验
    ///
    /// # 错误
    ///
    /// - `SdkError::ConfigIo`: 文件读取失败
    /// - `SdkError::ConfigParse`: TOML 解析失败
    /// - `SdkError::Detect` / `SdkError::Link`: 取值无效
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SdkError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SdkError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, SdkError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, SdkError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 写入文件（父目录不存在时创建）
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SdkError> {
        let path = path.as_ref();
        let io_err = |source| SdkError::ConfigIo {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, self.to_toml_string()?).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), SdkError> {
        self.pose.validate()?;
        self.motion.validate()?;
        self.link.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use punch_detect::Side;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PunchConfig::from_toml_str("").unwrap();
        assert_eq!(config, PunchConfig::default());
        assert_eq!(config.motion.threshold_g, 2.5);
        assert_eq!(config.pose.cooldown_ms, 500);
        assert_eq!(config.link.max_retries, 3);
    }

    #[test]
    fn test_partial_sections() {
        let config = PunchConfig::from_toml_str(
            r#"
            [motion]
            threshold_g = 3.0
            worn_on = "right"

            [link]
            auto_reconnect = false
            "#,
        )
        .unwrap();
        assert_eq!(config.motion.threshold_g, 3.0);
        assert_eq!(config.motion.cooldown_ms, 300);
        assert_eq!(config.motion.worn_on, Side::Right);
        assert!(!config.link.auto_reconnect);
        assert_eq!(config.link.backoff_step_ms, 2000);
    }

    #[test]
    fn test_round_trip() {
        let mut config = PunchConfig::default();
        config.motion = MotionClassifierConfig::conservative();
        config.pose.cooldown_ms = 200;
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("[motion]"), "toml: {}", text);
        assert_eq!(PunchConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            PunchConfig::from_toml_str("[motion]\nthreshold_g = 0.0"),
            Err(SdkError::Detect(_))
        ));
        assert!(matches!(
            PunchConfig::from_toml_str("[link]\nbackoff_step_ms = 0"),
            Err(SdkError::Link(_))
        ));
        assert!(matches!(
            PunchConfig::from_toml_str("[pose]\ncooldown_ms = 0"),
            Err(SdkError::Detect(_))
        ));
        assert!(matches!(
            PunchConfig::from_toml_str("[link]\ntransient_min_interval_ms = 0"),
            Err(SdkError::Link(_))
        ));
        assert!(matches!(
            PunchConfig::from_toml_str("[motion\n"),
            Err(SdkError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = PunchConfig::default();
        config.motion.worn_on = Side::Left;
        config.link.max_retries = 5;
        config.save(&path).unwrap();

        assert!(path.exists());
        assert_eq!(PunchConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[motion]\ncooldown_ms = 0\n").unwrap();
        assert!(matches!(PunchConfig::load(&path), Err(SdkError::Detect(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = PunchConfig::load("/nonexistent/punch/config.toml").unwrap_err();
        assert!(matches!(err, SdkError::ConfigIo { .. }));
    }
}
