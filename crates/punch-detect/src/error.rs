//! 检测层错误类型
//!
//! 注意：关键点缺失、置信度不足、护头姿势等都不是错误，分类器直接返回
//! "未检测到"。这里只覆盖配置校验。

use thiserror::Error;

/// 检测层错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectError {
    /// 配置值超出允许范围
    #[error("Invalid config `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },
}

impl DetectError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// 要求有限且为正数
pub(crate) fn require_positive(field: &'static str, value: f64) -> Result<(), DetectError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DetectError::invalid(field, format!("must be > 0, got {value}")))
    }
}

/// 要求毫秒值非 0（0 会关闭去抖）
pub(crate) fn require_nonzero_ms(field: &'static str, value: u64) -> Result<(), DetectError> {
    if value > 0 {
        Ok(())
    } else {
        Err(DetectError::invalid(field, "must be > 0 ms"))
    }
}
