//! 线路消息定义
//!
//! 两台设备之间交换的是一个键值表，由 `type` 字段区分负载：
//!
//! | type | 字段 |
//! |---|---|
//! | `punchData` | `speed`, `isMax`, `timestamp` |
//! | `healthData` | `heartRate` 和/或 `calories`, `timestamp` |
//! | `workoutStatus` | `status` (`"started"` / `"ended"`), `timestamp` |
//! | `punchStats` | `maxSpeed`, `avgSpeed`, `timestamp` |
//!
//! `timestamp` 统一为纪元秒（`f64`）。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::ProtocolError;

/// 训练状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutStatus {
    /// 训练开始
    Started,
    /// 训练结束
    Ended,
}

impl WorkoutStatus {
    /// 线路上的字符串形式
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Ended => "ended",
        }
    }
}

/// 消息种类
///
/// Durable 通道按种类保存"最新值"快照，新消息覆盖同种类的旧消息。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    /// 出拳数据
    PunchData,
    /// 健康数据（心率、卡路里）
    HealthData,
    /// 训练状态
    WorkoutStatus,
    /// 出拳统计
    PunchStats,
}

impl MessageKind {
    /// 全部种类（按线路定义顺序）
    pub const ALL: [MessageKind; 4] = [
        MessageKind::PunchData,
        MessageKind::HealthData,
        MessageKind::WorkoutStatus,
        MessageKind::PunchStats,
    ];

    /// `type` 字段的取值
    pub fn type_tag(self) -> &'static str {
        match self {
            Self::PunchData => "punchData",
            Self::HealthData => "healthData",
            Self::WorkoutStatus => "workoutStatus",
            Self::PunchStats => "punchStats",
        }
    }

    /// 从 `type` 字段解析
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_tag() == tag)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

/// 线路消息
///
/// 通过 serde 内部标签（`type`）序列化为键值表。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WireMessage {
    /// 单次出拳
    PunchData {
        /// 速度（加速度换算的强度指标）
        speed: f64,
        /// 是否为当前窗口内的最大值
        is_max: bool,
        /// 纪元秒
        timestamp: f64,
    },

    /// 健康数据，至少携带一项指标
    HealthData {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        heart_rate: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        calories: Option<f64>,
        timestamp: f64,
    },

    /// 训练状态变化
    WorkoutStatus { status: WorkoutStatus, timestamp: f64 },

    /// 出拳统计
    PunchStats {
        max_speed: f64,
        avg_speed: f64,
        timestamp: f64,
    },
}

impl WireMessage {
    /// 构造出拳消息
    pub fn punch(speed: f64, is_max: bool, timestamp: Duration) -> Self {
        Self::PunchData {
            speed,
            is_max,
            timestamp: timestamp.as_secs_f64(),
        }
    }

    /// 构造健康数据消息
    ///
    /// # 错误
    ///
    /// 两项指标都缺失时返回 `ProtocolError::EmptyHealthData`。
    pub fn health(
        heart_rate: Option<f64>,
        calories: Option<f64>,
        timestamp: Duration,
    ) -> Result<Self, ProtocolError> {
        let message = Self::HealthData {
            heart_rate,
            calories,
            timestamp: timestamp.as_secs_f64(),
        };
        message.validate()?;
        Ok(message)
    }

    /// 构造训练状态消息
    pub fn workout(status: WorkoutStatus, timestamp: Duration) -> Self {
        Self::WorkoutStatus {
            status,
            timestamp: timestamp.as_secs_f64(),
        }
    }

    /// 构造出拳统计消息
    pub fn stats(max_speed: f64, avg_speed: f64, timestamp: Duration) -> Self {
        Self::PunchStats {
            max_speed,
            avg_speed,
            timestamp: timestamp.as_secs_f64(),
        }
    }

    /// 消息种类
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::PunchData { .. } => MessageKind::PunchData,
            Self::HealthData { .. } => MessageKind::HealthData,
            Self::WorkoutStatus { .. } => MessageKind::WorkoutStatus,
            Self::PunchStats { .. } => MessageKind::PunchStats,
        }
    }

    /// 纪元秒时间戳
    pub fn timestamp(&self) -> f64 {
        match self {
            Self::PunchData { timestamp, .. }
            | Self::HealthData { timestamp, .. }
            | Self::WorkoutStatus { timestamp, .. }
            | Self::PunchStats { timestamp, .. } => *timestamp,
        }
    }

    /// 检查字段约束
    ///
    /// serde 只能保证字段类型，这里补充跨字段约束：
    /// - `healthData` 至少有一项指标
    /// - 所有浮点字段必须是有限值
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let finite = |field: &'static str, value: f64| {
            if value.is_finite() {
                Ok(())
            } else {
                Err(ProtocolError::NonFinite { field })
            }
        };

        finite("timestamp", self.timestamp())?;
        match self {
            Self::PunchData { speed, .. } => finite("speed", *speed),
            Self::HealthData {
                heart_rate,
                calories,
                ..
            } => {
                if heart_rate.is_none() && calories.is_none() {
                    return Err(ProtocolError::EmptyHealthData);
                }
                if let Some(hr) = heart_rate {
                    finite("heartRate", *hr)?;
                }
                if let Some(kcal) = calories {
                    finite("calories", *kcal)?;
                }
                Ok(())
            },
            Self::WorkoutStatus { .. } => Ok(()),
            Self::PunchStats {
                max_speed,
                avg_speed,
                ..
            } => {
                finite("maxSpeed", *max_speed)?;
                finite("avgSpeed", *avg_speed)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_match_wire_names() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::from_type_tag(kind.type_tag()), Some(kind));
        }
        assert_eq!(MessageKind::from_type_tag("chat"), None);
    }

    #[test]
    fn test_message_kind() {
        let msg = WireMessage::punch(4.5, false, Duration::from_secs(1000));
        assert_eq!(msg.kind(), MessageKind::PunchData);
        assert_eq!(msg.timestamp(), 1000.0);

        let msg = WireMessage::workout(WorkoutStatus::Ended, Duration::from_secs(5));
        assert_eq!(msg.kind(), MessageKind::WorkoutStatus);
    }

    #[test]
    fn test_health_requires_a_metric() {
        let err = WireMessage::health(None, None, Duration::ZERO).unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyHealthData));

        assert!(WireMessage::health(Some(120.0), None, Duration::ZERO).is_ok());
        assert!(WireMessage::health(None, Some(35.5), Duration::ZERO).is_ok());
    }

    #[test]
    fn test_non_finite_rejected() {
        let msg = WireMessage::PunchData {
            speed: f64::NAN,
            is_max: false,
            timestamp: 1.0,
        };
        assert!(matches!(
            msg.validate(),
            Err(ProtocolError::NonFinite { field: "speed" })
        ));
    }
}
