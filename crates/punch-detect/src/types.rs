//! 检测层数据类型
//!
//! 时间戳统一用 `Duration` 表示（相对纪元或会话起点，由数据源决定），
//! 分类器只比较时间差，不关心原点。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// 身体关键点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JointId {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
}

impl JointId {
    /// 分类必需的 9 个关键点
    pub const REQUIRED: [JointId; 9] = [
        JointId::LeftWrist,
        JointId::RightWrist,
        JointId::LeftShoulder,
        JointId::RightShoulder,
        JointId::LeftElbow,
        JointId::RightElbow,
        JointId::Nose,
        JointId::LeftHip,
        JointId::RightHip,
    ];
}

/// 单个关键点估计
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub joint: JointId,
    /// 归一化坐标 `(x, y)`，`[0, 1]`，y 向下增长
    pub position: (f64, f64),
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(joint: JointId, x: f64, y: f64, confidence: f32) -> Self {
        Self {
            joint,
            position: (x, y),
            confidence,
        }
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.position.0
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.position.1
    }
}

/// 单帧姿态估计结果
#[derive(Debug, Clone, Default)]
pub struct PoseFrame {
    pub timestamp: Duration,
    pub keypoints: HashMap<JointId, Keypoint>,
}

impl PoseFrame {
    pub fn new(timestamp: Duration) -> Self {
        Self {
            timestamp,
            keypoints: HashMap::with_capacity(JointId::REQUIRED.len()),
        }
    }

    /// 插入关键点（同一关节后写覆盖前写）
    pub fn with_keypoint(mut self, joint: JointId, x: f64, y: f64, confidence: f32) -> Self {
        self.insert(Keypoint::new(joint, x, y, confidence));
        self
    }

    pub fn insert(&mut self, keypoint: Keypoint) {
        self.keypoints.insert(keypoint.joint, keypoint);
    }

    pub fn get(&self, joint: JointId) -> Option<&Keypoint> {
        self.keypoints.get(&joint)
    }
}

/// 单个加速度采样（单位 g）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub timestamp: Duration,
    pub acceleration: (f64, f64, f64),
}

impl MotionSample {
    pub fn new(timestamp: Duration, x: f64, y: f64, z: f64) -> Self {
        Self {
            timestamp,
            acceleration: (x, y, z),
        }
    }

    /// 合加速度 `sqrt(x² + y² + z²)`
    pub fn magnitude(&self) -> f64 {
        let (x, y, z) = self.acceleration;
        (x * x + y * y + z * z).sqrt()
    }
}

/// 事件来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PunchSource {
    /// 相机姿态
    Pose,
    /// 可穿戴加速度计
    Motion,
}

/// 出拳手
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    #[default]
    Unknown,
}

/// 出拳事件（创建后不可变）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PunchEvent {
    pub source: PunchSource,
    pub side: Side,
    /// 姿态来源为 1.0（无单位）；加速度来源为 `net_g * 9.81`
    pub magnitude: f64,
    pub timestamp: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_magnitude() {
        let sample = MotionSample::new(Duration::ZERO, 3.0, 4.0, 0.0);
        assert!((sample.magnitude() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_frame_builder_overwrites_joint() {
        let frame = PoseFrame::new(Duration::ZERO)
            .with_keypoint(JointId::Nose, 0.1, 0.1, 0.5)
            .with_keypoint(JointId::Nose, 0.5, 0.2, 0.9);
        assert_eq!(frame.keypoints.len(), 1);
        assert_eq!(frame.get(JointId::Nose).map(Keypoint::x), Some(0.5));
    }
}
