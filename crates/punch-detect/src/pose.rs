//! 基于姿态几何的出拳分类
//!
//! 每帧独立判定（无帧间状态），只有去抖器记录上次事件时间。
//!
//! # 流程
//!
//! 1. 校验 9 个必需关键点及置信度
//! 2. 护头过滤：双腕高于双肩、靠近鼻子、肘部弯曲 → 不计
//! 3. 站姿判定：肩宽 > 阈值为正面，否则为侧身（按肩的左右顺序确定前手）
//! 4. 正面：双臂分别评估直拳（jab）与普通出拳（punch）规则
//! 5. 侧身：只评估前手，伸展要求更严、肘角窗口更宽
//!
//! 所有阈值都在 [`PoseClassifierConfig`] 中，不同版本的差异只体现为配置。

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

use crate::debounce::{Acceptance, EventDebouncer, PunchStatistics};
use crate::error::{DetectError, require_nonzero_ms, require_positive};
use crate::geometry::{Point, elbow_angle, horizontal_distance, is_above, vertical_distance};
use crate::types::{JointId, PoseFrame, PunchEvent, PunchSource, Side};
use crate::Detection;

/// 站姿
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stance {
    /// 正面朝向相机
    Front,
    /// 侧身，携带前手
    Side(Side),
}

/// 出拳类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseStrike {
    Jab,
    Punch,
}

/// 单条出拳规则
///
/// 角度单位为度，距离为归一化坐标。`None` 表示不检查该项。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrikeRule {
    /// 腕-肩水平距离下限（严格大于）
    pub min_extension: f64,
    /// 肘角下限（严格大于）
    pub min_elbow_angle: f64,
    /// 肘角上限（严格小于）
    #[serde(default)]
    pub max_elbow_angle: Option<f64>,
    /// 腕-鼻垂直距离上限
    #[serde(default)]
    pub max_nose_dy: Option<f64>,
    /// 另一只手（护头手）与鼻子的水平距离上限
    #[serde(default)]
    pub guard_hand_max_nose_dx: Option<f64>,
    /// 腕高窗口：`[shoulder.y - w, nose.y + w]`
    #[serde(default)]
    pub vertical_window: Option<f64>,
}

/// 护头姿势判定参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuardRule {
    /// 双腕与鼻子的水平距离上限
    pub max_nose_dx: f64,
    /// 双肘角上限
    pub max_elbow_angle: f64,
}

/// 姿态分类器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseClassifierConfig {
    /// 关键点置信度下限（严格大于）
    pub min_confidence: f32,
    /// 冷却时间（毫秒）
    pub cooldown_ms: u64,
    /// 肩宽超过此值视为正面站姿
    pub front_min_shoulder_gap: f64,
    pub guard: GuardRule,
    pub front_jab: StrikeRule,
    pub front_punch: StrikeRule,
    pub side_jab: StrikeRule,
    pub side_punch: StrikeRule,
}

impl Default for PoseClassifierConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.2,
            cooldown_ms: 500,
            front_min_shoulder_gap: 0.15,
            guard: GuardRule {
                max_nose_dx: 0.25,
                max_elbow_angle: 120.0,
            },
            front_jab: StrikeRule {
                min_extension: 0.25,
                min_elbow_angle: 150.0,
                max_elbow_angle: None,
                max_nose_dy: Some(0.2),
                guard_hand_max_nose_dx: Some(0.25),
                vertical_window: None,
            },
            front_punch: StrikeRule {
                min_extension: 0.2,
                min_elbow_angle: 90.0,
                max_elbow_angle: Some(170.0),
                max_nose_dy: None,
                guard_hand_max_nose_dx: None,
                vertical_window: Some(0.3),
            },
            side_jab: StrikeRule {
                min_extension: 0.3,
                min_elbow_angle: 140.0,
                max_elbow_angle: None,
                max_nose_dy: Some(0.25),
                guard_hand_max_nose_dx: None,
                vertical_window: None,
            },
            side_punch: StrikeRule {
                min_extension: 0.25,
                min_elbow_angle: 80.0,
                max_elbow_angle: Some(175.0),
                max_nose_dy: None,
                guard_hand_max_nose_dx: None,
                vertical_window: Some(0.3),
            },
        }
    }
}

impl PoseClassifierConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), DetectError> {
        if !(0.0..1.0).contains(&self.min_confidence) {
            return Err(DetectError::invalid(
                "pose.min_confidence",
                format!("must be in [0, 1), got {}", self.min_confidence),
            ));
        }
        require_nonzero_ms("pose.cooldown_ms", self.cooldown_ms)?;
        require_positive("pose.front_min_shoulder_gap", self.front_min_shoulder_gap)?;
        require_positive("pose.guard.max_nose_dx", self.guard.max_nose_dx)?;
        require_positive("pose.guard.max_elbow_angle", self.guard.max_elbow_angle)?;
        for (field, rule) in [
            ("pose.front_jab", &self.front_jab),
            ("pose.front_punch", &self.front_punch),
            ("pose.side_jab", &self.side_jab),
            ("pose.side_punch", &self.side_punch),
        ] {
            require_positive(field, rule.min_extension)?;
            if let Some(max) = rule.max_elbow_angle
                && max <= rule.min_elbow_angle
            {
                return Err(DetectError::invalid(
                    field,
                    format!(
                        "empty elbow window ({}, {max})",
                        rule.min_elbow_angle
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// 帧被拒绝的原因（不是错误）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoseRejection {
    MissingJoint(JointId),
    LowConfidence(JointId),
    /// 坐标为 NaN 或无穷大
    NonFinite(JointId),
    /// 肘角向量长度为 0
    DegenerateAngle,
    /// 护头姿势
    Guard,
    /// 没有任何规则命中
    NoStrike,
}

/// 几何命中（未经过去抖）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseHit {
    pub side: Side,
    pub strike: PoseStrike,
    pub stance: Stance,
    pub extension: f64,
    pub elbow_angle: f64,
}

/// 单臂关键点
#[derive(Debug, Clone, Copy)]
struct Arm {
    side: Side,
    shoulder: Point,
    wrist: Point,
    angle: f64,
}

/// 已校验的关键点集合
struct Skeleton {
    nose: Point,
    left: Arm,
    right: Arm,
}

impl Skeleton {
    fn arm(&self, side: Side) -> (&Arm, &Arm) {
        match side {
            Side::Right => (&self.right, &self.left),
            _ => (&self.left, &self.right),
        }
    }
}

/// 姿态分类器
pub struct PoseClassifier {
    config: PoseClassifierConfig,
    debouncer: EventDebouncer,
}

impl PoseClassifier {
    pub fn new(config: PoseClassifierConfig) -> Self {
        let debouncer = EventDebouncer::new(config.cooldown());
        Self { config, debouncer }
    }

    pub fn config(&self) -> &PoseClassifierConfig {
        &self.config
    }

    /// 分类一帧，命中且通过去抖时返回事件
    pub fn classify(&mut self, frame: &PoseFrame) -> Option<PunchEvent> {
        self.process(frame).map(|detection| detection.event)
    }

    /// 分类一帧，附带去抖器的接受信息
    pub fn process(&mut self, frame: &PoseFrame) -> Option<Detection> {
        let hit = match self.analyze(frame) {
            Ok(hit) => hit,
            Err(reason) => {
                trace!(?reason, "pose frame rejected");
                return None;
            },
        };

        let acceptance: Acceptance = self.debouncer.try_accept(frame.timestamp, 1.0)?;
        let event = PunchEvent {
            source: PunchSource::Pose,
            side: hit.side,
            magnitude: 1.0,
            timestamp: frame.timestamp,
        };
        debug!(
            side = ?hit.side,
            strike = ?hit.strike,
            stance = ?hit.stance,
            count = acceptance.count,
            "pose punch detected"
        );
        Some(Detection { event, acceptance })
    }

    /// 纯几何判定（不修改状态，不经过去抖）
    pub fn analyze(&self, frame: &PoseFrame) -> Result<PoseHit, PoseRejection> {
        let skeleton = self.skeleton(frame)?;
        let cfg = &self.config;

        if self.is_guard(&skeleton) {
            return Err(PoseRejection::Guard);
        }

        let shoulder_gap = horizontal_distance(skeleton.left.shoulder, skeleton.right.shoulder);
        if shoulder_gap > cfg.front_min_shoulder_gap {
            let left = self.evaluate_arm(&skeleton, Side::Left, &cfg.front_jab, &cfg.front_punch);
            let right =
                self.evaluate_arm(&skeleton, Side::Right, &cfg.front_jab, &cfg.front_punch);
            let best = match (left, right) {
                (Some(l), Some(r)) => Some(if r.extension > l.extension { r } else { l }),
                (l, r) => l.or(r),
            };
            return best
                .map(|hit| PoseHit {
                    stance: Stance::Front,
                    ..hit
                })
                .ok_or(PoseRejection::NoStrike);
        }

        let lead = if skeleton.left.shoulder.0 > skeleton.right.shoulder.0 {
            Side::Left
        } else {
            Side::Right
        };
        self.evaluate_arm(&skeleton, lead, &cfg.side_jab, &cfg.side_punch)
            .map(|hit| PoseHit {
                stance: Stance::Side(lead),
                ..hit
            })
            .ok_or(PoseRejection::NoStrike)
    }

    pub fn count(&self) -> u64 {
        self.debouncer.count()
    }

    pub fn statistics(&self) -> PunchStatistics {
        self.debouncer.statistics()
    }

    pub fn reset(&mut self) {
        self.debouncer.reset();
    }

    fn skeleton(&self, frame: &PoseFrame) -> Result<Skeleton, PoseRejection> {
        for joint in JointId::REQUIRED {
            let keypoint = frame.get(joint).ok_or(PoseRejection::MissingJoint(joint))?;
            if keypoint.confidence <= self.config.min_confidence {
                return Err(PoseRejection::LowConfidence(joint));
            }
            if !(keypoint.x().is_finite() && keypoint.y().is_finite()) {
                return Err(PoseRejection::NonFinite(joint));
            }
        }

        // 上面已确认全部存在
        let point = |joint| frame.get(joint).map_or((0.0, 0.0), |k| k.position);
        let arm = |side, shoulder, elbow, wrist| -> Result<Arm, PoseRejection> {
            let (s, e, w) = (point(shoulder), point(elbow), point(wrist));
            let angle = elbow_angle(s, e, w).ok_or(PoseRejection::DegenerateAngle)?;
            Ok(Arm {
                side,
                shoulder: s,
                wrist: w,
                angle,
            })
        };

        Ok(Skeleton {
            nose: point(JointId::Nose),
            left: arm(
                Side::Left,
                JointId::LeftShoulder,
                JointId::LeftElbow,
                JointId::LeftWrist,
            )?,
            right: arm(
                Side::Right,
                JointId::RightShoulder,
                JointId::RightElbow,
                JointId::RightWrist,
            )?,
        })
    }

    fn is_guard(&self, skeleton: &Skeleton) -> bool {
        let guard = &self.config.guard;
        [&skeleton.left, &skeleton.right].iter().all(|arm| {
            is_above(arm.wrist, arm.shoulder)
                && horizontal_distance(arm.wrist, skeleton.nose) < guard.max_nose_dx
                && arm.angle < guard.max_elbow_angle
        })
    }

    /// 依次尝试 jab 和 punch 规则
    fn evaluate_arm(
        &self,
        skeleton: &Skeleton,
        side: Side,
        jab: &StrikeRule,
        punch: &StrikeRule,
    ) -> Option<PoseHit> {
        let (arm, other) = skeleton.arm(side);
        [(PoseStrike::Jab, jab), (PoseStrike::Punch, punch)]
            .into_iter()
            .find(|(_, rule)| rule_matches(rule, arm, other, skeleton.nose))
            .map(|(strike, _)| PoseHit {
                side: arm.side,
                strike,
                stance: Stance::Front,
                extension: horizontal_distance(arm.wrist, arm.shoulder),
                elbow_angle: arm.angle,
            })
    }
}

impl Default for PoseClassifier {
    fn default() -> Self {
        Self::new(PoseClassifierConfig::default())
    }
}

fn rule_matches(rule: &StrikeRule, arm: &Arm, other: &Arm, nose: Point) -> bool {
    if horizontal_distance(arm.wrist, arm.shoulder) <= rule.min_extension {
        return false;
    }
    if arm.angle <= rule.min_elbow_angle {
        return false;
    }
    if rule.max_elbow_angle.is_some_and(|max| arm.angle >= max) {
        return false;
    }
    if rule
        .max_nose_dy
        .is_some_and(|max| vertical_distance(arm.wrist, nose) >= max)
    {
        return false;
    }
    if rule
        .guard_hand_max_nose_dx
        .is_some_and(|max| horizontal_distance(other.wrist, nose) >= max)
    {
        return false;
    }
    if let Some(window) = rule.vertical_window {
        let y = arm.wrist.1;
        if y < arm.shoulder.1 - window || y > nose.1 + window {
            return false;
        }
    }
    true
}
