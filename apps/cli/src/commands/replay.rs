//! replay 命令
//!
//! 把 JSONL 录制依次送入分类器，打印每次出拳和汇总统计。
//!
//! 姿态录制（每行一帧）：
//!
//! ```json
//! {"t": 1.25, "keypoints": [{"joint": "leftWrist", "x": 0.9, "y": 0.35, "c": 0.9}]}
//! ```
//!
//! 加速度录制（每行一个采样，单位 g）：
//!
//! ```json
//! {"t": 1.25, "ax": 4.2, "ay": 0.0, "az": 0.0}
//! ```
//!
//! 空行和 `#` 开头的行被忽略。两路录制按时间戳合并回放。

use super::config::load_config;
use anyhow::{Context, Result};
use clap::Args;
use punch_sdk::detect::{
    Detection, JointId, Keypoint, MotionSample, PoseFrame, PunchSource, PunchStatistics,
};
use punch_sdk::{FrameOutcome, TrainingSession};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 回放命令参数
#[derive(Args, Debug)]
pub struct ReplayCommand {
    /// 姿态录制文件（JSONL）
    #[arg(long)]
    pub pose: Option<PathBuf>,

    /// 加速度录制文件（JSONL）
    #[arg(long)]
    pub motion: Option<PathBuf>,

    /// 每次出拳输出一行 JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Deserialize)]
struct KeypointRecord {
    joint: JointId,
    x: f64,
    y: f64,
    #[serde(default = "full_confidence")]
    c: f32,
}

fn full_confidence() -> f32 {
    1.0
}

#[derive(Debug, Deserialize)]
struct PoseRecord {
    t: f64,
    keypoints: Vec<KeypointRecord>,
}

#[derive(Debug, Deserialize)]
struct MotionRecord {
    t: f64,
    ax: f64,
    ay: f64,
    az: f64,
}

enum Input {
    Pose(PoseFrame),
    Motion(MotionSample),
}

impl Input {
    fn timestamp(&self) -> Duration {
        match self {
            Input::Pose(frame) => frame.timestamp,
            Input::Motion(sample) => sample.timestamp,
        }
    }
}

fn to_duration(t: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(t).with_context(|| format!("无效的时间戳: {}", t))
}

/// 逐行解析 JSONL，行号从 1 开始
fn read_records<T, F>(path: &Path, mut convert: F) -> Result<Vec<Input>>
where
    T: for<'de> Deserialize<'de>,
    F: FnMut(T) -> Result<Input>,
{
    let content =
        fs::read_to_string(path).with_context(|| format!("读取录制文件失败: {}", path.display()))?;
    let mut inputs = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let input = serde_json::from_str::<T>(line)
            .map_err(anyhow::Error::from)
            .and_then(&mut convert)
            .with_context(|| format!("{}: line {}", path.display(), index + 1))?;
        inputs.push(input);
    }
    Ok(inputs)
}

fn pose_input(record: PoseRecord) -> Result<Input> {
    let mut frame = PoseFrame::new(to_duration(record.t)?);
    for kp in record.keypoints {
        frame.insert(Keypoint::new(kp.joint, kp.x, kp.y, kp.c));
    }
    Ok(Input::Pose(frame))
}

fn motion_input(record: MotionRecord) -> Result<Input> {
    Ok(Input::Motion(MotionSample::new(
        to_duration(record.t)?,
        record.ax,
        record.ay,
        record.az,
    )))
}

impl ReplayCommand {
    /// 执行回放
    pub fn execute(&self, config_path: Option<&Path>) -> Result<()> {
        if self.pose.is_none() && self.motion.is_none() {
            anyhow::bail!("❌ 至少需要 --pose 或 --motion 之一");
        }

        let config = load_config(config_path)?;
        let session = TrainingSession::new(&config, None).context("配置无效")?;

        let mut inputs = Vec::new();
        if let Some(path) = &self.pose {
            inputs.extend(read_records(path, pose_input)?);
        }
        if let Some(path) = &self.motion {
            inputs.extend(read_records(path, motion_input)?);
        }
        // 稳定排序：同一时刻先姿态后加速度
        inputs.sort_by_key(Input::timestamp);

        for input in &inputs {
            let outcome = match input {
                Input::Pose(frame) => session.submit_pose(frame),
                Input::Motion(sample) => session.submit_motion(sample),
            };
            if let FrameOutcome::Punch(detection) = outcome {
                self.print_detection(&detection)?;
            }
        }

        let stats = session.stats();
        if self.pose.is_some() {
            print_summary("pose", &stats.pose, stats.pose_frames, "frames");
        }
        if self.motion.is_some() {
            print_summary("motion", &stats.motion, stats.motion_samples, "samples");
        }
        Ok(())
    }

    fn print_detection(&self, detection: &Detection) -> Result<()> {
        let event = &detection.event;
        let source = match event.source {
            PunchSource::Pose => "pose",
            PunchSource::Motion => "motion",
        };
        if self.json {
            let line = serde_json::json!({
                "t": event.timestamp.as_secs_f64(),
                "source": source,
                "side": event.side,
                "magnitude": event.magnitude,
                "count": detection.acceptance.count,
                "isMax": detection.acceptance.is_max,
            });
            println!("{}", serde_json::to_string(&line)?);
        } else {
            println!(
                "[{:>8.3}s] {:<6} punch #{:<3} side={:?} magnitude={:.2}{}",
                event.timestamp.as_secs_f64(),
                source,
                detection.acceptance.count,
                event.side,
                event.magnitude,
                if detection.acceptance.is_max { " (max)" } else { "" }
            );
        }
        Ok(())
    }
}

fn print_summary(label: &str, stats: &PunchStatistics, inputs: u64, unit: &str) {
    println!(
        "{}: {} punches (max {:.2}, avg {:.2}) from {} {}",
        label, stats.count, stats.max, stats.average, inputs, unit
    );
}
