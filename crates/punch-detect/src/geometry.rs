//! 2D 关键点几何工具
//!
//! 肘角使用点积公式：cos(θ) = (v1 · v2) / (|v1| × |v2|)，
//! 其中 v1 为肘 → 肩（上臂），v2 为肘 → 腕（前臂）。

/// 2D 点（归一化坐标）
pub type Point = (f64, f64);

/// 向量长度低于此值视为退化
const DEGENERATE_EPSILON: f64 = 1e-9;

/// 计算肘角（度）
///
/// - 90° = 弯曲（拳在肩旁）
/// - 180° = 伸直
///
/// 任一向量长度为 0 或坐标非有限值时返回 `None`，由调用方按"未检测到"处理。
pub fn elbow_angle(shoulder: Point, elbow: Point, wrist: Point) -> Option<f64> {
    let v1 = (shoulder.0 - elbow.0, shoulder.1 - elbow.1);
    let v2 = (wrist.0 - elbow.0, wrist.1 - elbow.1);

    let mag1 = v1.0.hypot(v1.1);
    let mag2 = v2.0.hypot(v2.1);
    if !(mag1 >= DEGENERATE_EPSILON && mag2 >= DEGENERATE_EPSILON) {
        return None;
    }

    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    let cos_angle = (dot / (mag1 * mag2)).clamp(-1.0, 1.0);
    let angle = cos_angle.acos().to_degrees();
    angle.is_finite().then_some(angle)
}

/// 水平距离 `|a.x - b.x|`
#[inline]
pub fn horizontal_distance(a: Point, b: Point) -> f64 {
    (a.0 - b.0).abs()
}

/// 垂直距离 `|a.y - b.y|`
#[inline]
pub fn vertical_distance(a: Point, b: Point) -> f64 {
    (a.1 - b.1).abs()
}

/// 欧氏距离
#[inline]
pub fn distance(a: Point, b: Point) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// `a` 是否在 `b` 上方（图像坐标 y 向下）
#[inline]
pub fn is_above(a: Point, b: Point) -> bool {
    a.1 < b.1
}
