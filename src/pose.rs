//! Pose data model: keypoints, per-frame poses, and stored frame records.
//!
//! Every pose in the system shares one canonical joint order (the 17-point
//! COCO layout used by MoveNet/YOLO-pose models), so poses can be compared
//! joint-by-joint without any realignment step.

use chrono::{DateTime, Utc};

/// Number of joints in the canonical layout.
pub const JOINT_COUNT: usize = 17;

/// One detected joint location, in image coordinates, with the model's
/// confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }
}

impl From<[f32; 3]> for Keypoint {
    fn from(value: [f32; 3]) -> Self {
        Self {
            x: value[0],
            y: value[1],
            confidence: value[2],
        }
    }
}

impl From<Keypoint> for [f32; 3] {
    fn from(value: Keypoint) -> Self {
        [value.x, value.y, value.confidence]
    }
}

/// The full set of joint positions detected in one frame.
///
/// A length of zero is the "no detection" sentinel: the frame was processed
/// but no body was found. Non-empty poses always have [`JOINT_COUNT`] joints
/// in the canonical order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pose {
    joints: Vec<Keypoint>,
}

impl Pose {
    pub fn new(joints: Vec<Keypoint>) -> Self {
        Self { joints }
    }

    /// The "no detection" sentinel.
    pub fn empty() -> Self {
        Self { joints: Vec::new() }
    }

    /// A pose of `len` joints at the origin with zero confidence. Used to
    /// widen an undetected live snapshot so the confidence gate absorbs it
    /// instead of a shape error.
    pub fn zeroed(len: usize) -> Self {
        Self {
            joints: vec![Keypoint::new(0.0, 0.0, 0.0); len],
        }
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn joints(&self) -> &[Keypoint] {
        &self.joints
    }

    /// Serialize to the nested `[[x, y, confidence], ...]` array used on the
    /// wire and in the keypoints column.
    pub fn to_json(&self) -> serde_json::Value {
        let rows: Vec<[f32; 3]> = self.joints.iter().map(|kp| (*kp).into()).collect();
        serde_json::to_value(rows).unwrap_or(serde_json::Value::Null)
    }

    /// Bind a nested keypoint array back into a typed pose. Returns `None`
    /// for anything that is not a well-formed array of `[x, y, c]` triples,
    /// so malformed rows are rejected at the store boundary instead of
    /// leaking into the scoring path.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let rows: Vec<[f32; 3]> = serde_json::from_value(value.clone()).ok()?;
        Some(Self {
            joints: rows.into_iter().map(Keypoint::from).collect(),
        })
    }
}

/// One persisted extraction result: the pose detected at `frame_index` of
/// the video identified by `video_ref`. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseFrameRecord {
    pub video_ref: String,
    pub frame_index: u64,
    pub pose: Pose,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pose() -> Pose {
        Pose::new(
            (0..JOINT_COUNT)
                .map(|i| Keypoint::new(i as f32, i as f32 * 2.0, 0.9))
                .collect(),
        )
    }

    #[test]
    fn json_binding_round_trips() {
        let pose = sample_pose();
        let bound = Pose::from_json(&pose.to_json()).expect("well-formed array");
        assert_eq!(bound, pose);
    }

    #[test]
    fn empty_pose_serializes_to_empty_array() {
        let value = Pose::empty().to_json();
        assert_eq!(value, serde_json::json!([]));
        assert_eq!(Pose::from_json(&value), Some(Pose::empty()));
    }

    #[test]
    fn malformed_rows_are_rejected() {
        assert_eq!(Pose::from_json(&serde_json::json!("keypoints")), None);
        assert_eq!(Pose::from_json(&serde_json::json!([[1.0, 2.0]])), None);
        assert_eq!(
            Pose::from_json(&serde_json::json!([["x", "y", "c"]])),
            None
        );
    }

    #[test]
    fn zeroed_pose_has_no_confidence() {
        let pose = Pose::zeroed(JOINT_COUNT);
        assert_eq!(pose.len(), JOINT_COUNT);
        assert!(pose.joints().iter().all(|kp| kp.confidence == 0.0));
    }
}
