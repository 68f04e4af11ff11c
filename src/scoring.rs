//! Distance-based movement-quality scoring between two poses.

use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::pose::{Keypoint, Pose};

/// The three distance aggregates returned for one live comparison.
///
/// `mean_thresh` is `None` when no joint cleared the confidence gate in
/// both poses; averaging over an empty set is never done silently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PoseScore {
    pub mean_all: f32,
    pub mean_thresh: Option<f32>,
    pub weighted_mean: f32,
}

impl PoseScore {
    /// Neutral fallback returned when no reference data is available yet.
    pub const ZERO: PoseScore = PoseScore {
        mean_all: 0.0,
        mean_thresh: None,
        weighted_mean: 0.0,
    };
}

/// Per-joint weighting used by the weighted mean.
///
/// `LiveConfidence` reproduces the shipped behavior: the weight is the live
/// pose's confidence alone (the reference never participates).
/// `AveragedConfidence` is the corrected variant; swapping it in changes no
/// other part of the engine's contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WeightStrategy {
    #[default]
    LiveConfidence,
    AveragedConfidence,
}

impl WeightStrategy {
    fn weight(self, live: &Keypoint, reference: &Keypoint) -> f32 {
        match self {
            Self::LiveConfidence => live.confidence,
            Self::AveragedConfidence => (live.confidence + reference.confidence) / 2.0,
        }
    }
}

/// Pure scoring over two equal-length poses.
#[derive(Debug, Clone, Copy)]
pub struct ScoringEngine {
    confidence_gate: f32,
    weighting: WeightStrategy,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self {
            confidence_gate: 0.5,
            weighting: WeightStrategy::default(),
        }
    }
}

impl ScoringEngine {
    pub fn new(confidence_gate: f32, weighting: WeightStrategy) -> Self {
        Self {
            confidence_gate,
            weighting,
        }
    }

    /// Score `live` against `reference`.
    ///
    /// Distances are Euclidean over (x, y) only; confidence never enters the
    /// distance itself. `mean_all` and `mean_thresh` are symmetric under
    /// swapping the arguments; `weighted_mean` is not, since its weights
    /// depend only on the live pose.
    pub fn score(&self, live: &Pose, reference: &Pose) -> Result<PoseScore> {
        if live.len() != reference.len() {
            return Err(PipelineError::ShapeMismatch {
                live: live.len(),
                reference: reference.len(),
            });
        }
        if live.is_empty() {
            return Ok(PoseScore::ZERO);
        }

        let joints = live.joints().iter().zip(reference.joints());

        let mut dist_sum = 0.0f32;
        let mut gated_sum = 0.0f32;
        let mut gated_n = 0usize;
        let mut weighted_sum = 0.0f32;
        let mut weight_sum = 0.0f32;

        for (live_kp, ref_kp) in joints {
            let distance = ((live_kp.x - ref_kp.x).powi(2) + (live_kp.y - ref_kp.y).powi(2)).sqrt();
            dist_sum += distance;

            if live_kp.confidence > self.confidence_gate
                && ref_kp.confidence > self.confidence_gate
            {
                gated_sum += distance;
                gated_n += 1;
            }

            let weight = self.weighting.weight(live_kp, ref_kp);
            weighted_sum += distance * weight;
            weight_sum += weight;
        }

        let mean_all = dist_sum / live.len() as f32;
        let mean_thresh = (gated_n > 0).then(|| gated_sum / gated_n as f32);
        let weighted_mean = if weight_sum == 0.0 {
            0.0
        } else {
            weighted_sum / weight_sum
        };

        Ok(PoseScore {
            mean_all,
            mean_thresh,
            weighted_mean,
        })
    }
}
