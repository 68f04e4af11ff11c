//! Seam to the external pose-estimation model.

use std::future::Future;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::pose::{JOINT_COUNT, Keypoint, Pose};

/// Pluggable pose-estimation model.
///
/// `infer` takes one encoded frame and returns every body detected in it,
/// each as a fixed-length pose in the canonical joint order. An empty vec
/// (or an empty pose) means no subject was found. Inference failures are
/// surfaced as [`PipelineError::ModelInference`] and are not retried here.
pub trait PoseModel: Send + Sync {
    fn infer(
        &self,
        image: &[u8],
        content_type: &str,
    ) -> impl Future<Output = Result<Vec<Pose>>> + Send;
}

#[derive(Debug, Deserialize)]
struct InferResponse {
    poses: Vec<Vec<[f32; 3]>>,
}

/// HTTP client for a remote pose-estimation service.
///
/// Posts the raw frame to `{base_url}/infer` and expects
/// `{"poses": [[[x, y, confidence], ...], ...]}` back.
#[derive(Debug, Clone)]
pub struct RemotePoseModel {
    base_url: String,
    http: reqwest::Client,
}

impl RemotePoseModel {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let base_url = config.model_url.clone().ok_or_else(|| {
            PipelineError::ModelInference("POSE_MODEL_URL is not set".to_string())
        })?;
        Self::new(base_url, config.inference_timeout)
    }
}

impl PoseModel for RemotePoseModel {
    async fn infer(&self, image: &[u8], content_type: &str) -> Result<Vec<Pose>> {
        let url = format!("{}/infer", self.base_url);
        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, content_type)
            .body(image.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::ModelInference(format!(
                "unexpected status {status}: {body}"
            )));
        }

        let parsed: InferResponse = response.json().await?;

        let mut poses = Vec::with_capacity(parsed.poses.len());
        for rows in parsed.poses {
            // A detection must carry the full joint set; zero joints is the
            // "no subject" sentinel and passes through unchanged.
            if !rows.is_empty() && rows.len() != JOINT_COUNT {
                return Err(PipelineError::ModelInference(format!(
                    "model returned a pose with {} joints, expected {JOINT_COUNT}",
                    rows.len()
                )));
            }
            poses.push(Pose::new(rows.into_iter().map(Keypoint::from).collect()));
        }

        Ok(poses)
    }
}

/// The pose stored and compared per frame: the model's primary detection,
/// or the empty sentinel when nothing was found. Models emit detections in
/// descending confidence, so the first one is the subject.
pub(crate) fn primary_pose(mut poses: Vec<Pose>) -> Pose {
    if poses.is_empty() {
        Pose::empty()
    } else {
        poses.swap_remove(0)
    }
}
