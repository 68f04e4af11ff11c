//! Environment-driven pipeline configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SAMPLE_RATE: u32 = 5;
const DEFAULT_CONFIDENCE_GATE: f32 = 0.5;
const DEFAULT_INFERENCE_CONCURRENCY: usize = 4;
const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 900;
const DEFAULT_BUCKET_NAME: &str = "rehab_media_data";

/// Knobs for the extraction and scoring pipeline. Built once at process
/// startup and handed to [`crate::Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Frame-index stride: only frames divisible by this are extracted.
    pub sample_rate: u32,
    /// Per-joint confidence threshold for gated distance calculations.
    pub confidence_gate: f32,
    /// Maximum concurrent live-scoring inference calls.
    pub inference_concurrency: usize,
    /// Timeout for a single live-scoring inference call.
    pub inference_timeout: Duration,
    /// Timeout for one detached extraction run.
    pub extraction_timeout: Duration,
    /// Endpoint of the external pose-estimation service.
    pub model_url: Option<String>,
    /// Blob bucket holding uploaded videos and snapshots.
    pub bucket_name: String,
    /// Local-disk blob root; when set, the bucket is bypassed entirely.
    pub local_storage_path: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            sample_rate: sample_rate(),
            confidence_gate: confidence_gate(),
            inference_concurrency: inference_concurrency(),
            inference_timeout: Duration::from_secs(inference_timeout_secs()),
            extraction_timeout: Duration::from_secs(extraction_timeout_secs()),
            model_url: env::var("POSE_MODEL_URL").ok(),
            bucket_name: env::var("BUCKET_NAME")
                .unwrap_or_else(|_| DEFAULT_BUCKET_NAME.to_string()),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok().map(PathBuf::from),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            confidence_gate: DEFAULT_CONFIDENCE_GATE,
            inference_concurrency: DEFAULT_INFERENCE_CONCURRENCY,
            inference_timeout: Duration::from_secs(DEFAULT_INFERENCE_TIMEOUT_SECS),
            extraction_timeout: Duration::from_secs(DEFAULT_EXTRACTION_TIMEOUT_SECS),
            model_url: None,
            bucket_name: DEFAULT_BUCKET_NAME.to_string(),
            local_storage_path: None,
        }
    }
}

fn sample_rate() -> u32 {
    env::var("POSE_SAMPLE_RATE")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_SAMPLE_RATE)
}

fn confidence_gate() -> f32 {
    env::var("POSE_CONFIDENCE_GATE")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v| (0.0..=1.0).contains(v))
        .unwrap_or(DEFAULT_CONFIDENCE_GATE)
}

fn inference_concurrency() -> usize {
    env::var("POSE_INFERENCE_CONCURRENCY")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_INFERENCE_CONCURRENCY)
}

fn inference_timeout_secs() -> u64 {
    env::var("POSE_INFERENCE_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_INFERENCE_TIMEOUT_SECS)
}

fn extraction_timeout_secs() -> u64 {
    env::var("POSE_EXTRACTION_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_EXTRACTION_TIMEOUT_SECS)
}
