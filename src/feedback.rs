//! Live-comparison orchestration: one snapshot scored against a stored
//! reference frame.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::{PipelineError, Result};
use crate::extractor::PoseExtractor;
use crate::media::MediaStore;
use crate::model::PoseModel;
use crate::pose::Pose;
use crate::scoring::{PoseScore, ScoringEngine};
use crate::selector::select_reference_frame;
use crate::store::KeypointStore;

/// Scores live snapshots against whatever extraction has stored so far.
///
/// `video_ref` arrives already authorized; ownership checks live with the
/// caller. Single-frame inference is CPU-bound, so calls are admitted
/// through a fixed-size semaphore and cut off by a timeout.
pub struct FeedbackService<M, K> {
    extractor: PoseExtractor<M>,
    store: Arc<K>,
    media: Arc<MediaStore>,
    engine: ScoringEngine,
    sample_rate: u32,
    permits: Arc<Semaphore>,
    inference_timeout: Duration,
}

impl<M: PoseModel, K: KeypointStore> FeedbackService<M, K> {
    pub fn new(
        model: Arc<M>,
        store: Arc<K>,
        media: Arc<MediaStore>,
        engine: ScoringEngine,
        sample_rate: u32,
        inference_concurrency: usize,
        inference_timeout: Duration,
    ) -> Self {
        Self {
            extractor: PoseExtractor::new(model),
            store,
            media,
            engine,
            sample_rate,
            permits: Arc::new(Semaphore::new(inference_concurrency.max(1))),
            inference_timeout,
        }
    }

    /// Score one live snapshot against the selected reference frame.
    ///
    /// A video whose extraction has not stored anything yet gets the neutral
    /// zero score, not an error; a `video_ref` that exists nowhere is
    /// `NotFound`.
    pub async fn score_snapshot(
        &self,
        video_ref: &str,
        progress: u64,
        snapshot: &[u8],
        content_type: &str,
    ) -> Result<PoseScore> {
        let stored_count = self.store.count(video_ref).await?;
        if stored_count == 0 {
            if !self.media.exists(video_ref).await {
                return Err(PipelineError::NotFound(video_ref.to_string()));
            }
            // Extraction has not caught up yet; explicit fallback.
            return Ok(PoseScore::ZERO);
        }

        let index = select_reference_frame(progress, stored_count, self.sample_rate);
        let Some(reference) = self.store.get(video_ref, index).await? else {
            return Ok(PoseScore::ZERO);
        };

        let live = {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| PipelineError::ModelInference("scoring admission closed".into()))?;
            tokio::time::timeout(
                self.inference_timeout,
                self.extractor.extract_image(snapshot, content_type),
            )
            .await
            .map_err(|_| {
                PipelineError::ModelInference(format!(
                    "live inference timed out after {}s",
                    self.inference_timeout.as_secs()
                ))
            })??
        };

        // An undetected live subject widens to a zero-confidence pose so the
        // confidence gate absorbs it instead of a shape error.
        let live = if live.is_empty() {
            Pose::zeroed(reference.len())
        } else {
            live
        };

        self.engine.score(&live, &reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{JOINT_COUNT, Keypoint};
    use crate::store::MemoryKeypointStore;

    /// Returns the same scripted detections for every frame it is shown.
    struct FixedModel {
        poses: Vec<Pose>,
    }

    impl PoseModel for FixedModel {
        async fn infer(&self, _image: &[u8], _content_type: &str) -> Result<Vec<Pose>> {
            Ok(self.poses.clone())
        }
    }

    fn pose_at(x: f32, confidence: f32) -> Pose {
        Pose::new(vec![Keypoint::new(x, 0.0, confidence); JOINT_COUNT])
    }

    // Tiny valid PNG header so the snapshot passes the decodability sniff.
    const PNG_MAGIC: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
    ];

    fn service(
        detections: Vec<Pose>,
        store: Arc<MemoryKeypointStore>,
        media: Arc<MediaStore>,
    ) -> FeedbackService<FixedModel, MemoryKeypointStore> {
        FeedbackService::new(
            Arc::new(FixedModel { poses: detections }),
            store,
            media,
            ScoringEngine::default(),
            1,
            2,
            Duration::from_secs(5),
        )
    }

    fn local_media() -> (Arc<MediaStore>, std::path::PathBuf) {
        let root =
            std::env::temp_dir().join(format!("rehab_feedback_test_{}", rand::random::<u64>()));
        (Arc::new(MediaStore::with_local(root.clone())), root)
    }

    #[tokio::test]
    async fn unknown_video_ref_is_not_found() {
        let (media, root) = local_media();
        let svc = service(vec![pose_at(1.0, 0.9)], Arc::new(MemoryKeypointStore::default()), media);

        let err = svc
            .score_snapshot("videos/ghost.mp4", 0, PNG_MAGIC, "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn empty_store_returns_neutral_fallback() {
        let (media, root) = local_media();
        media.put("videos/v1.mp4", b"bytes").await.unwrap();

        let svc = service(vec![pose_at(1.0, 0.9)], Arc::new(MemoryKeypointStore::default()), media);
        let score = svc
            .score_snapshot("videos/v1.mp4", 42, PNG_MAGIC, "image/png")
            .await
            .unwrap();
        assert_eq!(score, PoseScore::ZERO);
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn absent_reference_record_returns_neutral_fallback() {
        let (media, root) = local_media();
        let store = Arc::new(MemoryKeypointStore::default());
        // Records stored at stride-5 indices: the selected index (count - 1)
        // has no record behind it.
        store.append("videos/v2.mp4", 0, &pose_at(0.0, 0.9)).await.unwrap();
        store.append("videos/v2.mp4", 5, &pose_at(1.0, 0.9)).await.unwrap();

        let svc = service(vec![pose_at(1.0, 0.9)], store, media);
        let score = svc
            .score_snapshot("videos/v2.mp4", 0, PNG_MAGIC, "image/png")
            .await
            .unwrap();
        assert_eq!(score, PoseScore::ZERO);
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn scores_live_pose_against_selected_reference() {
        let (media, root) = local_media();
        let store = Arc::new(MemoryKeypointStore::default());
        // Dense indices (stride 1): the selector lands on the newest frame.
        store.append("videos/v3.mp4", 0, &pose_at(0.0, 0.9)).await.unwrap();
        store.append("videos/v3.mp4", 1, &pose_at(2.0, 0.9)).await.unwrap();

        let svc = service(vec![pose_at(5.0, 0.9)], store, media);
        let score = svc
            .score_snapshot("videos/v3.mp4", 7, PNG_MAGIC, "image/png")
            .await
            .unwrap();

        // Live x=5 vs reference x=2 at every joint.
        assert!((score.mean_all - 3.0).abs() < 1e-5);
        assert_eq!(score.mean_thresh, Some(score.mean_all));
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn undetected_live_subject_is_gated_not_an_error() {
        let (media, root) = local_media();
        let store = Arc::new(MemoryKeypointStore::default());
        store.append("videos/v4.mp4", 0, &pose_at(2.0, 0.9)).await.unwrap();

        let svc = service(Vec::new(), store, media);
        let score = svc
            .score_snapshot("videos/v4.mp4", 0, PNG_MAGIC, "image/png")
            .await
            .unwrap();

        // Zero-confidence live joints: gate empty, weighted mean zero.
        assert_eq!(score.mean_thresh, None);
        assert_eq!(score.weighted_mean, 0.0);
        let _ = std::fs::remove_dir_all(root);
    }
}
