//! Process-owned wiring of the extraction and scoring pipeline.

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::extractor::{PoseExtractor, is_supported_video};
use crate::feedback::FeedbackService;
use crate::media::MediaStore;
use crate::model::PoseModel;
use crate::sampler::run_extraction;
use crate::scoring::{PoseScore, ScoringEngine, WeightStrategy};
use crate::store::KeypointStore;
use crate::supervisor::{ExtractionStatus, ExtractionSupervisor};

/// One instance per process: owns the store handles, the pose model client,
/// the extraction supervisor, and the feedback service. The HTTP layer
/// builds a `Pipeline` at startup and calls it per request.
pub struct Pipeline<M, K> {
    model: Arc<M>,
    store: Arc<K>,
    media: Arc<MediaStore>,
    supervisor: Arc<ExtractionSupervisor>,
    feedback: FeedbackService<M, K>,
    config: PipelineConfig,
}

impl<M, K> Pipeline<M, K>
where
    M: PoseModel + 'static,
    K: KeypointStore + 'static,
{
    pub fn new(
        config: PipelineConfig,
        model: Arc<M>,
        store: Arc<K>,
        media: Arc<MediaStore>,
    ) -> Self {
        let engine = ScoringEngine::new(config.confidence_gate, WeightStrategy::default());
        let feedback = FeedbackService::new(
            Arc::clone(&model),
            Arc::clone(&store),
            Arc::clone(&media),
            engine,
            config.sample_rate,
            config.inference_concurrency,
            config.inference_timeout,
        );

        Self {
            model,
            store,
            media,
            supervisor: Arc::new(ExtractionSupervisor::new()),
            feedback,
            config,
        }
    }

    /// Persist an uploaded exercise video and launch its extraction
    /// detached. Returns the video reference as soon as the blob is
    /// written; extraction progress is visible only through
    /// [`Pipeline::extraction_status`] and the growing store count.
    pub async fn ingest_video(&self, video: &[u8], content_type: &str) -> Result<String> {
        if !is_supported_video(content_type) {
            return Err(PipelineError::UnsupportedMedia {
                content_type: content_type.to_string(),
            });
        }

        let video_ref = self.media.video_key(content_type);
        self.media.put(&video_ref, video).await?;
        self.supervisor.register(&video_ref);

        let model = Arc::clone(&self.model);
        let store = Arc::clone(&self.store);
        let media = Arc::clone(&self.media);
        let task_ref = video_ref.clone();
        let task_content_type = content_type.to_string();
        let sample_rate = self.config.sample_rate;

        self.supervisor.launch(&video_ref, self.config.extraction_timeout, async move {
            let bytes = media.get(&task_ref).await?;
            let extractor = PoseExtractor::new(model);
            let frames = extractor.open_video(&bytes, &task_content_type).await?;
            run_extraction(frames, &*store, &task_ref, sample_rate).await
        });

        Ok(video_ref)
    }

    /// Score one live snapshot against the reference frame selected for the
    /// caller's progress counter.
    pub async fn live_feedback(
        &self,
        video_ref: &str,
        progress: u64,
        snapshot: &[u8],
        content_type: &str,
    ) -> Result<PoseScore> {
        self.feedback
            .score_snapshot(video_ref, progress, snapshot, content_type)
            .await
    }

    /// Pollable status of a detached extraction run.
    pub fn extraction_status(&self, video_ref: &str) -> Option<ExtractionStatus> {
        self.supervisor.status(video_ref)
    }

    /// Abort an in-flight extraction run; frames already stored stay.
    pub fn cancel_extraction(&self, video_ref: &str) -> bool {
        self.supervisor.cancel(video_ref)
    }
}
