//! Extraction, storage, and scoring core for rehabilitation-video feedback.
//!
//! Uploaded exercise videos are decimated, run through an external
//! pose-estimation model, and persisted as per-frame keypoint records; live
//! snapshots are then scored against a selected reference frame to produce
//! movement-quality feedback. The HTTP layer that owns routing and auth
//! consumes this crate in-process through [`Pipeline`].

pub mod config;
pub mod error;
pub mod extractor;
pub mod feedback;
pub mod media;
pub mod model;
pub mod pipeline;
pub mod pose;
pub mod sampler;
pub mod scoring;
pub mod selector;
pub mod store;
pub mod supervisor;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use extractor::{FrameSource, PoseExtractor, VideoFrames};
pub use feedback::FeedbackService;
pub use media::MediaStore;
pub use model::{PoseModel, RemotePoseModel};
pub use pipeline::Pipeline;
pub use pose::{JOINT_COUNT, Keypoint, Pose, PoseFrameRecord};
pub use sampler::{ExtractionSummary, run_extraction};
pub use scoring::{PoseScore, ScoringEngine, WeightStrategy};
pub use selector::select_reference_frame;
pub use store::{KeypointStore, MemoryKeypointStore, PgKeypointStore};
pub use supervisor::{ExtractionStatus, ExtractionSupervisor};
