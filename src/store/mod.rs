//! Durable append/query interface for per-frame pose records.

use std::future::Future;

use crate::error::Result;
use crate::pose::Pose;

mod memory;
mod postgres;

pub use memory::MemoryKeypointStore;
pub use postgres::PgKeypointStore;

/// Append/query interface for pose-frame records, keyed by video reference
/// and frame index.
///
/// Readers may observe a store still being written to by an in-flight
/// extraction run: visibility grows monotonically and no record is ever
/// removed or revised except by a retried append for the same key.
/// `count` approximates how far extraction has progressed; it never
/// guarantees completion.
pub trait KeypointStore: Send + Sync {
    /// Persist one frame's pose. A retried append for the same
    /// `(video_ref, frame_index)` replaces the earlier record instead of
    /// duplicating it.
    fn append(
        &self,
        video_ref: &str,
        frame_index: u64,
        pose: &Pose,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetch the pose stored at `frame_index`, if any.
    fn get(
        &self,
        video_ref: &str,
        frame_index: u64,
    ) -> impl Future<Output = Result<Option<Pose>>> + Send;

    /// Number of records currently stored for `video_ref`.
    fn count(&self, video_ref: &str) -> impl Future<Output = Result<u64>> + Send;
}
