//! Drives a frame source through decimation and persistence.

use crate::error::Result;
use crate::extractor::FrameSource;
use crate::store::KeypointStore;

/// Counters from one extraction run, for the supervisor log line and the
/// success status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Frames walked past, sampled or not.
    pub frames_seen: u64,
    /// Frames on the stride that went through inference.
    pub frames_sampled: u64,
    /// Frames that produced a stored record.
    pub frames_stored: u64,
    /// Sampled frames with no detected body, skipped without a write.
    pub frames_empty: u64,
}

/// Convert a full video into a decimated, persisted pose-record series.
///
/// Only frames whose index is divisible by `sample_rate` are considered;
/// off-stride frames are skipped without inference. Sampled frames with no
/// detection are dropped entirely. Each accepted frame issues exactly one
/// `append`; writes are independent per frame, so a mid-run failure leaves
/// every record already committed in place.
pub async fn run_extraction<S, K>(
    mut source: S,
    store: &K,
    video_ref: &str,
    sample_rate: u32,
) -> Result<ExtractionSummary>
where
    S: FrameSource,
    K: KeypointStore,
{
    let stride = u64::from(sample_rate.max(1));
    let mut summary = ExtractionSummary::default();

    while !source.is_exhausted() {
        if source.position() % stride != 0 {
            source.skip_frame();
            summary.frames_seen += 1;
            continue;
        }

        let Some((frame_index, pose)) = source.next_frame().await? else {
            break;
        };
        summary.frames_seen += 1;
        summary.frames_sampled += 1;

        if pose.is_empty() {
            summary.frames_empty += 1;
            continue;
        }

        store.append(video_ref, frame_index, &pose).await?;
        summary.frames_stored += 1;
    }

    println!(
        "[extract] {}: stored {} of {} sampled frames ({} empty, {} seen)",
        video_ref,
        summary.frames_stored,
        summary.frames_sampled,
        summary.frames_empty,
        summary.frames_seen
    );

    Ok(summary)
}
