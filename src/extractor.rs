//! Frame extraction: decodes uploaded media and runs pose inference on it.
//!
//! Videos are decoded to per-frame JPEGs in a scratch directory by ffmpeg;
//! inference only happens when a frame is actually consumed, so callers that
//! skip frames never pay for them.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;

use crate::error::{PipelineError, Result};
use crate::model::{PoseModel, primary_pose};
use crate::pose::Pose;

const ACCEPTED_VIDEO: &[(&str, &str)] = &[
    ("video/mp4", "mp4"),
    ("video/webm", "webm"),
    ("video/quicktime", "mov"),
];

const ACCEPTED_IMAGE: &[&str] = &["image/png", "image/jpeg", "image/jpg", "image/webp"];

fn video_extension(content_type: &str) -> Option<&'static str> {
    ACCEPTED_VIDEO
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .map(|(_, ext)| *ext)
}

pub(crate) fn is_supported_video(content_type: &str) -> bool {
    video_extension(content_type).is_some()
}

/// A lazy, finite, non-restartable cursor over the frames of one piece of
/// media, yielding poses in increasing frame-index order starting at 0.
pub trait FrameSource: Send {
    /// Index of the frame the cursor currently sits on.
    fn position(&self) -> u64;

    fn is_exhausted(&self) -> bool;

    /// Advance past the cursor frame without decoding or inference.
    fn skip_frame(&mut self);

    /// Decode the cursor frame, run inference, and advance. A frame with no
    /// detected body yields the empty-pose sentinel, never an omission.
    fn next_frame(&mut self) -> impl Future<Output = Result<Option<(u64, Pose)>>> + Send;
}

/// Wraps a [`PoseModel`] with the media handling it needs: MIME gating,
/// video decoding, and single-frame extraction for live snapshots.
pub struct PoseExtractor<M> {
    model: Arc<M>,
}

impl<M: PoseModel> PoseExtractor<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self { model }
    }

    /// Decode a full video into a [`VideoFrames`] cursor.
    ///
    /// The whole video is dumped to frame files up front (decode is cheap,
    /// inference is not); the returned cursor runs the model per consumed
    /// frame. Fails with `UnsupportedMedia` for codecs outside the accepted
    /// set and `ModelInference` if ffmpeg cannot decode the stream.
    pub async fn open_video(&self, video: &[u8], content_type: &str) -> Result<VideoFrames<M>> {
        let ext = video_extension(content_type).ok_or_else(|| {
            PipelineError::UnsupportedMedia {
                content_type: content_type.to_string(),
            }
        })?;

        let scratch = std::env::temp_dir().join(format!("rehab_pose_{}", rand::random::<u64>()));
        tokio::fs::create_dir_all(&scratch).await?;

        let input_path = scratch.join(format!("input.{ext}"));
        tokio::fs::write(&input_path, video).await?;

        let output_pattern = scratch.join("frame_%05d.jpg");
        let output = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-nostdin"])
            .arg("-i")
            .arg(&input_path)
            .args(["-an", "-sn"])
            .args(["-vsync", "0"])
            .args(["-q:v", "4"])
            .arg("-y")
            .arg(&output_pattern)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            cleanup_scratch_dir(&scratch);
            return Err(PipelineError::ModelInference(format!(
                "ffmpeg frame decode failed: {stderr}"
            )));
        }

        let mut frames: Vec<PathBuf> = Vec::new();
        let mut entries = tokio::fs::read_dir(&scratch).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "jpg").unwrap_or(false)
                && path
                    .file_name()
                    .map(|n| n.to_string_lossy().starts_with("frame_"))
                    .unwrap_or(false)
            {
                frames.push(path);
            }
        }
        frames.sort();

        Ok(VideoFrames {
            scratch,
            frames,
            cursor: 0,
            model: Arc::clone(&self.model),
        })
    }

    /// Single-frame form for live snapshots. Picks the primary detection
    /// when several bodies are present.
    pub async fn extract_image(&self, image: &[u8], content_type: &str) -> Result<Pose> {
        if !ACCEPTED_IMAGE.contains(&content_type) {
            return Err(PipelineError::UnsupportedMedia {
                content_type: content_type.to_string(),
            });
        }
        // Reject payloads that do not even sniff as an image before spending
        // an inference call on them.
        image::guess_format(image).map_err(|_| PipelineError::UnsupportedMedia {
            content_type: content_type.to_string(),
        })?;

        let poses = self.model.infer(image, content_type).await?;
        Ok(primary_pose(poses))
    }
}

/// Frame cursor over one decoded video. Owns its scratch directory and
/// removes it on drop.
pub struct VideoFrames<M> {
    scratch: PathBuf,
    frames: Vec<PathBuf>,
    cursor: usize,
    model: Arc<M>,
}

impl<M> VideoFrames<M> {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl<M: PoseModel> FrameSource for VideoFrames<M> {
    fn position(&self) -> u64 {
        self.cursor as u64
    }

    fn is_exhausted(&self) -> bool {
        self.cursor >= self.frames.len()
    }

    fn skip_frame(&mut self) {
        if self.cursor < self.frames.len() {
            self.cursor += 1;
        }
    }

    async fn next_frame(&mut self) -> Result<Option<(u64, Pose)>> {
        let Some(path) = self.frames.get(self.cursor) else {
            return Ok(None);
        };

        let frame_data = tokio::fs::read(path).await?;
        let poses = self.model.infer(&frame_data, "image/jpeg").await?;

        let index = self.cursor as u64;
        self.cursor += 1;
        Ok(Some((index, primary_pose(poses))))
    }
}

impl<M> Drop for VideoFrames<M> {
    fn drop(&mut self) {
        cleanup_scratch_dir(&self.scratch);
    }
}

fn cleanup_scratch_dir(scratch: &PathBuf) {
    if let Err(e) = std::fs::remove_dir_all(scratch) {
        eprintln!("[extract] Failed to clean up scratch dir {scratch:?}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverModel;

    impl PoseModel for NeverModel {
        async fn infer(&self, _image: &[u8], _content_type: &str) -> Result<Vec<Pose>> {
            panic!("inference must not run for rejected media");
        }
    }

    #[test]
    fn video_extensions_cover_accepted_codecs() {
        assert_eq!(video_extension("video/mp4"), Some("mp4"));
        assert_eq!(video_extension("video/quicktime"), Some("mov"));
        assert_eq!(video_extension("video/x-flv"), None);
    }

    #[tokio::test]
    async fn open_video_rejects_unsupported_mime() {
        let extractor = PoseExtractor::new(Arc::new(NeverModel));
        match extractor.open_video(b"not a video", "audio/ogg").await {
            Err(PipelineError::UnsupportedMedia { content_type }) => {
                assert_eq!(content_type, "audio/ogg");
            }
            Err(other) => panic!("wrong error: {other}"),
            Ok(_) => panic!("unsupported codec must be rejected"),
        }
    }

    #[tokio::test]
    async fn extract_image_rejects_unsupported_mime() {
        let extractor = PoseExtractor::new(Arc::new(NeverModel));
        let err = extractor
            .extract_image(b"....", "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedMedia { .. }));
    }

    #[tokio::test]
    async fn extract_image_rejects_undecodable_payload() {
        let extractor = PoseExtractor::new(Arc::new(NeverModel));
        let err = extractor
            .extract_image(b"definitely not pixels", "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedMedia { .. }));
    }
}
