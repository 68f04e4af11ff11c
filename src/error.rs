//! Error types for the extraction and scoring pipeline.

use std::fmt;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while extracting, storing, or scoring poses.
#[derive(Debug)]
pub enum PipelineError {
    /// The input codec/MIME type is not one the pose model accepts.
    UnsupportedMedia { content_type: String },
    /// Frame decoding or model inference failed.
    ModelInference(String),
    /// Live and reference poses have different joint counts.
    ShapeMismatch { live: usize, reference: usize },
    /// Blob or relational store failure, including scratch-file I/O.
    Storage(String),
    /// The referenced video does not exist.
    NotFound(String),
}

impl PipelineError {
    pub(crate) fn storage(err: impl fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedMedia { content_type } => {
                write!(f, "unsupported media type: {content_type}")
            }
            Self::ModelInference(msg) => write!(f, "pose inference failed: {msg}"),
            Self::ShapeMismatch { live, reference } => {
                write!(f, "pose length mismatch: live {live} vs reference {reference}")
            }
            Self::Storage(msg) => write!(f, "storage error: {msg}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<sqlx::Error> for PipelineError {
    fn from(value: sqlx::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(value: reqwest::Error) -> Self {
        Self::ModelInference(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let err = PipelineError::UnsupportedMedia {
            content_type: "audio/ogg".to_string(),
        };
        assert_eq!(err.to_string(), "unsupported media type: audio/ogg");

        let err = PipelineError::ShapeMismatch {
            live: 0,
            reference: 17,
        };
        assert_eq!(err.to_string(), "pose length mismatch: live 0 vs reference 17");
    }
}
