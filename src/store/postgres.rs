//! Postgres-backed keypoint store.
//!
//! One append-only table, one row per extracted frame. The keypoints column
//! is the nested `[[x, y, confidence], ...]` JSONB array; rows are bound
//! into typed [`Pose`] values at this boundary and malformed rows are
//! rejected here rather than propagated.

use sqlx::PgPool;

use crate::error::{PipelineError, Result};
use crate::pose::Pose;
use crate::store::KeypointStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pose_frames (
    id BIGSERIAL PRIMARY KEY,
    video_ref TEXT NOT NULL,
    frame_index BIGINT NOT NULL,
    keypoints JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE UNIQUE INDEX IF NOT EXISTS pose_frames_video_ref_frame_index_idx
    ON pose_frames (video_ref, frame_index);
"#;

#[derive(Debug, sqlx::FromRow)]
struct KeypointsRow {
    keypoints: serde_json::Value,
}

#[derive(Debug, sqlx::FromRow)]
struct CountRow {
    count: i64,
}

/// [`KeypointStore`] over a shared connection pool. The pool is owned by the
/// process and passed in; this type never opens connections of its own.
#[derive(Debug, Clone)]
pub struct PgKeypointStore {
    pool: PgPool,
}

impl PgKeypointStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the pose_frames table and its unique index if missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

impl KeypointStore for PgKeypointStore {
    async fn append(&self, video_ref: &str, frame_index: u64, pose: &Pose) -> Result<()> {
        // Single-row transaction per frame; a retried extraction lands on
        // the unique index and replaces the earlier row.
        sqlx::query(
            r#"
            INSERT INTO pose_frames (video_ref, frame_index, keypoints)
            VALUES ($1, $2, $3)
            ON CONFLICT (video_ref, frame_index)
            DO UPDATE SET keypoints = EXCLUDED.keypoints
            "#,
        )
        .bind(video_ref)
        .bind(frame_index as i64)
        .bind(pose.to_json())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, video_ref: &str, frame_index: u64) -> Result<Option<Pose>> {
        let row: Option<KeypointsRow> = sqlx::query_as(
            r#"
            SELECT keypoints FROM pose_frames
            WHERE video_ref = $1 AND frame_index = $2
            "#,
        )
        .bind(video_ref)
        .bind(frame_index as i64)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some(row) => Pose::from_json(&row.keypoints).map(Some).ok_or_else(|| {
                PipelineError::Storage(format!(
                    "malformed keypoints row for {video_ref} frame {frame_index}"
                ))
            }),
        }
    }

    async fn count(&self, video_ref: &str) -> Result<u64> {
        let row: CountRow =
            sqlx::query_as("SELECT COUNT(*) as count FROM pose_frames WHERE video_ref = $1")
                .bind(video_ref)
                .fetch_one(&self.pool)
                .await?;

        Ok(row.count.max(0) as u64)
    }
}
