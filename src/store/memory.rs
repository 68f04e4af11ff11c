//! In-memory keypoint store for tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::error::{PipelineError, Result};
use crate::pose::{Pose, PoseFrameRecord};
use crate::store::KeypointStore;

/// `HashMap`-backed [`KeypointStore`] with the same last-write-wins append
/// semantics as the Postgres store.
#[derive(Debug, Default)]
pub struct MemoryKeypointStore {
    records: Mutex<HashMap<String, Vec<PoseFrameRecord>>>,
}

impl MemoryKeypointStore {
    /// Stored frame indices for one video, in creation order. Test helper.
    pub fn frame_indices(&self, video_ref: &str) -> Vec<u64> {
        let records = self.records.lock().expect("store lock poisoned");
        records
            .get(video_ref)
            .map(|rows| rows.iter().map(|r| r.frame_index).collect())
            .unwrap_or_default()
    }
}

impl KeypointStore for MemoryKeypointStore {
    async fn append(&self, video_ref: &str, frame_index: u64, pose: &Pose) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| PipelineError::Storage("store lock poisoned".into()))?;
        let rows = records.entry(video_ref.to_string()).or_default();

        if let Some(existing) = rows.iter_mut().find(|r| r.frame_index == frame_index) {
            existing.pose = pose.clone();
        } else {
            rows.push(PoseFrameRecord {
                video_ref: video_ref.to_string(),
                frame_index,
                pose: pose.clone(),
                created_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn get(&self, video_ref: &str, frame_index: u64) -> Result<Option<Pose>> {
        let records = self
            .records
            .lock()
            .map_err(|_| PipelineError::Storage("store lock poisoned".into()))?;
        Ok(records.get(video_ref).and_then(|rows| {
            rows.iter()
                .find(|r| r.frame_index == frame_index)
                .map(|r| r.pose.clone())
        }))
    }

    async fn count(&self, video_ref: &str) -> Result<u64> {
        let records = self
            .records
            .lock()
            .map_err(|_| PipelineError::Storage("store lock poisoned".into()))?;
        Ok(records.get(video_ref).map(|rows| rows.len() as u64).unwrap_or(0))
    }
}
