//! Blob storage for uploaded videos and live snapshots.
//!
//! Two backends behind one narrow interface: local disk (when
//! `LOCAL_STORAGE_PATH` is set) or Google Cloud Storage. Keys are
//! namespaced by purpose, e.g. `videos/2026-08-07/1754550000000_3f2a.mp4`.

use bytes::Bytes;
use chrono::Utc;
use std::path::PathBuf;

use crate::error::{PipelineError, Result};

const VIDEO_PREFIX: &str = "videos";
const SNAPSHOT_PREFIX: &str = "snapshots";

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        _ => "bin",
    }
}

fn build_key(prefix: &str, content_type: &str) -> String {
    let now = Utc::now();
    let day_bucket = now.format("%Y-%m-%d");
    let timestamp = now.timestamp_millis();
    let nonce: u16 = rand::random();
    let ext = extension_for(content_type);
    format!("{prefix}/{day_bucket}/{timestamp}_{nonce:04x}.{ext}")
}

/// Narrow blob-store wrapper shared by ingestion and extraction.
pub struct MediaStore {
    gcs: Option<google_cloud_storage::client::Storage>,
    local_root: Option<PathBuf>,
    bucket_name: String,
}

impl MediaStore {
    pub fn with_gcs(
        gcs: google_cloud_storage::client::Storage,
        bucket_name: impl Into<String>,
    ) -> Self {
        Self {
            gcs: Some(gcs),
            local_root: None,
            bucket_name: bucket_name.into(),
        }
    }

    pub fn with_local(root: PathBuf) -> Self {
        Self {
            gcs: None,
            local_root: Some(root),
            bucket_name: String::new(),
        }
    }

    /// Fresh namespaced key for an uploaded exercise video.
    pub fn video_key(&self, content_type: &str) -> String {
        build_key(VIDEO_PREFIX, content_type)
    }

    /// Fresh namespaced key for a live snapshot frame.
    pub fn snapshot_key(&self, content_type: &str) -> String {
        build_key(SNAPSHOT_PREFIX, content_type)
    }

    pub async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        if let Some(root) = &self.local_root {
            let full_path = root.join(key);
            if let Some(parent) = full_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&full_path, data).await?;
        } else if let Some(gcs) = &self.gcs {
            let bucket = format!("projects/_/buckets/{}", self.bucket_name);
            let bytes = Bytes::copy_from_slice(data);
            gcs.write_object(&bucket, key, bytes)
                .send_buffered()
                .await
                .map_err(PipelineError::storage)?;
        } else {
            return Err(PipelineError::Storage(
                "no storage backend configured (set LOCAL_STORAGE_PATH or GOOGLE_APPLICATION_CREDENTIALS)".into(),
            ));
        }
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        if let Some(root) = &self.local_root {
            let full_path = root.join(key);
            if !full_path.exists() {
                return Err(PipelineError::NotFound(key.to_string()));
            }
            Ok(tokio::fs::read(&full_path).await?)
        } else if let Some(gcs) = &self.gcs {
            let bucket = format!("projects/_/buckets/{}", self.bucket_name);
            let mut resp = gcs
                .read_object(&bucket, key)
                .send()
                .await
                .map_err(|_| PipelineError::NotFound(key.to_string()))?;
            let mut data = Vec::new();
            while let Some(chunk) = resp.next().await {
                data.extend_from_slice(&chunk.map_err(PipelineError::storage)?);
            }
            Ok(data)
        } else {
            Err(PipelineError::Storage("no storage backend configured".into()))
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        if let Some(root) = &self.local_root {
            root.join(key).exists()
        } else if let Some(gcs) = &self.gcs {
            let bucket = format!("projects/_/buckets/{}", self.bucket_name);
            gcs.read_object(&bucket, key).send().await.is_ok()
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_purpose() {
        let store = MediaStore::with_local(std::env::temp_dir());
        assert!(store.video_key("video/mp4").starts_with("videos/"));
        assert!(store.video_key("video/mp4").ends_with(".mp4"));
        assert!(store.snapshot_key("image/png").starts_with("snapshots/"));
        assert!(store.snapshot_key("image/png").ends_with(".png"));
    }

    #[tokio::test]
    async fn local_backend_round_trips() {
        let root =
            std::env::temp_dir().join(format!("rehab_media_test_{}", rand::random::<u64>()));
        let store = MediaStore::with_local(root.clone());

        let key = store.video_key("video/mp4");
        assert!(!store.exists(&key).await);

        store.put(&key, b"fake mp4 bytes").await.unwrap();
        assert!(store.exists(&key).await);
        assert_eq!(store.get(&key).await.unwrap(), b"fake mp4 bytes");

        let missing = store.get("videos/nope.mp4").await.unwrap_err();
        assert!(matches!(missing, PipelineError::NotFound(_)));

        let _ = std::fs::remove_dir_all(&root);
    }
}
