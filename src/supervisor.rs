//! Registry of detached extraction tasks.
//!
//! Upload handling returns before extraction finishes, so the task itself
//! can never report back to the uploading caller. This registry closes the
//! observability gap: each run carries a pollable status, failures are
//! logged and swallowed at the task boundary, and an in-flight run can be
//! aborted.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::Result;
use crate::sampler::ExtractionSummary;

/// Lifecycle of one detached extraction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStatus {
    Pending,
    Running,
    Succeeded { frames_stored: u64 },
    Failed { error: String },
    Cancelled,
}

struct TaskEntry {
    status: ExtractionStatus,
    handle: Option<JoinHandle<()>>,
}

/// Owns every detached extraction task in the process.
#[derive(Default)]
pub struct ExtractionSupervisor {
    tasks: Mutex<HashMap<String, TaskEntry>>,
}

impl ExtractionSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a run that is about to be launched.
    pub fn register(&self, video_ref: &str) {
        let mut tasks = self.tasks.lock().expect("supervisor lock poisoned");
        tasks.insert(
            video_ref.to_string(),
            TaskEntry {
                status: ExtractionStatus::Pending,
                handle: None,
            },
        );
    }

    /// Spawn `work` detached under `limit`. Errors and timeouts end up in
    /// the registry, never back at the uploading caller.
    pub fn launch<F>(self: &Arc<Self>, video_ref: &str, limit: Duration, work: F)
    where
        F: Future<Output = Result<ExtractionSummary>> + Send + 'static,
    {
        let supervisor = Arc::clone(self);
        let task_ref = video_ref.to_string();

        let handle = tokio::spawn(async move {
            supervisor.set_status(&task_ref, ExtractionStatus::Running);

            let outcome = match tokio::time::timeout(limit, work).await {
                Ok(Ok(summary)) => ExtractionStatus::Succeeded {
                    frames_stored: summary.frames_stored,
                },
                Ok(Err(e)) => {
                    eprintln!("[extract] {task_ref}: {e}");
                    ExtractionStatus::Failed {
                        error: e.to_string(),
                    }
                }
                Err(_) => {
                    eprintln!(
                        "[extract] {task_ref}: timed out after {}s",
                        limit.as_secs()
                    );
                    ExtractionStatus::Failed {
                        error: format!("timed out after {}s", limit.as_secs()),
                    }
                }
            };

            supervisor.finish(&task_ref, outcome);
        });

        let mut tasks = self.tasks.lock().expect("supervisor lock poisoned");
        let entry = tasks
            .entry(video_ref.to_string())
            .or_insert_with(|| TaskEntry {
                status: ExtractionStatus::Pending,
                handle: None,
            });
        entry.handle = Some(handle);
    }

    /// Pollable status for one run; `None` for refs never registered.
    pub fn status(&self, video_ref: &str) -> Option<ExtractionStatus> {
        let tasks = self.tasks.lock().expect("supervisor lock poisoned");
        tasks.get(video_ref).map(|entry| entry.status.clone())
    }

    /// Abort an in-flight run. Records already committed stay in place.
    /// Returns false once the run reached a terminal state.
    pub fn cancel(&self, video_ref: &str) -> bool {
        let mut tasks = self.tasks.lock().expect("supervisor lock poisoned");
        match tasks.get_mut(video_ref) {
            Some(entry)
                if matches!(
                    entry.status,
                    ExtractionStatus::Pending | ExtractionStatus::Running
                ) =>
            {
                if let Some(handle) = entry.handle.take() {
                    handle.abort();
                }
                entry.status = ExtractionStatus::Cancelled;
                println!("[extract] {video_ref}: cancelled");
                true
            }
            _ => false,
        }
    }

    fn set_status(&self, video_ref: &str, status: ExtractionStatus) {
        let mut tasks = self.tasks.lock().expect("supervisor lock poisoned");
        let entry = tasks
            .entry(video_ref.to_string())
            .or_insert_with(|| TaskEntry {
                status: ExtractionStatus::Pending,
                handle: None,
            });
        if entry.status != ExtractionStatus::Cancelled {
            entry.status = status;
        }
    }

    fn finish(&self, video_ref: &str, outcome: ExtractionStatus) {
        let mut tasks = self.tasks.lock().expect("supervisor lock poisoned");
        if let Some(entry) = tasks.get_mut(video_ref) {
            entry.handle = None;
            // A cancel that raced the task's completion wins.
            if entry.status != ExtractionStatus::Cancelled {
                entry.status = outcome;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    fn summary(stored: u64) -> ExtractionSummary {
        ExtractionSummary {
            frames_seen: stored,
            frames_sampled: stored,
            frames_stored: stored,
            frames_empty: 0,
        }
    }

    async fn settled(supervisor: &ExtractionSupervisor, video_ref: &str) -> ExtractionStatus {
        for _ in 0..100 {
            match supervisor.status(video_ref) {
                Some(ExtractionStatus::Pending) | Some(ExtractionStatus::Running) | None => {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                Some(terminal) => return terminal,
            }
        }
        panic!("extraction for {video_ref} never settled");
    }

    #[tokio::test]
    async fn successful_run_records_frame_count() {
        let supervisor = Arc::new(ExtractionSupervisor::new());
        supervisor.register("vid-ok");
        supervisor.launch("vid-ok", Duration::from_secs(5), async { Ok(summary(3)) });

        assert_eq!(
            settled(&supervisor, "vid-ok").await,
            ExtractionStatus::Succeeded { frames_stored: 3 }
        );
    }

    #[tokio::test]
    async fn failed_run_keeps_the_error() {
        let supervisor = Arc::new(ExtractionSupervisor::new());
        supervisor.register("vid-bad");
        supervisor.launch("vid-bad", Duration::from_secs(5), async {
            Err(PipelineError::ModelInference("boom".into()))
        });

        match settled(&supervisor, "vid-bad").await {
            ExtractionStatus::Failed { error } => {
                assert!(error.contains("boom"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn overrunning_task_fails_with_timeout() {
        let supervisor = Arc::new(ExtractionSupervisor::new());
        supervisor.register("vid-slow");
        supervisor.launch("vid-slow", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(summary(0))
        });

        match settled(&supervisor, "vid-slow").await {
            ExtractionStatus::Failed { error } => assert!(error.contains("timed out")),
            other => panic!("expected timeout failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_aborts_an_in_flight_run() {
        let supervisor = Arc::new(ExtractionSupervisor::new());
        supervisor.register("vid-cancel");
        supervisor.launch("vid-cancel", Duration::from_secs(60), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(summary(0))
        });

        // Let the task reach Running before aborting it.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(supervisor.cancel("vid-cancel"));
        assert_eq!(
            supervisor.status("vid-cancel"),
            Some(ExtractionStatus::Cancelled)
        );
        // A second cancel is a no-op.
        assert!(!supervisor.cancel("vid-cancel"));
    }

    #[tokio::test]
    async fn unknown_ref_has_no_status() {
        let supervisor = ExtractionSupervisor::new();
        assert_eq!(supervisor.status("vid-missing"), None);
        assert!(!supervisor.cancel("vid-missing"));
    }
}
