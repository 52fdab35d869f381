//! In-process job host.
//!
//! Runs transform and migrate jobs on background tasks and retains their
//! result sets for the lifetime of the process. Runners stream one record at
//! a time over a channel; a collector task folds the stream into the job
//! entry, so a job's partial result set is queryable while it is still
//! running.

use crate::core::batch::{MigrateBatch, MigrateRecord, TransformBatch, TransformRecord};
use crate::core::runner::{MigrateJobRunner, TransformJobRunner};
use crate::core::types::JobStatus;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// What kind of pipeline phase a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Transform,
    Migrate,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Transform => write!(f, "transform"),
            JobKind::Migrate => write!(f, "migrate"),
        }
    }
}

/// Point-in-time view of a job, safe to hand out while the job runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Records classified so far (final count once the job settles).
    pub processed: usize,
    /// Fatal error message, present only when status is `Fatal`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

enum JobPayload {
    Transform(TransformBatch),
    Migrate(MigrateBatch),
}

impl JobPayload {
    fn len(&self) -> usize {
        match self {
            JobPayload::Transform(batch) => batch.len(),
            JobPayload::Migrate(batch) => batch.len(),
        }
    }
}

struct JobEntry {
    kind: JobKind,
    status: JobStatus,
    payload: JobPayload,
    /// Settled result set, serialized once the job finishes. Snapshots of a
    /// finished job are reconstructed from this rather than the live payload,
    /// keeping result sets round-trippable across the job boundary.
    result_json: Option<String>,
    error: Option<String>,
    submitted_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobEntry {
    fn new(kind: JobKind, payload: JobPayload) -> Self {
        JobEntry {
            kind,
            status: JobStatus::Pending,
            payload,
            result_json: None,
            error: None,
            submitted_at: Utc::now(),
            finished_at: None,
        }
    }

    fn settled(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Fatal)
    }
}

/// Tracks every job submitted during the life of the process. Cheap to
/// clone; clones share the same job table.
#[derive(Clone, Default)]
pub struct JobHost {
    jobs: Arc<DashMap<Uuid, JobEntry>>,
}

impl JobHost {
    pub fn new() -> Self {
        JobHost::default()
    }

    /// Spawn a transform job. Returns immediately with the job id.
    pub fn submit_transform(&self, runner: TransformJobRunner) -> Uuid {
        let id = Uuid::new_v4();
        let batch = TransformBatch::new(runner.transformation_name());
        self.jobs
            .insert(id, JobEntry::new(JobKind::Transform, JobPayload::Transform(batch)));

        let (tx, mut rx) = mpsc::unbounded_channel::<TransformRecord>();
        let jobs = Arc::clone(&self.jobs);
        let collector = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Some(mut entry) = jobs.get_mut(&id) {
                    if let JobPayload::Transform(batch) = &mut entry.payload {
                        batch.add(record);
                    }
                }
            }
        });

        let jobs = Arc::clone(&self.jobs);
        tokio::spawn(async move {
            mark_running(&jobs, id);
            let outcome = runner.run(tx).await;
            // All streamed records land before the job settles.
            let _ = collector.await;
            settle(&jobs, id, outcome.map_err(|e| e.to_string()));
        });
        id
    }

    /// Spawn a migrate job. Returns immediately with the job id.
    pub fn submit_migrate(&self, runner: MigrateJobRunner) -> Uuid {
        let id = Uuid::new_v4();
        let batch = MigrateBatch::new(runner.mode(), runner.transform_job_id());
        self.jobs
            .insert(id, JobEntry::new(JobKind::Migrate, JobPayload::Migrate(batch)));

        let (tx, mut rx) = mpsc::unbounded_channel::<MigrateRecord>();
        let jobs = Arc::clone(&self.jobs);
        let collector = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Some(mut entry) = jobs.get_mut(&id) {
                    if let JobPayload::Migrate(batch) = &mut entry.payload {
                        batch.add(record);
                    }
                }
            }
        });

        let jobs = Arc::clone(&self.jobs);
        tokio::spawn(async move {
            mark_running(&jobs, id);
            let outcome = runner.run(tx).await;
            let _ = collector.await;
            settle(&jobs, id, outcome.map_err(|e| e.to_string()));
        });
        id
    }

    pub fn status(&self, id: Uuid) -> Option<JobReport> {
        self.jobs.get(&id).map(|entry| JobReport {
            id,
            kind: entry.kind,
            status: entry.status,
            processed: entry.payload.len(),
            error: entry.error.clone(),
            submitted_at: entry.submitted_at,
            finished_at: entry.finished_at,
        })
    }

    /// Current transform result set, partial while the job is running.
    /// Fatal jobs keep the records classified before the abort.
    pub fn transform_snapshot(&self, id: Uuid) -> Option<TransformBatch> {
        self.jobs.get(&id).and_then(|entry| match &entry.payload {
            JobPayload::Transform(batch) => {
                if entry.settled() {
                    if let Some(restored) = stored_result(entry.result_json.as_deref()) {
                        return Some(restored);
                    }
                }
                Some(batch.clone())
            }
            JobPayload::Migrate(_) => None,
        })
    }

    /// Current migrate result set, partial while the job is running.
    pub fn migrate_snapshot(&self, id: Uuid) -> Option<MigrateBatch> {
        self.jobs.get(&id).and_then(|entry| match &entry.payload {
            JobPayload::Migrate(batch) => {
                if entry.settled() {
                    if let Some(restored) = stored_result(entry.result_json.as_deref()) {
                        return Some(restored);
                    }
                }
                Some(batch.clone())
            }
            JobPayload::Transform(_) => None,
        })
    }

    /// Poll until the job leaves `Pending`/`Running`. Returns the final
    /// report, or `None` for an unknown id.
    pub async fn wait(&self, id: Uuid) -> Option<JobReport> {
        loop {
            let report = self.status(id)?;
            match report.status {
                JobStatus::Completed | JobStatus::Fatal => return Some(report),
                JobStatus::Pending | JobStatus::Running => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }
}

fn mark_running(jobs: &DashMap<Uuid, JobEntry>, id: Uuid) {
    if let Some(mut entry) = jobs.get_mut(&id) {
        entry.status = JobStatus::Running;
    }
}

fn settle(jobs: &DashMap<Uuid, JobEntry>, id: Uuid, outcome: Result<(), String>) {
    if let Some(mut entry) = jobs.get_mut(&id) {
        entry.finished_at = Some(Utc::now());
        let json = match &entry.payload {
            JobPayload::Transform(batch) => serde_json::to_string(batch).ok(),
            JobPayload::Migrate(batch) => serde_json::to_string(batch).ok(),
        };
        entry.result_json = json;
        match outcome {
            Ok(()) => {
                entry.status = JobStatus::Completed;
                tracing::info!(job_id = %id, kind = %entry.kind, records = entry.payload.len(), "Job completed");
            }
            Err(message) => {
                entry.status = JobStatus::Fatal;
                tracing::error!(job_id = %id, kind = %entry.kind, error = %message, "Job failed");
                entry.error = Some(message);
            }
        }
    }
}

fn stored_result<T: serde::de::DeserializeOwned>(json: Option<&str>) -> Option<T> {
    json.and_then(|s| serde_json::from_str(s).ok())
}
