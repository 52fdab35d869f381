use crate::catalog::{MetadataType, WorkflowState};
use crate::core::diff;
use crate::core::types::{MigrateMode, RecordStatus, SkipReason};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of applying a transformation to one record.
///
/// A closed sum type: every consumer handles all three cases. The original
/// XML lives on the enclosing [`TransformRecord`] so it is retained for
/// audit and diffing regardless of the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransformOutcome {
    Success {
        result: String,
        warnings: Vec<String>,
        /// False when the transformation produced no effective change;
        /// idempotent transformations legitimately do this on a second pass.
        has_diff: bool,
    },
    Failure {
        error: String,
    },
    Skipped {
        reason: SkipReason,
        warnings: Vec<String>,
    },
}

impl TransformOutcome {
    pub fn status(&self) -> RecordStatus {
        match self {
            TransformOutcome::Success { .. } => RecordStatus::Success,
            TransformOutcome::Failure { .. } => RecordStatus::Failure,
            TransformOutcome::Skipped { .. } => RecordStatus::Skipped,
        }
    }
}

/// One processed record in a transform result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRecord {
    pub uuid: String,
    pub md_type: MetadataType,
    pub state: Option<WorkflowState>,
    /// Raw XML exactly as fetched from the catalog.
    pub original: String,
    pub outcome: TransformOutcome,
}

impl TransformRecord {
    pub fn status(&self) -> RecordStatus {
        self.outcome.status()
    }

    pub fn result_xml(&self) -> Option<&str> {
        match &self.outcome {
            TransformOutcome::Success { result, .. } => Some(result),
            _ => None,
        }
    }
}

/// Aggregated per-record outcomes of one transform job.
///
/// Appended to monotonically while the job runs, in processing order
/// (first fetched, first appended), then read-only once the job finishes.
/// Record uuids are unique within one set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformBatch {
    pub transformation: String,
    records: Vec<TransformRecord>,
}

impl TransformBatch {
    pub fn new(transformation: impl Into<String>) -> Self {
        TransformBatch {
            transformation: transformation.into(),
            records: Vec::new(),
        }
    }

    /// Append one outcome. Returns false (and keeps the set unchanged) when
    /// the uuid is already present.
    pub fn add(&mut self, record: TransformRecord) -> bool {
        if self.records.iter().any(|r| r.uuid == record.uuid) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TransformRecord] {
        &self.records
    }

    pub fn get(&self, uuid: &str) -> Option<&TransformRecord> {
        self.records.iter().find(|r| r.uuid == uuid)
    }

    pub fn successes(&self) -> Vec<&TransformRecord> {
        self.filter_status(&[RecordStatus::Success])
    }

    pub fn failures(&self) -> Vec<&TransformRecord> {
        self.filter_status(&[RecordStatus::Failure])
    }

    pub fn skipped(&self) -> Vec<&TransformRecord> {
        self.filter_status(&[RecordStatus::Skipped])
    }

    /// Status partition used for client-side filtering of result rows.
    pub fn filter_status(&self, statuses: &[RecordStatus]) -> Vec<&TransformRecord> {
        self.records
            .iter()
            .filter(|r| statuses.contains(&r.status()))
            .collect()
    }

    /// Unified diff of original vs result for one success entry. None when
    /// the uuid is unknown or the entry carries no result.
    pub fn diff(&self, uuid: &str) -> Option<String> {
        let record = self.get(uuid)?;
        let result = record.result_xml()?;
        Some(diff::unified(&record.original, result, uuid))
    }
}

impl std::fmt::Display for TransformBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TransformBatch({} records, {} successes, {} failures, {} skipped)",
            self.records.len(),
            self.successes().len(),
            self.failures().len(),
            self.skipped().len(),
        )
    }
}

/// Outcome of pushing one transformed record back to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MigrateOutcome {
    Success {
        /// Equals the source uuid under overwrite; a fresh catalog-assigned
        /// uuid under create.
        target_uuid: String,
    },
    Failure {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateRecord {
    pub source_uuid: String,
    pub outcome: MigrateOutcome,
}

impl MigrateRecord {
    pub fn status(&self) -> RecordStatus {
        match self.outcome {
            MigrateOutcome::Success { .. } => RecordStatus::Success,
            MigrateOutcome::Failure { .. } => RecordStatus::Failure,
        }
    }
}

/// Aggregated per-record outcomes of one migrate job, keyed by mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateBatch {
    pub mode: MigrateMode,
    /// The transform job this migration replays, when known.
    pub transform_job_id: Option<Uuid>,
    records: Vec<MigrateRecord>,
}

impl MigrateBatch {
    pub fn new(mode: MigrateMode, transform_job_id: Option<Uuid>) -> Self {
        MigrateBatch {
            mode,
            transform_job_id,
            records: Vec::new(),
        }
    }

    pub fn add(&mut self, record: MigrateRecord) -> bool {
        if self.records.iter().any(|r| r.source_uuid == record.source_uuid) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[MigrateRecord] {
        &self.records
    }

    pub fn successes(&self) -> Vec<&MigrateRecord> {
        self.records
            .iter()
            .filter(|r| r.status() == RecordStatus::Success)
            .collect()
    }

    pub fn failures(&self) -> Vec<&MigrateRecord> {
        self.records
            .iter()
            .filter(|r| r.status() == RecordStatus::Failure)
            .collect()
    }
}

impl std::fmt::Display for MigrateBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MigrateBatch({}, {} records, {} successes, {} failures)",
            self.mode,
            self.records.len(),
            self.successes().len(),
            self.failures().len(),
        )
    }
}
