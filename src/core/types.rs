use serde::{Deserialize, Serialize};

/// Job status enumeration, as reported by the job host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Fatal,
}

/// Per-record outcome partition of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Success,
    Failure,
    Skipped,
}

/// Why a record was skipped instead of transformed.
///
/// The engine owns the mapping from its diagnostic signals to these reasons;
/// this is the minimum shared vocabulary, not an exhaustive taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The transformation does not apply to this kind of record.
    NotApplicable,
    /// The record already carries the transformation's effect.
    AlreadyApplied,
    /// The record content cannot be processed as-is.
    InvalidInput,
    /// The record has a pending working copy; updating it would be unsafe.
    HasWorkingCopy,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            SkipReason::NotApplicable => "transformation not applicable to this record",
            SkipReason::AlreadyApplied => "transformation already applied",
            SkipReason::InvalidInput => "record content is not valid input",
            SkipReason::HasWorkingCopy => "record has a working copy",
        };
        f.write_str(msg)
    }
}

/// Write semantics for the migrate phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MigrateMode {
    /// Submit the result as a new record; the catalog assigns a fresh uuid.
    Create,
    /// Replace the source record content in place, uuid unchanged.
    Overwrite,
}

impl std::fmt::Display for MigrateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrateMode::Create => f.write_str("create"),
            MigrateMode::Overwrite => f.write_str("overwrite"),
        }
    }
}
