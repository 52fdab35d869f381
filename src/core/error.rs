use crate::catalog::CatalogError;
use thiserror::Error;

/// Fatal pipeline errors.
///
/// Per-record domain outcomes (a transformation that fails on one record, a
/// write the catalog rejects) never surface here; they are recorded in the
/// result set and the run continues. This type covers the two classes that
/// abort a job: caller/config mistakes, caught before any record is touched,
/// and infrastructure failures mid-run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing required parameter '{name}' for transformation '{transformation}'")]
    MissingParameter {
        transformation: String,
        name: String,
    },

    #[error("unknown parameter '{name}' for transformation '{transformation}'")]
    UnknownParameter {
        transformation: String,
        name: String,
    },

    #[error("selected record {uuid} is not a transform success")]
    SelectionNotSuccess { uuid: String },

    #[error("selected record {uuid} is not part of the transform result set")]
    SelectionUnknown { uuid: String },

    #[error("create mode requires a target group")]
    MissingGroup,

    #[error("transformation engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl PipelineError {
    /// True for caller/config errors: the job never started processing and
    /// resubmitting with corrected input is the fix.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingParameter { .. }
                | PipelineError::UnknownParameter { .. }
                | PipelineError::SelectionNotSuccess { .. }
                | PipelineError::SelectionUnknown { .. }
                | PipelineError::MissingGroup
        )
    }
}
