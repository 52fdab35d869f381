use crate::core::batch::TransformOutcome;
use crate::core::diff;
use crate::core::error::PipelineError;
use crate::core::transformation::Transformation;
use crate::core::types::SkipReason;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;

/// What the transformation engine reported for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineResponse {
    /// The engine produced a new document. `messages` are non-fatal
    /// diagnostics emitted along the way.
    Transformed { xml: String, messages: Vec<String> },
    /// The engine signalled that this record does not need or support the
    /// transformation. The signal-to-reason mapping is engine-defined.
    NotApplicable {
        reason: SkipReason,
        messages: Vec<String>,
    },
}

/// Engine failures, split by blast radius.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// This record could not be processed (malformed input, unsupported
    /// structure). Recorded as a per-record failure; the run continues.
    Processing(String),
    /// The engine itself is broken (missing stylesheet, crashed binary).
    /// Aborts the whole job.
    Unavailable(String),
}

/// The transformation engine's execution primitive, treated as a black box.
#[async_trait]
pub trait TransformEngine: Send + Sync {
    async fn apply(
        &self,
        transformation: &Transformation,
        params: &IndexMap<String, String>,
        xml: &str,
    ) -> Result<EngineResponse, EngineError>;
}

/// One transformation bound to concrete parameter values, ready to apply to
/// record XML. Construction validates the binding; a bad binding is a caller
/// error that aborts the job before any record is fetched.
pub struct TransformExecutor {
    engine: Arc<dyn TransformEngine>,
    transformation: Transformation,
    params: IndexMap<String, String>,
}

impl std::fmt::Debug for TransformExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformExecutor")
            .field("transformation", &self.transformation.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl TransformExecutor {
    pub fn new(
        engine: Arc<dyn TransformEngine>,
        transformation: Transformation,
        values: &IndexMap<String, String>,
    ) -> Result<Self, PipelineError> {
        for name in values.keys() {
            if transformation.param(name).is_none() {
                return Err(PipelineError::UnknownParameter {
                    transformation: transformation.name.clone(),
                    name: name.clone(),
                });
            }
        }
        let mut params = IndexMap::new();
        for spec in &transformation.params {
            match values.get(&spec.name) {
                Some(value) => {
                    params.insert(spec.name.clone(), value.clone());
                }
                None if spec.required => {
                    return Err(PipelineError::MissingParameter {
                        transformation: transformation.name.clone(),
                        name: spec.name.clone(),
                    });
                }
                None => {
                    params.insert(spec.name.clone(), spec.default.clone());
                }
            }
        }
        Ok(TransformExecutor {
            engine,
            transformation,
            params,
        })
    }

    pub fn transformation(&self) -> &Transformation {
        &self.transformation
    }

    pub fn params(&self) -> &IndexMap<String, String> {
        &self.params
    }

    /// Apply the bound transformation to one record's XML and classify the
    /// engine's response. Per-record problems come back inside the outcome;
    /// only an unavailable engine escalates to a fatal error.
    pub async fn apply(&self, uuid: &str, xml: &str) -> Result<TransformOutcome, PipelineError> {
        tracing::debug!(
            "Applying transformation {} to {} with params {:?}",
            self.transformation.name,
            uuid,
            self.params
        );
        match self
            .engine
            .apply(&self.transformation, &self.params, xml)
            .await
        {
            Ok(EngineResponse::Transformed { xml: result, messages }) => {
                let has_diff = diff::has_changes(xml, &result);
                Ok(TransformOutcome::Success {
                    result,
                    warnings: messages,
                    has_diff,
                })
            }
            Ok(EngineResponse::NotApplicable { reason, messages }) => {
                if self.transformation.always_apply() {
                    tracing::warn!(
                        "always-apply transformation {} skipped {} ({})",
                        self.transformation.name,
                        uuid,
                        reason
                    );
                }
                Ok(TransformOutcome::Skipped {
                    reason,
                    warnings: messages,
                })
            }
            Err(EngineError::Processing(error)) => Ok(TransformOutcome::Failure { error }),
            Err(EngineError::Unavailable(message)) => {
                Err(PipelineError::EngineUnavailable(message))
            }
        }
    }
}
