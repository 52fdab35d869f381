pub mod batch;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod executor;
pub mod runner;
pub mod transformation;
pub mod types;

pub use batch::{
    MigrateBatch, MigrateOutcome, MigrateRecord, TransformBatch, TransformOutcome, TransformRecord,
};
pub use config::RecastConfig;
pub use engine::XsltProcEngine;
pub use error::PipelineError;
pub use executor::{EngineError, EngineResponse, TransformEngine, TransformExecutor};
pub use runner::{MigrateJobRunner, TransformJobRunner};
pub use transformation::{get_transformation, list_transformations, ParamSpec, Transformation};
pub use types::{JobStatus, MigrateMode, RecordStatus, SkipReason};
