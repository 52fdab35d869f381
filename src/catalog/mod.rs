pub mod client;
pub mod error;
pub mod filter;
pub mod types;

pub use client::CatalogClient;
pub use error::CatalogError;
pub use filter::{FilterExpression, FilterParseError};
pub use types::{Group, MetadataType, RecordRef, WorkflowStage, WorkflowState, WorkflowStatus};
