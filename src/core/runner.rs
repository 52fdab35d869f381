use crate::catalog::{CatalogClient, FilterExpression};
use crate::core::batch::{
    MigrateOutcome, MigrateRecord, TransformBatch, TransformOutcome, TransformRecord,
};
use crate::core::error::PipelineError;
use crate::core::executor::{TransformEngine, TransformExecutor};
use crate::core::transformation::Transformation;
use crate::core::types::{MigrateMode, RecordStatus, SkipReason};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Transform phase: resolve a filtered record set, apply one bound
/// transformation per record, stream each classified outcome to the sink.
///
/// Single pass, serial per-record loop, strictly read-only against the
/// catalog. Per-record failures and skips do not stop the run; caller errors
/// and infrastructure failures abort it.
pub struct TransformJobRunner {
    client: CatalogClient,
    engine: Arc<dyn TransformEngine>,
    transformation: Transformation,
    parameter_values: IndexMap<String, String>,
    filters: FilterExpression,
}

impl TransformJobRunner {
    pub fn new(
        client: CatalogClient,
        engine: Arc<dyn TransformEngine>,
        transformation: Transformation,
        parameter_values: IndexMap<String, String>,
        filters: FilterExpression,
    ) -> Self {
        TransformJobRunner {
            client,
            engine,
            transformation,
            parameter_values,
            filters,
        }
    }

    pub fn transformation_name(&self) -> &str {
        &self.transformation.name
    }

    pub async fn run(self, sink: UnboundedSender<TransformRecord>) -> Result<(), PipelineError> {
        let TransformJobRunner {
            client,
            engine,
            transformation,
            parameter_values,
            filters,
        } = self;

        // Parameter binding is validated before anything is fetched: a bad
        // binding is the caller's mistake and must fail the job as a whole.
        let executor = TransformExecutor::new(engine, transformation, &parameter_values)?;

        tracing::info!("Selecting records with filters: {}", filters);
        let selection = client.search(&filters).await?;
        tracing::info!("Selection contains {} records", selection.len());

        let mut seen = HashSet::new();
        for record_ref in selection {
            if !seen.insert(record_ref.uuid.clone()) {
                tracing::warn!("Duplicate uuid {} in search results, skipping", record_ref.uuid);
                continue;
            }
            tracing::debug!(
                "Processing record {}: md_type={:?}, state={:?}",
                record_ref.uuid,
                record_ref.md_type,
                record_ref.state
            );
            // A fetch failure pre-dates any outcome to attach it to: fatal.
            let original = client.fetch(&record_ref.uuid).await?;

            let outcome = if !record_ref.md_type.is_transformable() {
                TransformOutcome::Skipped {
                    reason: SkipReason::NotApplicable,
                    warnings: vec![format!(
                        "record type {:?} is not transformable",
                        record_ref.md_type
                    )],
                }
            } else if record_ref.has_working_copy() {
                TransformOutcome::Skipped {
                    reason: SkipReason::HasWorkingCopy,
                    warnings: vec![],
                }
            } else {
                executor.apply(&record_ref.uuid, &original).await?
            };

            let record = TransformRecord {
                uuid: record_ref.uuid,
                md_type: record_ref.md_type,
                state: record_ref.state,
                original,
                outcome,
            };
            // A closed receiver means the host gave up on the job; keep
            // processing is pointless but harmless, so just stop.
            if sink.send(record).is_err() {
                tracing::warn!("Result sink closed, stopping transform run");
                break;
            }
        }
        tracing::info!("Transformation done");
        Ok(())
    }
}

/// Migrate phase: replay selected transform successes against the catalog's
/// write API under one mode, streaming each write outcome to the sink.
///
/// Validates the whole selection before the first write; after that, a
/// rejected write is recorded and the batch continues; records are
/// independent and there is no rollback.
pub struct MigrateJobRunner {
    client: CatalogClient,
    batch: TransformBatch,
    selection: Vec<String>,
    mode: MigrateMode,
    group: Option<i64>,
    update_date_stamp: bool,
    transform_job_id: Option<Uuid>,
}

impl MigrateJobRunner {
    pub fn new(
        client: CatalogClient,
        batch: TransformBatch,
        selection: Vec<String>,
        mode: MigrateMode,
        group: Option<i64>,
        update_date_stamp: bool,
    ) -> Self {
        MigrateJobRunner {
            client,
            batch,
            selection,
            mode,
            group,
            update_date_stamp,
            transform_job_id: None,
        }
    }

    /// Stamp the migrate result set with the transform job it replays.
    pub fn with_transform_job(mut self, job_id: Uuid) -> Self {
        self.transform_job_id = Some(job_id);
        self
    }

    pub fn transform_job_id(&self) -> Option<Uuid> {
        self.transform_job_id
    }

    /// Convenience: select every success entry of a batch.
    pub fn all_successes(batch: &TransformBatch) -> Vec<String> {
        batch
            .successes()
            .into_iter()
            .map(|r| r.uuid.clone())
            .collect()
    }

    pub fn mode(&self) -> MigrateMode {
        self.mode
    }

    pub async fn run(self, sink: UnboundedSender<MigrateRecord>) -> Result<(), PipelineError> {
        let group = match (self.mode, self.group) {
            (MigrateMode::Create, None) => return Err(PipelineError::MissingGroup),
            (_, group) => group,
        };

        // Refuse the whole job before any write if the selection references
        // anything but transform successes.
        let mut seen = HashSet::new();
        let mut selected = Vec::with_capacity(self.selection.len());
        for uuid in &self.selection {
            if !seen.insert(uuid.clone()) {
                continue;
            }
            let record = self
                .batch
                .get(uuid)
                .ok_or_else(|| PipelineError::SelectionUnknown { uuid: uuid.clone() })?;
            if record.status() != RecordStatus::Success {
                return Err(PipelineError::SelectionNotSuccess { uuid: uuid.clone() });
            }
            selected.push(record);
        }

        tracing::info!(
            "Migrating {} records ({}) for {}",
            selected.len(),
            self.mode,
            self.client.url()
        );
        for record in selected {
            let result_xml = record
                .result_xml()
                .unwrap_or(&record.original);
            let outcome = match self.mode {
                MigrateMode::Create => {
                    // group presence was checked upfront
                    let group = group.unwrap_or_default();
                    match self.client.create(result_xml, record.md_type, group).await {
                        Ok(target_uuid) => MigrateOutcome::Success { target_uuid },
                        Err(e) => MigrateOutcome::Failure {
                            error: e.to_string(),
                        },
                    }
                }
                MigrateMode::Overwrite => {
                    match self
                        .client
                        .overwrite(
                            &record.uuid,
                            result_xml,
                            record.md_type,
                            self.update_date_stamp,
                            record.state,
                        )
                        .await
                    {
                        Ok(()) => MigrateOutcome::Success {
                            target_uuid: record.uuid.clone(),
                        },
                        Err(e) => MigrateOutcome::Failure {
                            error: e.to_string(),
                        },
                    }
                }
            };
            if let MigrateOutcome::Failure { error } = &outcome {
                tracing::warn!("Migrating {} failed: {}", record.uuid, error);
            }
            let entry = MigrateRecord {
                source_uuid: record.uuid.clone(),
                outcome,
            };
            if sink.send(entry).is_err() {
                tracing::warn!("Result sink closed, stopping migrate run");
                break;
            }
        }
        tracing::info!("Migration done");
        Ok(())
    }
}
