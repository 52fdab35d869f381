use crate::{
    catalog::{CatalogClient, FilterExpression},
    cli::args::{CatalogArgs, DiffArgs, MigrateArgs, PreviewArgs, TransformArgs, TransformationsArgs},
    core::{
        batch::{TransformBatch, TransformOutcome},
        config::RecastConfig,
        engine::XsltProcEngine,
        runner::{MigrateJobRunner, TransformJobRunner},
        transformation::{get_transformation, list_transformations},
        types::JobStatus,
    },
    jobs::JobHost,
    Result,
};
use anyhow::{anyhow, Context};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// List the transformation library with parameter signatures.
pub async fn transformations(args: TransformationsArgs, config: &RecastConfig) -> Result<()> {
    let dir = library_dir(args.transformations.as_deref(), config);
    let entries = list_transformations(&dir)
        .with_context(|| format!("failed to read transformation library {}", dir.display()))?;
    if entries.is_empty() {
        println!("No transformations found in {}", dir.display());
        return Ok(());
    }
    for transformation in entries {
        println!("{}", transformation.display_name());
        for param in &transformation.params {
            if param.required {
                println!("    {} (required)", param.name);
            } else {
                println!("    {} = {:?}", param.name, param.default);
            }
        }
    }
    Ok(())
}

/// Resolve and print the record set a filter expression selects, without
/// touching anything.
pub async fn preview(args: PreviewArgs, config: &RecastConfig) -> Result<()> {
    let client = connect(&args.catalog, config).await?;
    let filters = FilterExpression::parse(&args.filter)?;
    let records = client.search(&filters).await?;
    println!("{} record(s) match {}", records.len(), filters);
    for record in &records {
        let flags = match (&record.state, record.has_working_copy()) {
            (_, true) => " [working copy]",
            (Some(_), false) => " [workflow]",
            (None, false) => "",
        };
        println!(
            "  {}  {}  {}{}",
            record.uuid,
            record.md_type.api_name(),
            record.title,
            flags
        );
    }
    Ok(())
}

/// Run a transform job to completion and report the classified outcomes.
pub async fn transform(args: TransformArgs, config: &RecastConfig) -> Result<()> {
    let dir = library_dir(args.transformations.as_deref(), config);
    let transformation = get_transformation(&args.transformation, &dir)?;
    let parameter_values = parse_bindings(&args.params)?;
    let filters = FilterExpression::parse(&args.filter)?;
    let client = connect(&args.catalog, config).await?;
    let engine = Arc::new(XsltProcEngine::new(config.engine.command.clone()));

    let runner = TransformJobRunner::new(client, engine, transformation, parameter_values, filters);
    let host = JobHost::new();
    let job_id = host.submit_transform(runner);
    tracing::info!(job_id = %job_id, "Transform job submitted");

    let report = host
        .wait(job_id)
        .await
        .ok_or_else(|| anyhow!("job {job_id} vanished from the host"))?;
    let batch = host
        .transform_snapshot(job_id)
        .ok_or_else(|| anyhow!("job {job_id} has no transform result set"))?;

    print_transform_batch(&batch, args.show_diff);

    if let Some(path) = &args.output {
        write_batch(path, &batch)?;
        println!("Result set written to {}", path.display());
    }

    if report.status == JobStatus::Fatal {
        let reason = report.error.unwrap_or_else(|| "unknown error".to_string());
        return Err(anyhow!("transform job aborted: {reason}"));
    }
    Ok(())
}

/// Push selected transform successes back to the catalog.
pub async fn migrate(args: MigrateArgs, config: &RecastConfig) -> Result<()> {
    let batch = read_batch(&args.input)?;
    let selection = if args.records.is_empty() {
        MigrateJobRunner::all_successes(&batch)
    } else {
        args.records.clone()
    };
    if selection.is_empty() {
        println!("Nothing to migrate: the result set has no successes");
        return Ok(());
    }

    let client = connect(&args.catalog, config).await?;
    let runner = MigrateJobRunner::new(
        client,
        batch,
        selection,
        args.mode,
        args.group,
        args.update_date_stamp,
    );
    let host = JobHost::new();
    let job_id = host.submit_migrate(runner);
    tracing::info!(job_id = %job_id, mode = %args.mode, "Migrate job submitted");

    let report = host
        .wait(job_id)
        .await
        .ok_or_else(|| anyhow!("job {job_id} vanished from the host"))?;
    let result = host
        .migrate_snapshot(job_id)
        .ok_or_else(|| anyhow!("job {job_id} has no migrate result set"))?;

    println!("{result}");
    for record in result.records() {
        match &record.outcome {
            crate::core::batch::MigrateOutcome::Success { target_uuid } => {
                println!("  {}  ok -> {}", record.source_uuid, target_uuid);
            }
            crate::core::batch::MigrateOutcome::Failure { error } => {
                println!("  {}  FAILED: {}", record.source_uuid, error);
            }
        }
    }

    if report.status == JobStatus::Fatal {
        let reason = report.error.unwrap_or_else(|| "unknown error".to_string());
        return Err(anyhow!("migrate job aborted: {reason}"));
    }
    Ok(())
}

/// Print unified diffs from a saved transform result set.
pub async fn diff(args: DiffArgs) -> Result<()> {
    let batch = read_batch(&args.input)?;
    match &args.uuid {
        Some(uuid) => {
            let text = batch
                .diff(uuid)
                .ok_or_else(|| anyhow!("no diffable entry for {uuid} in the result set"))?;
            println!("{text}");
        }
        None => {
            for record in batch.successes() {
                if let TransformOutcome::Success { has_diff: true, .. } = record.outcome {
                    if let Some(text) = batch.diff(&record.uuid) {
                        println!("{text}");
                    }
                }
            }
        }
    }
    Ok(())
}

fn library_dir(override_dir: Option<&Path>, config: &RecastConfig) -> PathBuf {
    override_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.transformations.path.clone())
}

async fn connect(args: &CatalogArgs, config: &RecastConfig) -> Result<CatalogClient> {
    let url = args
        .url
        .as_deref()
        .unwrap_or(&config.catalog.url)
        .to_string();
    if url.is_empty() {
        return Err(anyhow!(
            "no catalog URL: pass --url or set catalog.url in recast.toml"
        ));
    }
    let username = args.username.as_deref().or(config.catalog.username.as_deref());
    let password = args.password.as_deref().or(config.catalog.password.as_deref());
    let client = CatalogClient::connect(&url, username, password)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    Ok(client)
}

/// Parse repeated `name=value` flags in flag order.
fn parse_bindings(pairs: &[String]) -> Result<IndexMap<String, String>> {
    let mut bindings = IndexMap::new();
    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("malformed parameter binding {pair:?}, expected NAME=VALUE"))?;
        if name.is_empty() {
            return Err(anyhow!("malformed parameter binding {pair:?}: empty name"));
        }
        bindings.insert(name.to_string(), value.to_string());
    }
    Ok(bindings)
}

fn print_transform_batch(batch: &TransformBatch, show_diff: bool) {
    println!("{batch}");
    for record in batch.records() {
        match &record.outcome {
            TransformOutcome::Success { has_diff, warnings, .. } => {
                let change = if *has_diff { "changed" } else { "no change" };
                println!("  {}  success ({change})", record.uuid);
                for warning in warnings {
                    println!("      warning: {warning}");
                }
            }
            TransformOutcome::Failure { error } => {
                println!("  {}  FAILED: {}", record.uuid, error);
            }
            TransformOutcome::Skipped { reason, warnings } => {
                println!("  {}  skipped: {}", record.uuid, reason);
                for warning in warnings {
                    println!("      warning: {warning}");
                }
            }
        }
    }
    if show_diff {
        for record in batch.successes() {
            if let TransformOutcome::Success { has_diff: true, .. } = record.outcome {
                if let Some(text) = batch.diff(&record.uuid) {
                    println!("{text}");
                }
            }
        }
    }
}

fn write_batch(path: &Path, batch: &TransformBatch) -> Result<()> {
    let json = serde_json::to_string_pretty(batch)?;
    fs::write(path, json)
        .with_context(|| format!("failed to write result set to {}", path.display()))?;
    Ok(())
}

fn read_batch(path: &Path) -> Result<TransformBatch> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read result set {}", path.display()))?;
    let batch = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse result set {}", path.display()))?;
    Ok(batch)
}
