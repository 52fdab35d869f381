pub mod args;
pub mod commands;

pub use args::{CatalogArgs, DiffArgs, MigrateArgs, PreviewArgs, TransformArgs, TransformationsArgs};
use crate::core::config::RecastConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
PIPELINE COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "recast")]
#[command(version = crate::VERSION)]
#[command(about = "Batch XML transformation and migration for metadata catalogs")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: preview the record set, transform it, inspect diffs, then migrate the successes."
)]
pub struct Args {
    /// Path to custom config file (default: ./recast.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write log events to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "List the transformation library",
        after_help = "Example:\n    recast transformations --transformations ./transformations"
    )]
    Transformations(TransformationsArgs),
    #[command(
        about = "Show which records a filter expression selects",
        long_about = "Preview resolves the filter against the catalog search index and prints the matching records without modifying anything.",
        after_help = "Example:\n    recast preview --url https://catalog.example.org/geonetwork -f \"group=42\""
    )]
    Preview(PreviewArgs),
    #[command(
        about = "Apply a transformation to the filtered record set",
        long_about = "Transform fetches every matching record, applies the bound transformation, classifies each outcome as success, failure, or skipped, and prints the result set. The catalog is never modified.",
        after_help = "Example:\n    recast transform fix-contacts -f \"group=42\" -P \"organisation=ACME\" -o results.json"
    )]
    Transform(TransformArgs),
    #[command(
        about = "Push transform successes back to the catalog",
        long_about = "Migrate replays a saved transform result set against the catalog, creating new records or overwriting the originals in place. Only success entries may be selected.",
        after_help = "Example:\n    recast migrate results.json --mode overwrite"
    )]
    Migrate(MigrateArgs),
    #[command(
        about = "Show unified diffs from a saved result set",
        after_help = "Example:\n    recast diff results.json 8c5e4f8a-0e01-4a7e-9a8f-000000000000"
    )]
    Diff(DiffArgs),
}

pub async fn run(args: Args) -> crate::Result<()> {
    let config = RecastConfig::load(args.config.as_deref())?;
    match args.command {
        Command::Transformations(cmd_args) => commands::transformations(cmd_args, &config).await,
        Command::Preview(cmd_args) => commands::preview(cmd_args, &config).await,
        Command::Transform(cmd_args) => commands::transform(cmd_args, &config).await,
        Command::Migrate(cmd_args) => commands::migrate(cmd_args, &config).await,
        Command::Diff(cmd_args) => commands::diff(cmd_args).await,
    }
}
