use crate::core::types::MigrateMode;
use clap::Args;
use std::path::PathBuf;

/// Catalog connection options shared by every command that talks to the
/// server. Values given here override the config file.
#[derive(Args)]
pub struct CatalogArgs {
    /// Canonical catalog URL, e.g. https://catalog.example.org/geonetwork
    #[arg(long, value_name = "URL", help_heading = "Catalog")]
    pub url: Option<String>,

    /// Catalog username (anonymous when omitted)
    #[arg(long, short = 'u', value_name = "NAME", help_heading = "Catalog")]
    pub username: Option<String>,

    /// Catalog password
    #[arg(long, short = 'p', value_name = "PASSWORD", help_heading = "Catalog")]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct TransformationsArgs {
    /// Directory holding the .xsl transformation library
    #[arg(long, value_name = "DIR")]
    pub transformations: Option<PathBuf>,
}

#[derive(Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Record filter, comma-separated field=value terms
    /// (e.g. "group=42,template=n")
    #[arg(long, short = 'f', value_name = "EXPR", default_value = "")]
    pub filter: String,
}

#[derive(Args)]
pub struct TransformArgs {
    /// Transformation name (a file in the transformation library)
    #[arg(value_name = "TRANSFORMATION")]
    pub transformation: String,

    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Directory holding the .xsl transformation library
    #[arg(long, value_name = "DIR")]
    pub transformations: Option<PathBuf>,

    /// Record filter, comma-separated field=value terms
    #[arg(long, short = 'f', value_name = "EXPR", default_value = "")]
    pub filter: String,

    /// Transformation parameter binding, repeatable (name=value)
    #[arg(long = "param", short = 'P', value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Write the full result set as JSON to this file
    #[arg(long, short = 'o', value_name = "FILE", help_heading = "Output Options")]
    pub output: Option<PathBuf>,

    /// Print a unified diff for every changed record
    #[arg(long, help_heading = "Output Options")]
    pub show_diff: bool,
}

#[derive(Args)]
pub struct MigrateArgs {
    /// Transform result set produced by `recast transform --output`
    #[arg(value_name = "RESULTS_FILE")]
    pub input: PathBuf,

    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// How results are written back
    #[arg(long, value_enum, default_value_t = MigrateMode::Create)]
    pub mode: MigrateMode,

    /// Owner group id for created records (required in create mode)
    #[arg(long, value_name = "ID")]
    pub group: Option<i64>,

    /// Record uuids to migrate (defaults to every transform success)
    #[arg(long = "record", short = 'r', value_name = "UUID")]
    pub records: Vec<String>,

    /// Touch the record date stamp when overwriting
    #[arg(long)]
    pub update_date_stamp: bool,
}

#[derive(Args)]
pub struct DiffArgs {
    /// Transform result set produced by `recast transform --output`
    #[arg(value_name = "RESULTS_FILE")]
    pub input: PathBuf,

    /// Record uuid to diff (defaults to every changed record)
    #[arg(value_name = "UUID")]
    pub uuid: Option<String>,
}
