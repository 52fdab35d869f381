use clap::Parser;
use recast::{cli, logging};

#[tokio::main]
async fn main() -> recast::Result<()> {
    let args = cli::Args::parse();
    let _guard = logging::init("info", args.log_file.as_deref())?;
    cli::run(args).await
}
