//! `imagerail` command line entry point.

mod cli;
mod commands;
mod tracing;

use crate::tracing::TracingConfig;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = cli::parse();

    crate::tracing::init_tracing(&TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
    })?;

    commands::execute(cli).await
}
