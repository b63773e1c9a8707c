use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use callflow::cli::Cli;
use callflow::core::Engine;

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Callflow v{}", env!("CARGO_PKG_VERSION"));

    let overrides = std::mem::take(&mut cli.limits).into();
    let engine = Engine::new(cli.config.as_deref(), overrides)?;

    // Execute the requested command
    cli.execute(engine).await
}
