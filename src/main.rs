use anyhow::Context;
use clap::Parser;
use fritz_capture::cli::Cli;
use fritz_capture::pipeline::PipelineDriver;
use std::process;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Starting fritz-capture v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&cli).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.config()?;
    let data_dir = config.data_dir.clone();

    let driver = PipelineDriver::from_config(config)
        .await
        .with_context(|| format!("Failed to prepare data directory {}", data_dir.display()))?;

    let summary = driver.run(BufReader::new(tokio::io::stdin())).await?;

    info!("Input closed, final report written ({})", summary);
    Ok(())
}
