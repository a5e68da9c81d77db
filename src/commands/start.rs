use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use tiered_log::{config, server, LoggingPipeline};
use tracing::info;

/// Execute the start command
///
/// This will:
/// 1. Load configuration
/// 2. Build the logging pipeline (fatal on any logging setting error)
/// 3. Route `tracing` events through the pipeline
/// 4. Start the server
pub async fn execute(config_path: &Path) -> Result<()> {
    println!("{}", "Starting tiered-log demo server...".green());

    let cfg = config::load_config(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let pipeline = LoggingPipeline::build(&cfg.logging).context("failed to build logging pipeline")?;

    if let Err(e) = pipeline.install_global() {
        eprintln!("Warning: Failed to install logging pipeline as tracing subscriber: {}", e);
        eprintln!("tracing events will not reach the log files");
    }

    info!(
        "Logging pipeline ready: {} destinations",
        pipeline.sink().destinations().len()
    );

    // Blocks until shutdown
    server::start_server(&cfg.server, &pipeline).await?;

    Ok(())
}
