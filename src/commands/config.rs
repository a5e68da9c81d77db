use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use tiered_log::config;
use tiered_log::LoggingConfig;
use tracing::info;

/// Execute the config show command
///
/// Displays the loaded configuration, environment overrides applied
pub fn show(config_path: &Path) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!("Loading configuration for display");

    let cfg = config::load_config(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    println!("{}", "Current Configuration:".green().bold());
    println!();

    let toml_string = toml::to_string_pretty(&cfg)?;
    println!("{}", toml_string);

    info!("Configuration displayed successfully");
    Ok(())
}

/// Execute the config validate command
///
/// Validates the logging settings without opening any log file
pub fn validate(config_path: &Path) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());
    info!("Validating configuration file");

    let cfg = config::load_config(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let logging = LoggingConfig::from_raw(&cfg.logging)?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    for line in summary_lines(&logging) {
        println!("  {}", line);
    }

    info!("Configuration validation successful");
    Ok(())
}

fn summary_lines(logging: &LoggingConfig) -> Vec<String> {
    vec![
        format!("Level: {}", logging.min_level),
        format!("General log: {}", logging.general_path().display()),
        format!("Error log: {}", logging.error_path().display()),
        format!(
            "Rotation: {} MB / {} backups / {} days",
            logging.max_size_mb, logging.max_backups, logging.max_age_days
        ),
    ]
}
