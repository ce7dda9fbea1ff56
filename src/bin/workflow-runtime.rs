//! workflow-runtime CLI Binary

use clap::Parser;
use std::process;
use tracing::{error, info};
use workflow_runtime::cli::{map_error, Cli, RunContext};
use workflow_runtime::config::ConfigLoader;
use workflow_runtime::error::RuntimeError;
use workflow_runtime::fixture::with_root_scope;
use workflow_runtime::logging::{init_logging, LoggingConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging_config = match build_logging_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    };
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("workflow-runtime starting");

    let context = match RunContext::new(cli.workspace.clone(), cli.config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = %e, "Error initializing run context");
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    };

    match with_root_scope(context.execute(&cli.command)).await {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    }
}

/// Logging config from the config file, then CLI flags.
/// An unreadable config file falls back to defaults here; `RunContext`
/// reports the error once logging is up.
fn build_logging_config(cli: &Cli) -> Result<LoggingConfig, RuntimeError> {
    let loaded = match cli.config {
        Some(ref path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(&cli.workspace),
    };
    let mut config = loaded.map(|c| c.logging).unwrap_or_default();

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.parse()?;
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.parse()?;
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
    }
    Ok(config)
}
