//! Logging System
//!
//! Structured logging on top of `tracing`. Level, format and destination come
//! from [`LoggingConfig`], each overridable through environment variables.

use crate::error::RuntimeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub const ENV_LOG: &str = "WORKFLOW_RUNTIME_LOG";
pub const ENV_LOG_FORMAT: &str = "WORKFLOW_RUNTIME_LOG_FORMAT";
pub const ENV_LOG_OUTPUT: &str = "WORKFLOW_RUNTIME_LOG_OUTPUT";
pub const ENV_LOG_MODULES: &str = "WORKFLOW_RUNTIME_LOG_MODULES";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file path, used when `output` is `file`
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Colored output (text format on a terminal stream only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-module levels, e.g. `workflow_runtime::queue = "trace"`
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    #[default]
    Stderr,
    File,
}

impl FromStr for LogFormat {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(RuntimeError::Config(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                other
            ))),
        }
    }
}

impl FromStr for LogOutput {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            other => Err(RuntimeError::Config(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr' or 'file')",
                other
            ))),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("workflow-runtime.log")
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file: default_log_file(),
            color: default_true(),
            modules: BTreeMap::new(),
        }
    }
}

/// Initialize the global subscriber.
///
/// Priority order (highest to lowest):
/// 1. Environment variables (`WORKFLOW_RUNTIME_LOG`, `_LOG_FORMAT`, ...)
/// 2. `config`
/// 3. Defaults
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), RuntimeError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);

    let filter = build_env_filter(config)?;
    let format = env_or(ENV_LOG_FORMAT, config.format)?;
    let output = env_or(ENV_LOG_OUTPUT, config.output)?;
    let use_color = config.color && output != LogOutput::File;
    let writer = make_writer(output, config)?;

    let registry = Registry::default().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(use_color)
                    .with_writer(writer),
            )
            .try_init(),
    };
    result.map_err(|e| RuntimeError::Config(format!("Failed to initialize logging: {}", e)))
}

fn env_or<T: FromStr<Err = RuntimeError>>(var: &str, fallback: T) -> Result<T, RuntimeError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => value.trim().parse(),
        _ => Ok(fallback),
    }
}

fn make_writer(output: LogOutput, config: &LoggingConfig) -> Result<BoxMakeWriter, RuntimeError> {
    Ok(match output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::File => {
            if let Some(parent) = config.file.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| {
                    RuntimeError::Config(format!("Failed to create log directory: {}", e))
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&config.file)
                .map_err(|e| {
                    RuntimeError::Config(format!(
                        "Failed to open log file {:?}: {}",
                        config.file, e
                    ))
                })?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
    })
}

/// Filter from `WORKFLOW_RUNTIME_LOG` if set, otherwise from the config
/// level plus module directives.
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, RuntimeError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_LOG) {
        return Ok(filter);
    }

    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(&config.level);
    for directive in module_directives(config, std::env::var(ENV_LOG_MODULES).ok().as_deref()) {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| RuntimeError::Config(format!("Invalid log directive: {}", e)))?,
        );
    }
    Ok(filter)
}

/// `module=level` directives from the config, then from a comma separated
/// env list. Malformed env entries are skipped.
fn module_directives(config: &LoggingConfig, env_modules: Option<&str>) -> Vec<String> {
    let mut directives: Vec<String> = config
        .modules
        .iter()
        .map(|(module, level)| format!("{}={}", module, level))
        .collect();

    if let Some(modules) = env_modules {
        for spec in modules.split(',') {
            if let Some((module, level)) = spec.split_once('=') {
                let (module, level) = (module.trim(), level.trim());
                if !module.is_empty() && !level.is_empty() {
                    directives.push(format!("{}={}", module, level));
                }
            }
        }
    }
    directives
}
