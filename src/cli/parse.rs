//! CLI parse: clap types for workflow-runtime. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// workflow-runtime CLI - queue-driven workflow execution
#[derive(Parser, Debug)]
#[command(name = "workflow-runtime")]
#[command(about = "Run workflows for queued jobs with task-local fixture scopes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (used with --log-output file)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage job records
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Manage the persistent job queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Run workers against the job queue until interrupted
    Run {
        /// Number of workers (overrides workers.count)
        #[arg(long)]
        workers: Option<usize>,

        /// Workflow to run for every job
        #[arg(long, default_value = "echo")]
        workflow: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum JobCommands {
    /// Create a job record
    Create {
        /// Job id
        id: String,
        /// Workflow name recorded on the job
        #[arg(long)]
        workflow: Option<String>,
        /// Job arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
        /// Also push the job onto the queue
        #[arg(long)]
        enqueue: bool,
    },
    /// Show a job and its status log
    Show {
        id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List jobs, newest first
    List,
    /// Delete a job and its status log
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// Push job ids onto the queue
    Push {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Number of queued ids
    Len,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Validate the effective configuration
    Validate,
}
