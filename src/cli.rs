//! CLI domain: parse, route, output and presentation only.
//! One route table dispatches to the store, the queue and the worker pool.

mod builtin;
mod output;
mod parse;
mod presentation;
mod route;

pub use builtin::{builtin_workflow, echo_workflow, ECHO_WORKFLOW};
pub use output::map_error;
pub use parse::{Cli, Commands, ConfigCommands, JobCommands, QueueCommands};
pub use presentation::{
    format_job_json, format_job_list_text, format_job_text, format_run_summary,
};
pub use route::RunContext;
