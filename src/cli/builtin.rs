//! Workflows shipped with the binary.

use crate::fixture::resolve_as;
use crate::runtime::fixture_names::{JOB_DOCUMENT, RESULTS};
use crate::runtime::Results;
use crate::store::JobDocument;
use crate::workflow::Workflow;

pub const ECHO_WORKFLOW: &str = "echo";

/// Copies the job's arguments into its results.
pub fn echo_workflow() -> Workflow {
    Workflow::new(ECHO_WORKFLOW)
        .on_startup("load", || async {
            let job = resolve_as::<JobDocument>(JOB_DOCUMENT).await?;
            anyhow::Ok(format!("Started job {}", job.id))
        })
        .step("echo", || async {
            let job = resolve_as::<JobDocument>(JOB_DOCUMENT).await?;
            let results = resolve_as::<Results>(RESULTS).await?;
            let fields = job.args.as_object().map_or(0, |args| args.len());
            results.insert("args", job.args.clone());
            anyhow::Ok(format!("Echoed {} argument(s)", fields))
        })
        .on_cleanup("finish", || async { Ok("Cleaned up".to_string()) })
}

pub fn builtin_workflow(name: &str) -> Option<Workflow> {
    match name {
        ECHO_WORKFLOW => Some(echo_workflow()),
        _ => None,
    }
}
