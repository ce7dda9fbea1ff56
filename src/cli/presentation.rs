//! CLI presentation: text and json formatters.

use crate::error::RuntimeError;
use crate::runtime::WorkerStats;
use crate::store::{JobDocument, JobState};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Format a section heading with bold/underline.
fn section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn styled_state(state: JobState) -> String {
    match state {
        JobState::Waiting => state.as_str().dimmed().to_string(),
        JobState::Running => state.as_str().yellow().to_string(),
        JobState::Complete => state.as_str().green().to_string(),
        JobState::Error => state.as_str().red().to_string(),
    }
}

/// A job header followed by its status log.
pub fn format_job_text(job: &JobDocument) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", section_heading(&format!("Job {}", job.id))));
    out.push_str(&format!(
        "  Workflow: {}\n",
        job.workflow.as_deref().unwrap_or("-")
    ));
    out.push_str(&format!("  Created:  {}\n", job.created_at.to_rfc3339()));
    out.push_str(&format!("  Args:     {}\n\n", job.args));

    if job.status.is_empty() {
        out.push_str("No status updates.\n");
        return out;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Time", "State", "Stage", "Step", "Progress", "Update"]);
    for record in &job.status {
        let status = &record.status;
        table.add_row(vec![
            record.timestamp.format("%H:%M:%S%.3f").to_string(),
            styled_state(status.state),
            status
                .stage
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            status.step.clone().unwrap_or_else(|| "-".to_string()),
            format!("{:.0}%", status.progress * 100.0),
            status.update.clone(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

pub fn format_job_json(job: &JobDocument) -> Result<String, RuntimeError> {
    serde_json::to_string_pretty(job)
        .map_err(|e| RuntimeError::Config(format!("Failed to serialize job: {}", e)))
}

/// One row per job with its latest state.
pub fn format_job_list_text(jobs: &[JobDocument]) -> String {
    if jobs.is_empty() {
        return "No jobs.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Job", "Workflow", "Created", "State", "Last update"]);
    for job in jobs {
        let (state, update) = match job.latest() {
            Some(record) => (
                styled_state(record.status.state),
                record.status.update.clone(),
            ),
            None => (styled_state(JobState::Waiting), "-".to_string()),
        };
        table.add_row(vec![
            job.id.clone(),
            job.workflow.clone().unwrap_or_else(|| "-".to_string()),
            job.created_at.to_rfc3339(),
            state,
            update,
        ]);
    }
    format!("{}\n\nTotal: {} jobs.", table, jobs.len())
}

pub fn format_run_summary(workflow: &str, stats: &WorkerStats) -> String {
    format!(
        "{}\n  Completed: {}\n  Failed:    {}",
        section_heading(&format!("Workflow '{}' stopped", workflow)),
        stats.completed,
        stats.failed
    )
}
