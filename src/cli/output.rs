//! CLI output: error mapping from domain errors to the CLI surface.

use crate::error::RuntimeError;
use std::error::Error;

/// Render an error with its source chain, one cause per line.
pub fn map_error(e: &RuntimeError) -> String {
    let mut out = format!("Error: {}", e);
    let mut source = e.source();
    while let Some(cause) = source {
        out.push_str(&format!("\n  caused by: {}", cause));
        source = cause.source();
    }
    out
}
