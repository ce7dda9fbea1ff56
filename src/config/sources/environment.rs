//! Environment source: `WORKFLOW_RUNTIME__WORKERS__COUNT=4` sets `workers.count`.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment};

pub const PREFIX: &str = "WORKFLOW_RUNTIME";
pub const SEPARATOR: &str = "__";

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(PREFIX)
            .prefix_separator(SEPARATOR)
            .separator(SEPARATOR)
            .try_parsing(true),
    )
}
