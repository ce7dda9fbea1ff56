//! Merge rules: defaults first, later sources override earlier ones.

use super::{default_poll_interval_ms, default_queue_tree, default_store_path, default_worker_count};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a builder with every default set, so any later source only needs
/// to name the keys it overrides.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default(
            "store.path",
            default_store_path().to_string_lossy().into_owned(),
        )?
        .set_default("queue.tree", default_queue_tree())?
        .set_default("queue.poll_interval_ms", default_poll_interval_ms())?
        .set_default("workers.count", default_worker_count() as u64)
}
