//! Loading entry points.

use super::merge::builder_with_defaults;
use super::sources::{environment, global_file, workspace_file};
use super::RuntimeConfig;
use crate::error::RuntimeError;
use config::{ConfigError, File};
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (lowest to highest): defaults, global file, workspace
    /// `config/config.toml`, workspace `config/{env}.toml`, environment.
    pub fn load(workspace_root: &Path) -> Result<RuntimeConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);
        builder.build()?.try_deserialize()
    }

    /// Load configuration from a single file on top of the defaults.
    pub fn load_from_file(path: &Path) -> Result<RuntimeConfig, ConfigError> {
        builder_with_defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()
    }

    /// Load and validate. Validation failures are joined into one message.
    pub fn load_validated(workspace_root: &Path) -> Result<RuntimeConfig, RuntimeError> {
        let config = Self::load(workspace_root)?;
        config.check()?;
        Ok(config)
    }

    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
