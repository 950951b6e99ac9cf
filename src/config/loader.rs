//! Config loader: assembles the layered sources into a `RestreeConfig`.

use super::merge::merge_policy;
use super::sources::{environment, global_file, workspace_file};
use super::RestreeConfig;
use config::{ConfigError, File};
use std::path::Path;
use tracing::debug;

/// Loads configuration from files and environment
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace
    ///
    /// Order (lowest to highest precedence): built-in defaults, the global
    /// config file, `config/config.toml`, `config/{RESTREE_ENV}.toml`, then
    /// `RESTREE_` environment variables.
    pub fn load(workspace_root: &Path) -> Result<RestreeConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        let config: RestreeConfig = builder.build()?.try_deserialize()?;
        debug!(workspace = %workspace_root.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load configuration from a single file, defaults filling the gaps
    pub fn load_from_file(path: &Path) -> Result<RestreeConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()
    }

    /// Built-in defaults only
    pub fn defaults() -> RestreeConfig {
        RestreeConfig::default()
    }
}
