//! Configuration System
//!
//! Hierarchical configuration for the browser core: defaults, then the global
//! config file, then workspace files, then `RESTREE_` environment overrides.
//! Validation collects every problem instead of stopping at the first.

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

mod loader;
mod merge;
mod sources;

pub use loader::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestreeConfig {
    /// Native roots backing the namespace
    #[serde(default)]
    pub roots: RootsConfig,

    #[serde(default)]
    pub population: PopulationConfig,

    #[serde(default)]
    pub hover: HoverConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Data and user-data roots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootsConfig {
    /// Read-only data namespace
    pub data_root: Option<PathBuf>,

    /// Writable overlay; falls back to `data_root` when unset
    pub user_data_root: Option<PathBuf>,
}

impl RootsConfig {
    /// Resolve both roots, if a data root is configured
    pub fn resolve(&self) -> Option<(PathBuf, PathBuf)> {
        let data = self.data_root.clone()?;
        let user = self.user_data_root.clone().unwrap_or_else(|| data.clone());
        Some((data, user))
    }
}

/// Population worker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Listings in flight at once within one traversal level
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,

    /// Expand the tree root once population finishes
    #[serde(default = "default_true")]
    pub expand_root: bool,
}

fn default_max_concurrent_queries() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_queries: default_max_concurrent_queries(),
            expand_root: default_true(),
        }
    }
}

/// Hover-to-expand settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoverConfig {
    /// Dwell time before a hovered directory expands
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,

    /// Collapse auto-expanded directories when the pointer leaves them
    #[serde(default)]
    pub collapse_on_hover_exit: bool,
}

fn default_dwell_ms() -> u64 {
    1000
}

impl HoverConfig {
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self {
            dwell_ms: default_dwell_ms(),
            collapse_on_hover_exit: false,
        }
    }
}

/// Filesystem watch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Start watching both roots after the first population
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path components whose changes are dropped before reconciliation
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

fn default_ignore_patterns() -> Vec<String> {
    vec![
        ".git".to_string(),
        "*.swp".to_string(),
        "*.tmp".to_string(),
        "~*".to_string(),
    ]
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Roots(String),
    Population(String),
    Watch(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Roots(msg) => write!(f, "Roots: {}", msg),
            ValidationError::Population(msg) => write!(f, "Population: {}", msg),
            ValidationError::Watch(msg) => write!(f, "Watch: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

impl RestreeConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Some(data_root) = &self.roots.data_root {
            if data_root.as_os_str().is_empty() {
                errors.push(ValidationError::Roots("data_root cannot be empty".to_string()));
            }
        }
        if self.roots.user_data_root.is_some() && self.roots.data_root.is_none() {
            errors.push(ValidationError::Roots(
                "user_data_root requires data_root".to_string(),
            ));
        }

        if self.population.max_concurrent_queries == 0 {
            errors.push(ValidationError::Population(
                "max_concurrent_queries must be at least 1".to_string(),
            ));
        }

        for pattern in &self.watch.ignore_patterns {
            if pattern.trim().is_empty() || pattern == "*" {
                errors.push(ValidationError::Watch(format!(
                    "Ignore pattern '{}' would drop every event",
                    pattern
                )));
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::Logging(format!(
                "Unknown level '{}'",
                self.logging.level
            )));
        }
        if self.logging.format != "text" && self.logging.format != "json" {
            errors.push(ValidationError::Logging(format!(
                "Unknown format '{}'",
                self.logging.format
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
