//! Merge rules: defaults first, later sources override earlier ones key by key.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("population.max_concurrent_queries", 4_i64)?
        .set_default("population.expand_root", true)?
        .set_default("hover.dwell_ms", 1000_i64)?
        .set_default("hover.collapse_on_hover_exit", false)?
        .set_default("watch.enabled", true)
}
