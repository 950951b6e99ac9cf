//! Integration tests for layered configuration loading

use super::test_utils::with_isolated_env;
use restree::config::{global_config_path, ConfigLoader};
use std::path::PathBuf;
use tempfile::TempDir;

fn write(path: PathBuf, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

#[test]
fn test_defaults_without_any_files() {
    let temp_dir = TempDir::new().unwrap();
    let config = with_isolated_env(&temp_dir, &[], || {
        ConfigLoader::load(&temp_dir.path().join("workspace")).unwrap()
    });
    assert_eq!(config, ConfigLoader::defaults());
}

#[test]
fn test_workspace_overrides_global_file() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path().join("workspace");

    let config = with_isolated_env(&temp_dir, &[], || {
        let global = global_config_path().unwrap();
        write(
            global,
            "[hover]\ndwell_ms = 300\ncollapse_on_hover_exit = true\n",
        );
        write(
            workspace.join("config").join("config.toml"),
            "[hover]\ndwell_ms = 700\n",
        );
        ConfigLoader::load(&workspace).unwrap()
    });

    assert_eq!(config.hover.dwell_ms, 700);
    assert!(config.hover.collapse_on_hover_exit);
}

#[test]
fn test_environment_file_and_variables() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path().join("workspace");
    write(
        workspace.join("config").join("config.toml"),
        "[population]\nmax_concurrent_queries = 2\n",
    );
    write(
        workspace.join("config").join("staging.toml"),
        "[population]\nmax_concurrent_queries = 6\n",
    );

    let staged = with_isolated_env(&temp_dir, &[("RESTREE_ENV", "staging")], || {
        ConfigLoader::load(&workspace).unwrap()
    });
    assert_eq!(staged.population.max_concurrent_queries, 6);

    let overridden = with_isolated_env(
        &temp_dir,
        &[("RESTREE_HOVER__DWELL_MS", "125")],
        || ConfigLoader::load(&workspace).unwrap(),
    );
    assert_eq!(overridden.population.max_concurrent_queries, 2);
    assert_eq!(overridden.hover.dwell_ms, 125);
}

#[test]
fn test_invalid_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[population]\nmax_concurrent_queries = \"many\"\n").unwrap();
    assert!(ConfigLoader::load_from_file(&path).is_err());
}
