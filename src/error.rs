//! Error types for the resource-tree synchronization engine.

use crate::tree::path::VirtualPath;
use thiserror::Error;

/// Errors reported by a resource service (remote or local fallback)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("Resource not found: {0}")]
    NotFound(VirtualPath),

    #[error("Not a directory: {0}")]
    NotADirectory(VirtualPath),

    #[error("Resource is read-only: {0}")]
    ReadOnly(VirtualPath),

    #[error("Resource already exists: {0}")]
    AlreadyExists(VirtualPath),

    #[error("Resource service transport error: {0}")]
    Transport(String),

    #[error("Resource I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ResourceError {
    fn from(err: std::io::Error) -> Self {
        ResourceError::Io(err.to_string())
    }
}

/// Errors surfaced by the browser core
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("A population run is already active")]
    AlreadyPopulating,

    #[error("Resource service error: {0}")]
    Resource(#[from] ResourceError),

    #[error("UI marshal is closed")]
    MarshalClosed,

    #[error("Failed to start UI thread: {0}")]
    UiThread(String),

    #[error("UI job panicked: {0}")]
    MarshalPanicked(String),

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Path not found in tree: {0}")]
    NotInTree(VirtualPath),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for BrowserError {
    fn from(err: config::ConfigError) -> Self {
        BrowserError::ConfigError(err.to_string())
    }
}

impl From<notify::Error> for BrowserError {
    fn from(err: notify::Error) -> Self {
        BrowserError::Watch(err.to_string())
    }
}
