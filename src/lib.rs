//! Restree: resource-tree synchronization for a game-engine resource browser
//!
//! Mirrors a remote, hierarchical resource namespace into an in-memory tree
//! owned by a single UI thread. Background population, live filesystem
//! reconciliation and drag-and-drop hover expansion all reach the tree only
//! through the UI marshal.

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod hover;
pub mod logging;
pub mod marshal;
pub mod population;
pub mod reconcile;
pub mod service;
pub mod tree;
pub mod watch;

pub use browser::{Browser, Listing};
pub use error::{BrowserError, ResourceError};
pub use tree::{NodeId, ResourceTree, VirtualPath};
