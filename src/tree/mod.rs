//! Resource Tree
//!
//! In-memory mirror of the remote namespace: virtual paths, nodes held in a
//! generational arena, and the tree operations the workers marshal onto the
//! UI thread.

pub mod node;
pub mod path;
pub mod resource_tree;

pub use node::{NodeId, NodeKind, TreeNode, ERROR_PLACEHOLDER_NAME};
pub use path::VirtualPath;
pub use resource_tree::ResourceTree;
