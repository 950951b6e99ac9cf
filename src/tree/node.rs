//! Tree node types

use crate::tree::path::VirtualPath;
use slotmap::new_key_type;
use std::collections::BTreeMap;

new_key_type! {
    /// Generational handle to a node in a `ResourceTree`
    ///
    /// Handles are non-owning: once the node is removed the handle resolves to
    /// nothing, even if the arena slot is reused.
    pub struct NodeId;
}

/// Display name of error placeholders
///
/// A real directory may carry the same name. Placeholders are held outside
/// the name-keyed `children` map, so lookups never resolve to one.
pub const ERROR_PLACEHOLDER_NAME: &str = "<error>";

/// What a node stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    /// Inline marker for a subtree whose listing failed
    Placeholder { message: String },
}

impl NodeKind {
    pub fn is_directory(&self) -> bool {
        matches!(self, NodeKind::Directory)
    }
}

/// One node of the mirrored namespace
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub path: VirtualPath,
    pub kind: NodeKind,
    /// Back-reference used for path reconstruction and ancestor checks only
    pub parent: Option<NodeId>,
    pub children: BTreeMap<String, NodeId>,
    /// Error placeholder left by a failed listing
    pub placeholder: Option<NodeId>,
    pub expanded: bool,
    /// Set once the node's children have been listed successfully
    pub listed: bool,
}

impl TreeNode {
    pub(crate) fn directory(path: VirtualPath, parent: Option<NodeId>) -> Self {
        Self {
            name: path.name().to_string(),
            path,
            kind: NodeKind::Directory,
            parent,
            children: BTreeMap::new(),
            placeholder: None,
            expanded: false,
            listed: false,
        }
    }

    pub(crate) fn placeholder(parent_path: &VirtualPath, parent: NodeId, message: String) -> Self {
        Self {
            name: ERROR_PLACEHOLDER_NAME.to_string(),
            path: parent_path.join(ERROR_PLACEHOLDER_NAME),
            kind: NodeKind::Placeholder { message },
            parent: Some(parent),
            children: BTreeMap::new(),
            placeholder: None,
            expanded: false,
            listed: false,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    /// True if the node has directory children or an error placeholder
    pub fn has_children(&self) -> bool {
        !self.children.is_empty() || self.placeholder.is_some()
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, NodeKind::Placeholder { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Placeholder { message } => Some(message),
            _ => None,
        }
    }
}
