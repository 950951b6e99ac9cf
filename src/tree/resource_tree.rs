//! In-memory mirror of the resource namespace
//!
//! The tree is mutated only by its owning thread (see `marshal`). Every batch
//! of mutations is bracketed for the renderer through `ResourceTree::batch`.

use crate::marshal::{NullRenderSink, RenderSink};
use crate::service::ResourceEntry;
use crate::tree::node::{NodeId, TreeNode};
use crate::tree::path::VirtualPath;
use slotmap::SlotMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Hierarchical mirror of the remote namespace (directories only)
pub struct ResourceTree {
    nodes: SlotMap<NodeId, TreeNode>,
    root: NodeId,
    render: Arc<dyn RenderSink>,
    batch_depth: Arc<AtomicUsize>,
}

impl Default for ResourceTree {
    fn default() -> Self {
        Self::new(Arc::new(NullRenderSink))
    }
}

impl ResourceTree {
    /// Create a tree holding only the root, reporting batches to `render`
    pub fn new(render: Arc<dyn RenderSink>) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(TreeNode::directory(VirtualPath::root(), None));
        Self {
            nodes,
            root,
            render,
            batch_depth: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    /// Resolve a path by walking children from the root
    ///
    /// A missing component yields `None`; callers treat that as a stale event.
    pub fn lookup(&self, path: &VirtualPath) -> Option<NodeId> {
        let mut current = self.root;
        for component in path.components() {
            current = *self.nodes.get(current)?.children.get(component)?;
        }
        Some(current)
    }

    /// Deepest existing directory on the way to `path` (the root at worst)
    pub fn nearest_directory(&self, path: &VirtualPath) -> VirtualPath {
        let mut current = self.root;
        for component in path.components() {
            let next = self
                .nodes
                .get(current)
                .and_then(|node| node.children.get(component))
                .copied()
                .filter(|id| self.nodes.get(*id).is_some_and(TreeNode::is_directory));
            match next {
                Some(id) => current = id,
                None => break,
            }
        }
        self.nodes
            .get(current)
            .map(|node| node.path.clone())
            .unwrap_or_default()
    }

    /// Child handles of a node in name order, error placeholder first
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(id)
            .map(|node| {
                node.placeholder
                    .into_iter()
                    .chain(node.children.values().copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Message of the error placeholder under `path`, if its listing failed
    pub fn listing_error(&self, path: &VirtualPath) -> Option<&str> {
        let id = self.nodes.get(self.lookup(path)?)?.placeholder?;
        self.nodes.get(id)?.error_message()
    }

    /// Child names of the node at `path`, empty if it does not exist
    pub fn child_names(&self, path: &VirtualPath) -> Vec<String> {
        self.lookup(path)
            .and_then(|id| self.nodes.get(id))
            .map(|node| node.children.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Replace the direct children of `parent_path` with the directories in `entries`
    ///
    /// Children that survive keep their node, subtree and expansion state.
    /// Returns the paths of the directory children now attached, or `None` if
    /// the parent is not a directory in the tree.
    pub fn insert_or_replace_subtree(
        &mut self,
        parent_path: &VirtualPath,
        entries: &[ResourceEntry],
    ) -> Option<Vec<VirtualPath>> {
        let parent_id = self.lookup(parent_path)?;
        if !self.nodes.get(parent_id)?.is_directory() {
            return None;
        }

        let mut wanted = BTreeSet::new();
        for entry in entries {
            if !entry.is_directory {
                continue;
            }
            if entry.path.is_root() || entry.path.parent() != *parent_path {
                debug!(parent = %parent_path, entry = %entry.path, "Ignoring entry outside listed directory");
                continue;
            }
            wanted.insert(entry.path.name().to_string());
        }

        let stale = self.nodes[parent_id].placeholder.take();
        if let Some(placeholder) = stale {
            self.drop_subtree(placeholder);
        }
        let existing: Vec<(String, NodeId)> = self.nodes[parent_id]
            .children
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect();
        for (name, id) in existing {
            let keep = wanted.contains(&name)
                && self.nodes.get(id).is_some_and(TreeNode::is_directory);
            if !keep {
                self.nodes[parent_id].children.remove(&name);
                self.drop_subtree(id);
            }
        }

        let mut attached = Vec::with_capacity(wanted.len());
        for name in wanted {
            let child_path = parent_path.join(&name);
            if !self.nodes[parent_id].children.contains_key(&name) {
                let child = self
                    .nodes
                    .insert(TreeNode::directory(child_path.clone(), Some(parent_id)));
                self.nodes[parent_id].children.insert(name, child);
                trace!(path = %child_path, "Attached directory node");
            }
            attached.push(child_path);
        }

        self.nodes[parent_id].listed = true;
        Some(attached)
    }

    /// Replace the children of a directory with one error placeholder
    pub fn set_error_placeholder(&mut self, parent_path: &VirtualPath, message: String) -> bool {
        let Some(parent_id) = self.lookup(parent_path) else {
            return false;
        };
        if !self.nodes[parent_id].is_directory() {
            return false;
        }

        let parent = &mut self.nodes[parent_id];
        let children: Vec<NodeId> = std::mem::take(&mut parent.children)
            .into_values()
            .chain(parent.placeholder.take())
            .collect();
        for child in children {
            self.drop_subtree(child);
        }

        let id = self
            .nodes
            .insert(TreeNode::placeholder(parent_path, parent_id, message));
        let parent = &mut self.nodes[parent_id];
        parent.placeholder = Some(id);
        parent.listed = false;
        true
    }

    /// Detach the node at `path` with its whole subtree
    ///
    /// Returns false if nothing was removed. The root is never removed.
    pub fn remove(&mut self, path: &VirtualPath) -> bool {
        if path.is_root() {
            return false;
        }
        let Some(id) = self.lookup(path) else {
            return false;
        };
        if let Some(parent_id) = self.nodes[id].parent {
            if let Some(parent) = self.nodes.get_mut(parent_id) {
                parent.children.remove(path.name());
            }
        }
        self.drop_subtree(id);
        true
    }

    fn drop_subtree(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(next) {
                pending.extend(node.children.into_values().chain(node.placeholder));
            }
        }
    }

    /// Mark a directory expanded; returns true if the flag changed
    pub fn expand(&mut self, id: NodeId) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) if node.is_directory() && !node.expanded => {
                node.expanded = true;
                true
            }
            _ => false,
        }
    }

    /// Clear the expanded flag; returns true if the flag changed
    pub fn collapse(&mut self, id: NodeId) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) if node.expanded => {
                node.expanded = false;
                true
            }
            _ => false,
        }
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|node| node.expanded)
    }

    /// True if `ancestor` is `node` or lies on its parent chain
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id).and_then(|n| n.parent);
        }
        false
    }

    /// Pre-order walk yielding `(depth, id)`, children in name order
    pub fn walk(&self) -> Vec<(usize, NodeId)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(0usize, self.root)];
        while let Some((depth, id)) = stack.pop() {
            out.push((depth, id));
            for child in self.children(id).into_iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        out
    }

    /// Run `f` inside one begin/end update bracket
    ///
    /// Nested calls share the outermost bracket. The bracket is closed even if
    /// `f` panics.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut ResourceTree) -> R) -> R {
        let _scope = BatchScope::open(Arc::clone(&self.render), Arc::clone(&self.batch_depth));
        f(self)
    }

    /// Drop every node and start over from an empty root
    pub fn reset(&mut self) {
        self.batch(|tree| {
            tree.nodes.clear();
            tree.root = tree
                .nodes
                .insert(TreeNode::directory(VirtualPath::root(), None));
        });
        debug!("Resource tree reset");
    }
}

struct BatchScope {
    render: Arc<dyn RenderSink>,
    depth: Arc<AtomicUsize>,
}

impl BatchScope {
    fn open(render: Arc<dyn RenderSink>, depth: Arc<AtomicUsize>) -> Self {
        if depth.fetch_add(1, Ordering::SeqCst) == 0 {
            render.begin_update();
        }
        Self { render, depth }
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        if self.depth.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.render.end_update();
        }
    }
}
