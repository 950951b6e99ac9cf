//! Hover-to-expand tracking for drag-and-drop
//!
//! While a drag hovers over a directory, the directory expands once the
//! pointer has dwelt on it long enough. The tracker lives on the UI thread
//! and is driven with explicit timestamps, so toolkits can forward their own
//! event clock.

use crate::config::HoverConfig;
use crate::tree::node::NodeId;
use crate::tree::resource_tree::ResourceTree;
use std::time::{Duration, Instant};
use tracing::trace;

/// Result of reporting a pointer position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverOutcome {
    /// Pointer arrived on a new node; the dwell timer started
    Started,
    /// Still on the same node, dwell not yet reached
    Dwelling,
    /// Dwell reached and the node was expanded now
    Expanded,
    /// Dwell reached but the node was already expanded
    AlreadyExpanded,
    /// Pointer is not over a live node
    Ignored,
}

#[derive(Debug, Clone, Copy)]
struct HoverState {
    node: NodeId,
    since: Instant,
    was_expanded: bool,
    auto_expanded: bool,
}

/// Tracks the node under a drag and expands it after a dwell
#[derive(Debug, Clone)]
pub struct HoverExpansionTracker {
    dwell: Duration,
    collapse_on_exit: bool,
    state: Option<HoverState>,
}

impl HoverExpansionTracker {
    pub fn new(dwell: Duration, collapse_on_exit: bool) -> Self {
        Self {
            dwell,
            collapse_on_exit,
            state: None,
        }
    }

    pub fn from_config(config: &HoverConfig) -> Self {
        Self::new(config.dwell(), config.collapse_on_hover_exit)
    }

    /// Node currently under the pointer
    pub fn hovered(&self) -> Option<NodeId> {
        self.state.map(|s| s.node)
    }

    /// Report that the pointer is over `node` at `now`
    ///
    /// Moving to a different node restarts the dwell timer.
    pub fn on_pointer_enter(
        &mut self,
        tree: &mut ResourceTree,
        node: NodeId,
        now: Instant,
    ) -> HoverOutcome {
        if tree.node(node).is_none() {
            self.release(tree);
            return HoverOutcome::Ignored;
        }

        match self.state.as_mut() {
            Some(state) if state.node == node => {
                if now.saturating_duration_since(state.since) < self.dwell {
                    return HoverOutcome::Dwelling;
                }
                if tree.expand(node) {
                    state.auto_expanded = true;
                    trace!(node = ?node, "Hover dwell expanded node");
                    HoverOutcome::Expanded
                } else {
                    HoverOutcome::AlreadyExpanded
                }
            }
            _ => {
                self.release(tree);
                self.state = Some(HoverState {
                    node,
                    since: now,
                    was_expanded: tree.is_expanded(node),
                    auto_expanded: false,
                });
                HoverOutcome::Started
            }
        }
    }

    /// Report that the pointer left the tree or the drag ended
    pub fn on_pointer_leave(&mut self, tree: &mut ResourceTree) {
        self.release(tree);
    }

    fn release(&mut self, tree: &mut ResourceTree) {
        if let Some(state) = self.state.take() {
            if self.collapse_on_exit && state.auto_expanded && !state.was_expanded {
                tree.collapse(state.node);
            }
        }
    }
}
