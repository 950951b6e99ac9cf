//! CLI presentation: text and json formatters for trees, listings and reports.

use crate::browser::Listing;
use crate::population::PopulationReport;
use crate::tree::node::{NodeId, NodeKind};
use crate::tree::path::VirtualPath;
use crate::tree::resource_tree::ResourceTree;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::{json, Value};

/// Indented tree below `root`; placeholders show their error message
pub fn format_tree_text(
    tree: &ResourceTree,
    root: &VirtualPath,
    max_depth: Option<usize>,
    color: bool,
) -> String {
    let Some(start) = tree.lookup(root) else {
        return format!("{} is not in the tree", root);
    };

    let mut out = String::new();
    let mut stack: Vec<(usize, NodeId)> = vec![(0, start)];
    while let Some((depth, id)) = stack.pop() {
        let Some(node) = tree.node(id) else {
            continue;
        };
        let indent = "  ".repeat(depth);
        let line = match &node.kind {
            NodeKind::Directory => {
                let marker = if !node.has_children() {
                    " "
                } else if node.expanded {
                    "▾"
                } else {
                    "▸"
                };
                let name = if node.path.is_root() {
                    node.path.to_string()
                } else {
                    format!("{}/", node.name)
                };
                if color {
                    format!("{}{} {}", indent, marker, name.bold())
                } else {
                    format!("{}{} {}", indent, marker, name)
                }
            }
            NodeKind::Placeholder { message } => {
                let text = format!("{} {}", node.name, message);
                if color {
                    format!("{}  {}", indent, text.red())
                } else {
                    format!("{}  {}", indent, text)
                }
            }
        };
        out.push_str(&line);
        out.push('\n');

        if max_depth.map_or(true, |max| depth < max) {
            for child in tree.children(id).into_iter().rev() {
                stack.push((depth + 1, child));
            }
        }
    }
    out
}

/// Nested JSON object for the subtree below `root`
pub fn format_tree_json(
    tree: &ResourceTree,
    root: &VirtualPath,
    max_depth: Option<usize>,
) -> Result<String, serde_json::Error> {
    let value = match tree.lookup(root) {
        Some(id) => node_json(tree, id, 0, max_depth),
        None => Value::Null,
    };
    serde_json::to_string_pretty(&value)
}

fn node_json(tree: &ResourceTree, id: NodeId, depth: usize, max_depth: Option<usize>) -> Value {
    let Some(node) = tree.node(id) else {
        return Value::Null;
    };
    let children: Vec<Value> = if max_depth.map_or(true, |max| depth < max) {
        tree.children(id)
            .into_iter()
            .map(|child| node_json(tree, child, depth + 1, max_depth))
            .collect()
    } else {
        Vec::new()
    };
    json!({
        "name": node.name,
        "path": node.path.to_string(),
        "expanded": node.expanded,
        "error": node.error_message(),
        "children": children,
    })
}

pub fn format_listing_text(listing: &Listing) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Name", "Kind"]);
    for name in &listing.directories {
        table.add_row(vec![format!("{}/", name), "directory".to_string()]);
    }
    for name in &listing.files {
        table.add_row(vec![name.clone(), "file".to_string()]);
    }
    format!(
        "{}\n{}\n{} directories, {} files",
        listing.path,
        table,
        listing.directories.len(),
        listing.files.len()
    )
}

pub fn format_listing_json(listing: &Listing) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(listing)
}

/// One-paragraph population summary
pub fn format_report_text(report: &PopulationReport) -> String {
    let mut out = format!(
        "Populated {} in {} ms: {} directories listed, {} nodes attached",
        report.root,
        report.elapsed.as_millis(),
        report.directories_listed,
        report.nodes_attached
    );
    if report.cancelled {
        out.push_str(" (cancelled)");
    }
    for failure in &report.failures {
        out.push_str(&format!("\n  failed: {} ({})", failure.path, failure.error));
    }
    out
}
