use crate::tree::{NodeKind, TreeNode};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// One row of the visible list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleNode {
    pub node: Arc<TreeNode>,
    /// Indent level: 0 for root-level rows and for every search result
    pub depth: usize,
}

impl Deref for VisibleNode {
    type Target = TreeNode;

    fn deref(&self) -> &TreeNode {
        &self.node
    }
}

/// Immutable picture of what the sidebar shows
///
/// Produced by the generator after every committed change and handed to
/// subscribers; never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibleNodes {
    /// Rows in display order
    pub nodes: Vec<VisibleNode>,
    /// Path of the focused row; always one of `nodes` when set
    pub focused_node: Option<String>,
    /// Expansion set at snapshot time
    pub expanded_nodes: BTreeSet<String>,
    /// Active search key, if the list is a search result
    pub search_key: Option<String>,
    /// Increases by one with every snapshot the generator publishes
    pub revision: u64,
}

impl VisibleNodes {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&VisibleNode> {
        self.nodes.get(index)
    }

    /// Row paths in display order
    pub fn paths(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.path.as_str()).collect()
    }

    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index_of(path).is_some()
    }

    pub fn focused(&self) -> Option<&VisibleNode> {
        self.focused_index().map(|idx| &self.nodes[idx])
    }

    pub fn focused_index(&self) -> Option<usize> {
        self.focused_node
            .as_deref()
            .and_then(|path| self.index_of(path))
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded_nodes.contains(path)
    }

    pub fn is_searching(&self) -> bool {
        self.search_key.is_some()
    }
}

/// Plain-text rendering, one row per line: focus marker, indent, folder
/// state, then the name (or the full path for search results).
impl fmt::Display for VisibleNodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.nodes {
            let focus = if self.focused_node.as_deref() == Some(row.path.as_str()) {
                ">"
            } else {
                " "
            };
            let marker = match &row.kind {
                NodeKind::Tree { .. } if self.is_expanded(&row.path) => "v",
                NodeKind::Tree { .. } => "+",
                NodeKind::Blob => "-",
                NodeKind::Commit => "@",
            };
            let label = if self.is_searching() {
                &row.path
            } else {
                &row.name
            };
            writeln!(
                f,
                "{focus}{:indent$}{marker} {label}",
                "",
                indent = row.depth * 2
            )?;
        }
        Ok(())
    }
}
