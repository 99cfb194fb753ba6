//! Singleton-folder compression
//!
//! Presentation transform over a hierarchy snapshot: an expanded folder
//! whose only child is a folder is shown on the same row as that child
//! (`src/main/java`). Rows below a merged chain move left by the number of
//! folders merged into it. Search results are never compressed.

use crate::generator::VisibleNodes;
use crate::tree::node::is_descendant_of;
use crate::tree::{NodeKind, TreeNode};
use std::fmt;
use std::sync::Arc;

/// One displayed row, covering one or more consecutive flat rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedRow {
    /// Innermost node of the chain; the one actions apply to
    pub node: Arc<TreeNode>,
    /// Names along the chain joined with `/`
    pub label: String,
    pub depth: usize,
    /// First flat index covered by this row
    pub first_index: usize,
    /// Last flat index covered by this row (the innermost node)
    pub last_index: usize,
    pub expanded: bool,
}

impl CompressedRow {
    /// Number of folders merged into this row besides the innermost one
    pub fn merged(&self) -> usize {
        self.last_index - self.first_index
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressedView {
    rows: Vec<CompressedRow>,
    /// Flat index -> row
    row_of_index: Vec<usize>,
    focused_row: Option<usize>,
}

impl CompressedView {
    pub fn new(snapshot: &VisibleNodes) -> Self {
        let nodes = &snapshot.nodes;
        let mut rows = Vec::with_capacity(nodes.len());
        let mut row_of_index = Vec::with_capacity(nodes.len());
        // (innermost path of a merged chain, total reduction inside it)
        let mut stack: Vec<(&str, usize)> = Vec::new();

        let mut i = 0;
        while i < nodes.len() {
            let first = &nodes[i];
            while stack
                .last()
                .is_some_and(|(path, _)| !is_descendant_of(&first.path, path))
            {
                stack.pop();
            }
            let reduction = stack.last().map_or(0, |(_, r)| *r);

            let mut last = i;
            if !snapshot.is_searching() {
                while let Some(next) = nodes.get(last + 1) {
                    if !is_singleton_parent(snapshot, &nodes[last].node, &next.node) {
                        break;
                    }
                    last += 1;
                }
            }

            let merged = last - i;
            let label = if merged == 0 {
                first.name.clone()
            } else {
                nodes[i..=last]
                    .iter()
                    .map(|n| n.name.as_str())
                    .collect::<Vec<_>>()
                    .join("/")
            };
            let inner = &nodes[last];
            if merged > 0 {
                stack.push((&inner.path, reduction + merged));
            }

            row_of_index.extend(std::iter::repeat(rows.len()).take(merged + 1));
            rows.push(CompressedRow {
                node: Arc::clone(&inner.node),
                label,
                depth: first.depth.saturating_sub(reduction),
                first_index: i,
                last_index: last,
                expanded: snapshot.is_expanded(&inner.path),
            });
            i = last + 1;
        }

        let focused_row = snapshot
            .focused_index()
            .and_then(|idx| row_of_index.get(idx).copied());

        Self {
            rows,
            row_of_index,
            focused_row,
        }
    }

    pub fn rows(&self) -> &[CompressedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row showing the flat row at `index`
    pub fn row_for_index(&self, index: usize) -> Option<usize> {
        self.row_of_index.get(index).copied()
    }

    /// Flat index of the node a row stands for (its innermost node)
    pub fn index_for_row(&self, row: usize) -> Option<usize> {
        self.rows.get(row).map(|r| r.last_index)
    }

    /// Row showing `path`, including folders merged into a chain
    pub fn row_for_path(&self, path: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| r.node.path == path || chain_contains(r, path))
    }

    pub fn focused_row(&self) -> Option<usize> {
        self.focused_row
    }
}

/// `child` is the sole, folder, child of an expanded `parent`
fn is_singleton_parent(snapshot: &VisibleNodes, parent: &TreeNode, child: &TreeNode) -> bool {
    if !snapshot.is_expanded(&parent.path) || !child.is_folder() {
        return false;
    }
    matches!(parent.contents(), Some([only]) if *only == child.path)
}

/// Whether `path` is one of the folders merged into `row`
fn chain_contains(row: &CompressedRow, path: &str) -> bool {
    let merged_above = row.merged();
    let mut ancestor = row.node.path.as_str();
    for _ in 0..merged_above {
        match ancestor.rsplit_once('/') {
            Some((parent, _)) => ancestor = parent,
            None => return false,
        }
        if ancestor == path {
            return true;
        }
    }
    false
}

impl fmt::Display for CompressedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, row) in self.rows.iter().enumerate() {
            let focus = if self.focused_row == Some(idx) { ">" } else { " " };
            let marker = match &row.node.kind {
                NodeKind::Tree { .. } if row.expanded => "v",
                NodeKind::Tree { .. } => "+",
                NodeKind::Blob => "-",
                NodeKind::Commit => "@",
            };
            writeln!(
                f,
                "{focus}{:indent$}{marker} {}",
                "",
                row.label,
                indent = row.depth * 2
            )?;
        }
        Ok(())
    }
}
