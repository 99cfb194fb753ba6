//! Search over the loaded part of the tree
//!
//! Only nodes that are already in the arena take part; a search never
//! triggers a fetch. A node matches when the key is a case-insensitive
//! substring of its name, or of its full path when the key contains `/`.
//!
//! Results are ranked by the byte offset of the first match (earlier is
//! better), then by depth (shallower is better), then by tree pre-order.

use crate::tree::{TreeArena, TreeNode};
use std::sync::Arc;

/// A normalized, non-empty search key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    raw: String,
    needle: String,
    match_path: bool,
}

impl SearchQuery {
    /// Returns `None` for an empty key, which means "not searching"
    pub fn new(key: &str) -> Option<Self> {
        if key.is_empty() {
            return None;
        }
        Some(Self {
            raw: key.to_string(),
            needle: key.to_lowercase(),
            match_path: key.contains('/'),
        })
    }

    /// The key as typed
    pub fn key(&self) -> &str {
        &self.raw
    }

    /// Offset of the first match in the node's name (or path), if any
    pub fn match_position(&self, node: &TreeNode) -> Option<usize> {
        let haystack = if self.match_path {
            &node.path
        } else {
            &node.name
        };
        haystack.to_lowercase().find(&self.needle)
    }
}

/// Collect and rank every loaded node matching `query`
pub fn search(arena: &TreeArena, query: &SearchQuery) -> Vec<Arc<TreeNode>> {
    let mut hits: Vec<(usize, usize, usize, Arc<TreeNode>)> = Vec::new();
    let mut order = 0;
    arena.walk_loaded("", |node| {
        if let Some(position) = query.match_position(node) {
            hits.push((position, node.depth(), order, Arc::clone(node)));
        }
        order += 1;
    });

    hits.sort_by_key(|(position, depth, order, _)| (*position, *depth, *order));
    hits.into_iter().map(|(_, _, _, node)| node).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::RemoteNode;

    fn arena() -> TreeArena {
        TreeArena::from_root(RemoteNode::tree(
            "",
            vec![
                RemoteNode::tree(
                    "src",
                    vec![
                        RemoteNode::blob("src/lib.rs"),
                        RemoteNode::blob("src/mylib.rs"),
                        RemoteNode::unloaded_tree("src/library"),
                    ],
                ),
                RemoteNode::tree("Libs", vec![]),
                RemoteNode::blob("README.md"),
            ],
        ))
        .unwrap()
    }

    fn paths(nodes: &[Arc<TreeNode>]) -> Vec<&str> {
        nodes.iter().map(|n| n.path.as_str()).collect()
    }

    #[test]
    fn test_empty_key_is_not_a_query() {
        assert!(SearchQuery::new("").is_none());
        assert_eq!(SearchQuery::new("Lib").unwrap().key(), "Lib");
    }

    #[test]
    fn test_case_insensitive_ranked_matches() {
        let query = SearchQuery::new("LIB").unwrap();
        let results = search(&arena(), &query);

        assert_eq!(
            paths(&results),
            vec!["Libs", "src/lib.rs", "src/library", "src/mylib.rs"]
        );
    }

    #[test]
    fn test_key_with_slash_matches_paths() {
        let query = SearchQuery::new("src/my").unwrap();
        assert_eq!(paths(&search(&arena(), &query)), vec!["src/mylib.rs"]);
    }

    #[test]
    fn test_no_match() {
        let query = SearchQuery::new("zzz").unwrap();
        assert!(search(&arena(), &query).is_empty());
    }
}
