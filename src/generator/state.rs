use super::snapshot::{VisibleNode, VisibleNodes};
use crate::search::{self, SearchQuery};
use crate::tree::node::{is_descendant_of, parent_path};
use crate::tree::TreeArena;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Mutable state behind the generator lock
///
/// Everything here changes synchronously; the generator only touches it
/// between awaits.
#[derive(Debug)]
pub(crate) struct GeneratorState {
    pub arena: TreeArena,
    /// Folders the user has opened (root is implicit and never listed)
    pub expanded: BTreeSet<String>,
    pub focused: Option<String>,
    pub query: Option<SearchQuery>,
    /// Latest expand/collapse request per folder; an awaited expansion only
    /// takes effect if nothing newer was asked for in the meantime
    intents: HashMap<String, u64>,
    /// Intent of the latest collapse per folder
    collapsed_at: HashMap<String, u64>,
    next_intent: u64,
    revision: u64,
    /// Last published snapshot
    pub current: Arc<VisibleNodes>,
}

impl GeneratorState {
    pub fn new(arena: TreeArena) -> Self {
        let mut state = Self {
            arena,
            expanded: BTreeSet::new(),
            focused: None,
            query: None,
            intents: HashMap::new(),
            collapsed_at: HashMap::new(),
            next_intent: 0,
            revision: 0,
            current: Arc::new(VisibleNodes::default()),
        };
        state.current = Arc::new(state.compute());
        state
    }

    /// Register a new expand/collapse request for `path`
    pub fn begin_intent(&mut self, path: &str) -> u64 {
        self.next_intent += 1;
        self.intents.insert(path.to_string(), self.next_intent);
        self.next_intent
    }

    pub fn intent_is_current(&self, path: &str, token: u64) -> bool {
        self.intents.get(path) == Some(&token)
    }

    /// Token marking the start of a multi-step expansion; every intent
    /// registered afterwards compares greater or equal
    pub fn operation_start(&self) -> u64 {
        self.next_intent + 1
    }

    /// Register a collapse request for `path` and apply it
    pub fn begin_collapse(&mut self, path: &str) -> bool {
        let token = self.begin_intent(path);
        self.collapsed_at.insert(path.to_string(), token);
        self.collapse(path)
    }

    /// Whether some ancestor of `path` was collapsed after `operation` began
    pub fn ancestor_collapsed_since(&self, path: &str, operation: u64) -> bool {
        let mut current = parent_path(path);
        while let Some(ancestor) = current {
            if self
                .collapsed_at
                .get(ancestor)
                .is_some_and(|&token| token >= operation)
            {
                return true;
            }
            current = parent_path(ancestor);
        }
        false
    }

    /// Remove `path` and every descendant from the expansion set
    pub fn collapse(&mut self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        let was_expanded = self.expanded.remove(path);
        let before = self.expanded.len();
        self.expanded.retain(|p| !is_descendant_of(p, path));
        was_expanded || self.expanded.len() != before
    }

    /// Drop expansion entries and focus that point at nodes no longer in
    /// the arena
    pub fn prune(&mut self) {
        let arena = &self.arena;
        self.expanded
            .retain(|p| arena.get(p).is_some_and(|n| n.is_folder()));
        self.intents.retain(|p, _| arena.contains(p));
        self.collapsed_at.retain(|p, _| arena.contains(p));
        if self.focused.as_deref().is_some_and(|p| !arena.contains(p)) {
            self.focused = None;
        }
    }

    /// Compute the next snapshot and make it current
    pub fn publish(&mut self) -> Arc<VisibleNodes> {
        self.revision += 1;
        let snapshot = Arc::new(self.compute());
        if snapshot.focused_node.is_none() {
            self.focused = None;
        }
        self.current = Arc::clone(&snapshot);
        snapshot
    }

    fn compute(&self) -> VisibleNodes {
        let nodes = match &self.query {
            Some(query) => search::search(&self.arena, query)
                .into_iter()
                .map(|node| VisibleNode { node, depth: 0 })
                .collect(),
            None => self.flatten(),
        };

        let focused_node = self
            .focused
            .as_ref()
            .filter(|path| nodes.iter().any(|n: &VisibleNode| &n.path == *path))
            .cloned();

        VisibleNodes {
            nodes,
            focused_node,
            expanded_nodes: self.expanded.clone(),
            search_key: self.query.as_ref().map(|q| q.key().to_string()),
            revision: self.revision,
        }
    }

    /// Depth-first listing of root's children, descending into every
    /// expanded folder whose contents are loaded
    fn flatten(&self) -> Vec<VisibleNode> {
        let mut out = Vec::new();
        let mut stack: Vec<(Arc<_>, usize)> = self
            .arena
            .children("")
            .into_iter()
            .rev()
            .map(|node| (node, 0))
            .collect();

        while let Some((node, depth)) = stack.pop() {
            if node.is_folder() && self.expanded.contains(&node.path) {
                stack.extend(
                    self.arena
                        .children(&node.path)
                        .into_iter()
                        .rev()
                        .map(|child| (child, depth + 1)),
                );
            }
            out.push(VisibleNode { node, depth });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::RemoteNode;

    fn state() -> GeneratorState {
        let arena = TreeArena::from_root(RemoteNode::tree(
            "",
            vec![
                RemoteNode::tree(
                    "dir1",
                    vec![
                        RemoteNode::tree("dir1/sub", vec![RemoteNode::blob("dir1/sub/a")]),
                        RemoteNode::blob("dir1/b"),
                    ],
                ),
                RemoteNode::unloaded_tree("dir2"),
                RemoteNode::blob("c"),
            ],
        ))
        .unwrap();
        GeneratorState::new(arena)
    }

    #[test]
    fn test_initial_listing_is_root_children() {
        let state = state();
        assert_eq!(state.current.paths(), vec!["dir1", "dir2", "c"]);
        assert_eq!(state.current.revision, 0);
    }

    #[test]
    fn test_flatten_follows_expansion() {
        let mut state = state();
        state.expanded.insert("dir1".into());
        state.expanded.insert("dir1/sub".into());
        // Expanded but unloaded folders show no children
        state.expanded.insert("dir2".into());

        let snapshot = state.publish();
        assert_eq!(
            snapshot.paths(),
            vec!["dir1", "dir1/sub", "dir1/sub/a", "dir1/b", "dir2", "c"]
        );
        let depths: Vec<_> = snapshot.nodes.iter().map(|n| n.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 1, 0, 0]);
        assert_eq!(snapshot.revision, 1);
    }

    #[test]
    fn test_collapsed_ancestor_hides_expanded_descendant() {
        let mut state = state();
        state.expanded.insert("dir1/sub".into());
        assert_eq!(state.publish().paths(), vec!["dir1", "dir2", "c"]);
    }

    #[test]
    fn test_collapse_clears_descendants() {
        let mut state = state();
        state.expanded.insert("dir1".into());
        state.expanded.insert("dir1/sub".into());

        assert!(state.collapse("dir1"));
        assert!(state.expanded.is_empty());
        assert!(!state.collapse("dir1"));
        assert!(!state.collapse(""));
    }

    #[test]
    fn test_focus_dropped_when_not_visible() {
        let mut state = state();
        state.expanded.insert("dir1".into());
        state.focused = Some("dir1/b".into());
        assert_eq!(state.publish().focused_node.as_deref(), Some("dir1/b"));

        state.collapse("dir1");
        let snapshot = state.publish();
        assert_eq!(snapshot.focused_node, None);
        assert_eq!(state.focused, None);
    }

    #[test]
    fn test_search_mode_is_flat() {
        let mut state = state();
        state.query = SearchQuery::new("a");
        let snapshot = state.publish();

        assert_eq!(snapshot.paths(), vec!["dir1/sub/a"]);
        assert!(snapshot.nodes.iter().all(|n| n.depth == 0));
        assert_eq!(snapshot.search_key.as_deref(), Some("a"));
    }

    #[test]
    fn test_intents() {
        let mut state = state();
        let first = state.begin_intent("dir1");
        assert!(state.intent_is_current("dir1", first));
        let second = state.begin_intent("dir1");
        assert!(!state.intent_is_current("dir1", first));
        assert!(state.intent_is_current("dir1", second));
    }

    #[test]
    fn test_ancestor_collapse_after_operation_start() {
        let mut state = state();
        state.begin_collapse("dir1");
        let operation = state.operation_start();
        assert!(!state.ancestor_collapsed_since("dir1/sub/a", operation));

        state.begin_intent("dir1/sub");
        assert!(!state.ancestor_collapsed_since("dir1/sub/a", operation));

        state.begin_collapse("dir1");
        assert!(state.ancestor_collapsed_since("dir1/sub/a", operation));
        assert!(state.ancestor_collapsed_since("dir1/sub", operation));
        assert!(!state.ancestor_collapsed_since("dir1", operation));
        assert!(!state.ancestor_collapsed_since("dir2", operation));
    }
}
