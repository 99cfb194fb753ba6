use super::node::{is_descendant_of, NodeKind, TreeNode};
use crate::error::LoadError;
use crate::loader::RemoteNode;
use crate::tree::node::NodeType;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Path-keyed store of every node the session has seen
///
/// The arena starts from whatever the root fetch delivered. Folder levels
/// are merged in with [`commit_level`](Self::commit_level) as they load.
/// Records are `Arc`s so snapshots can hold them after the arena moves on;
/// a record is only copied when it actually changes.
#[derive(Debug, Clone)]
pub struct TreeArena {
    /// All nodes indexed by path (root is `""`)
    nodes: HashMap<String, Arc<TreeNode>>,
}

impl TreeArena {
    /// Build the arena from the root fetch
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Malformed`] if the root is not a folder.
    pub fn from_root(root: RemoteNode) -> Result<Self, LoadError> {
        if root.node_type != NodeType::Tree {
            return Err(LoadError::Malformed(format!(
                "root must be a tree, got {}",
                root.node_type
            )));
        }

        let mut arena = Self {
            nodes: HashMap::new(),
        };
        let root_node = TreeNode {
            path: String::new(),
            name: root.name.clone(),
            kind: NodeKind::Tree { contents: None },
            url: root.url.clone(),
            sha: root.sha.clone(),
        };
        arena.nodes.insert(String::new(), Arc::new(root_node));

        if let Some(children) = root.contents {
            let mut removed = Vec::new();
            let paths = arena.merge_level("", children, &mut removed);
            arena.set_contents("", paths);
        }

        Ok(arena)
    }

    /// Get the root node
    pub fn root(&self) -> Arc<TreeNode> {
        // The root entry is inserted in `from_root` and never removed
        self.nodes
            .get("")
            .cloned()
            .unwrap_or_else(|| Arc::new(TreeNode::folder("", "")))
    }

    /// Get a node by path
    pub fn get(&self, path: &str) -> Option<&Arc<TreeNode>> {
        self.nodes.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    /// Get number of nodes currently in memory (root included)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Loaded children of a folder, in data-source order
    pub fn children(&self, path: &str) -> Vec<Arc<TreeNode>> {
        self.nodes
            .get(path)
            .and_then(|node| node.contents())
            .map(|contents| {
                contents
                    .iter()
                    .filter_map(|child| self.nodes.get(child).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace the contents of `folder` with a freshly loaded level
    ///
    /// Children that are still present keep their records (and whatever
    /// they had loaded below them); vanished children are dropped along
    /// with their descendants. Returns the removed paths.
    ///
    /// # Errors
    ///
    /// Returns an error if `folder` is unknown, is not a folder, or the
    /// loaded node carries no contents.
    pub fn commit_level(
        &mut self,
        folder: &str,
        loaded: RemoteNode,
    ) -> Result<Vec<String>, LoadError> {
        let node = self
            .nodes
            .get(folder)
            .ok_or_else(|| LoadError::NotFound(folder.to_string()))?;
        if !node.is_folder() {
            return Err(LoadError::Malformed(format!("`{folder}` is not a folder")));
        }
        let Some(children) = loaded.contents else {
            return Err(LoadError::Malformed(format!(
                "no contents returned for `{folder}`"
            )));
        };

        let mut removed = Vec::new();
        let paths = self.merge_level(folder, children, &mut removed);
        self.set_contents(folder, paths);
        Ok(removed)
    }

    /// Pre-order walk over every loaded node below `from` (exclusive)
    pub fn walk_loaded(&self, from: &str, mut visit: impl FnMut(&Arc<TreeNode>)) {
        let mut stack: Vec<&str> = Vec::new();
        if let Some(contents) = self.nodes.get(from).and_then(|n| n.contents()) {
            stack.extend(contents.iter().rev().map(String::as_str));
        }

        while let Some(path) = stack.pop() {
            let Some(node) = self.nodes.get(path) else {
                continue;
            };
            visit(node);
            if let Some(contents) = node.contents() {
                stack.extend(contents.iter().rev().map(String::as_str));
            }
        }
    }

    /// Get the ancestor chain for a path (from root to the path itself)
    pub fn ancestors(&self, path: &str) -> Vec<String> {
        let mut chain = vec![String::new()];
        if path.is_empty() {
            return chain;
        }
        let mut prefix = String::new();
        for segment in path.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            chain.push(prefix.clone());
        }
        chain
    }

    fn set_contents(&mut self, folder: &str, paths: Vec<String>) {
        if let Some(node) = self.nodes.get_mut(folder) {
            if node.contents() != Some(paths.as_slice()) {
                Arc::make_mut(node).kind = NodeKind::Tree {
                    contents: Some(paths),
                };
            }
        }
    }

    /// Merge one level of remote children under `folder`, returning the
    /// child paths in order. Nested contents are merged recursively.
    fn merge_level(
        &mut self,
        folder: &str,
        children: Vec<RemoteNode>,
        removed: &mut Vec<String>,
    ) -> Vec<String> {
        let previous: Vec<String> = self
            .nodes
            .get(folder)
            .and_then(|node| node.contents())
            .map(<[String]>::to_vec)
            .unwrap_or_default();

        let mut seen = HashSet::with_capacity(children.len());
        let mut paths = Vec::with_capacity(children.len());
        for child in children {
            let path = child.resolved_path(folder);
            if !is_descendant_of(&path, folder) || !seen.insert(path.clone()) {
                tracing::warn!("Skipping unexpected entry {:?} under {:?}", path, folder);
                continue;
            }
            self.merge_node(path.clone(), child, removed);
            paths.push(path);
        }

        for old in previous {
            if !seen.contains(&old) {
                self.remove_subtree(&old, removed);
            }
        }

        paths
    }

    fn merge_node(&mut self, path: String, remote: RemoteNode, removed: &mut Vec<String>) {
        let same_type = self
            .nodes
            .get(&path)
            .map(|existing| existing.node_type() == remote.node_type);
        if same_type == Some(false) {
            self.remove_subtree(&path, removed);
        }

        let RemoteNode {
            name,
            node_type,
            url,
            sha,
            contents,
            ..
        } = remote;
        let contents = contents.map(|children| self.merge_level(&path, children, removed));

        match self.nodes.get_mut(&path) {
            Some(existing) if same_type == Some(true) => {
                let changed = existing.name != name
                    || existing.url != url
                    || existing.sha != sha
                    || (contents.is_some() && existing.contents() != contents.as_deref());
                if changed {
                    let node = Arc::make_mut(existing);
                    node.name = name;
                    node.url = url;
                    node.sha = sha;
                    if let Some(contents) = contents {
                        node.kind = NodeKind::Tree {
                            contents: Some(contents),
                        };
                    }
                }
            }
            _ => {
                let kind = match node_type {
                    NodeType::Tree => NodeKind::Tree { contents },
                    NodeType::Blob => NodeKind::Blob,
                    NodeType::Commit => NodeKind::Commit,
                };
                let node = TreeNode {
                    path: path.clone(),
                    name,
                    kind,
                    url,
                    sha,
                };
                self.nodes.insert(path, Arc::new(node));
            }
        }
    }

    /// Remove a node and all its descendants
    fn remove_subtree(&mut self, path: &str, removed: &mut Vec<String>) {
        if let Some(node) = self.nodes.remove(path) {
            if let Some(contents) = node.contents() {
                for child in contents {
                    self.remove_subtree(child, removed);
                }
            }
            removed.push(path.to_string());
        }
    }
}
