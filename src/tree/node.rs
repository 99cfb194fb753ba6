use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of entry reported by the repository host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Folder
    Tree,
    /// File
    Blob,
    /// Submodule link
    Commit,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeType::Tree => "tree",
            NodeType::Blob => "blob",
            NodeType::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Type-specific part of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Folder. `contents` holds child paths in data-source order, `None`
    /// until the level has been loaded.
    Tree { contents: Option<Vec<String>> },
    /// File
    Blob,
    /// Submodule link
    Commit,
}

/// A node in the repository tree
///
/// Nodes are stored in a [`TreeArena`](super::TreeArena) keyed by `path`;
/// children are referenced by path, never by pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Full `/`-separated path; the root uses the empty string
    pub path: String,
    /// Last path segment
    pub name: String,
    /// Folder/file/submodule specific data
    pub kind: NodeKind,
    /// Navigation target on the host, if any
    pub url: Option<String>,
    /// Object id reported by the host
    pub sha: Option<String>,
}

impl TreeNode {
    /// Create an unloaded folder node
    pub fn folder(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            kind: NodeKind::Tree { contents: None },
            url: None,
            sha: None,
        }
    }

    /// Create a file node
    pub fn file(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            kind: NodeKind::Blob,
            url: None,
            sha: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Tree { .. } => NodeType::Tree,
            NodeKind::Blob => NodeType::Blob,
            NodeKind::Commit => NodeType::Commit,
        }
    }

    /// Check if this node is a folder
    pub fn is_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Tree { .. })
    }

    /// Check if this node is a file
    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::Blob)
    }

    /// Check if this node is a submodule link
    pub fn is_submodule(&self) -> bool {
        matches!(self.kind, NodeKind::Commit)
    }

    /// Check if this is the root node
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Whether this folder's immediate children are known.
    /// Always false for files and submodules.
    pub fn is_loaded(&self) -> bool {
        matches!(self.kind, NodeKind::Tree { contents: Some(_) })
    }

    /// Child paths, if this is a loaded folder
    pub fn contents(&self) -> Option<&[String]> {
        match &self.kind {
            NodeKind::Tree {
                contents: Some(contents),
            } => Some(contents),
            _ => None,
        }
    }

    /// Whether `path` is one of this folder's loaded children
    pub fn contains(&self, path: &str) -> bool {
        self.contents()
            .is_some_and(|contents| contents.iter().any(|child| child == path))
    }

    /// Depth in the tree: root is 0, root-level entries are 1
    pub fn depth(&self) -> usize {
        depth_of(&self.path)
    }

    /// Path of the parent folder (`""` for root-level entries, `None` for root)
    pub fn parent_path(&self) -> Option<&str> {
        parent_path(&self.path)
    }
}

/// Depth of a path: `""` is 0, `a` is 1, `a/b` is 2
pub fn depth_of(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.split('/').count()
    }
}

/// Parent of a path, `None` for root
pub fn parent_path(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rfind('/').map_or("", |idx| &path[..idx]))
}

/// Whether `path` lies strictly below `ancestor`
pub fn is_descendant_of(path: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return !path.is_empty();
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Join a parent path with a child segment
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_node() {
        let node = TreeNode::file("src/main.rs", "main.rs");

        assert!(node.is_file());
        assert!(!node.is_folder());
        assert!(!node.is_loaded());
        assert_eq!(node.contents(), None);
        assert_eq!(node.node_type(), NodeType::Blob);
    }

    #[test]
    fn test_folder_node_states() {
        let mut node = TreeNode::folder("src", "src");
        assert!(node.is_folder());
        assert!(!node.is_loaded());

        node.kind = NodeKind::Tree {
            contents: Some(vec!["src/lib.rs".to_string()]),
        };
        assert!(node.is_loaded());
        assert!(node.contains("src/lib.rs"));
        assert!(!node.contains("src/main.rs"));
    }

    #[test]
    fn test_node_depth() {
        assert_eq!(TreeNode::folder("", "").depth(), 0);
        assert_eq!(TreeNode::folder("dir1", "dir1").depth(), 1);
        assert_eq!(TreeNode::folder("dir1/dir2", "dir2").depth(), 2);
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(parent_path(""), None);
        assert_eq!(parent_path("a"), Some(""));
        assert_eq!(parent_path("a/b/c"), Some("a/b"));

        assert!(is_descendant_of("a/b", "a"));
        assert!(is_descendant_of("a", ""));
        assert!(!is_descendant_of("ab", "a"));
        assert!(!is_descendant_of("a", "a"));

        assert_eq!(join_path("", "a"), "a");
        assert_eq!(join_path("a", "b"), "a/b");
    }

    #[test]
    fn test_node_type_serde() {
        let ty: NodeType = serde_json::from_str("\"commit\"").unwrap();
        assert_eq!(ty, NodeType::Commit);
        assert_eq!(NodeType::Tree.to_string(), "tree");
    }
}
