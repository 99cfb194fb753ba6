// Data-source abstraction for lazily loading repository tree levels
//
// The engine never talks to a remote host directly. A `TreeDataSource`
// answers "what is inside this folder", and the `LazyLoader` sits between
// the generator and that source.

pub mod manager;
pub mod memory;
pub mod slow;

pub use manager::LazyLoader;
pub use memory::{InMemorySource, LoadGate};
pub use slow::{SlowSource, SlowSourceConfig, SourceMetrics};

use crate::error::LoadError;
use crate::tree::node::{join_path, NodeType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identifies the repository and revision a session browses
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepoContext {
    pub user_name: String,
    pub repo_name: String,
    pub branch_name: String,
}

impl RepoContext {
    pub fn new(
        user_name: impl Into<String>,
        repo_name: impl Into<String>,
        branch_name: impl Into<String>,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            repo_name: repo_name.into(),
            branch_name: branch_name.into(),
        }
    }
}

/// A node as delivered by the data source
///
/// `contents` may already be populated several levels deep (a host that can
/// return the whole tree in one request does so on the root fetch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    #[serde(default)]
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<Vec<RemoteNode>>,
}

impl RemoteNode {
    /// A folder whose contents are already known
    pub fn tree(path: impl Into<String>, contents: Vec<RemoteNode>) -> Self {
        let path = path.into();
        Self {
            name: last_segment(&path).to_string(),
            path,
            node_type: NodeType::Tree,
            url: None,
            sha: None,
            contents: Some(contents),
        }
    }

    /// A folder whose contents must be fetched later
    pub fn unloaded_tree(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: last_segment(&path).to_string(),
            path,
            node_type: NodeType::Tree,
            url: None,
            sha: None,
            contents: None,
        }
    }

    pub fn blob(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: last_segment(&path).to_string(),
            path,
            node_type: NodeType::Blob,
            url: None,
            sha: None,
            contents: None,
        }
    }

    pub fn commit(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: last_segment(&path).to_string(),
            path,
            node_type: NodeType::Commit,
            url: None,
            sha: None,
            contents: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Path of this node, falling back to `parent/name` when the source
    /// left it empty. Leading and trailing slashes are stripped.
    pub fn resolved_path(&self, parent: &str) -> String {
        let trimmed = self.path.trim_matches('/');
        if trimmed.is_empty() {
            join_path(parent, &self.name)
        } else {
            trimmed.to_string()
        }
    }
}

fn last_segment(path: &str) -> &str {
    path.trim_matches('/').rsplit('/').next().unwrap_or_default()
}

/// Result of one data-source request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeData {
    /// The requested folder; for the root fetch, the whole top-level node
    pub root: RemoteNode,
    /// The host could not return the full tree and expects lazy loading
    pub defer: bool,
}

/// Remote provider of tree levels
#[async_trait]
pub trait TreeDataSource: Send + Sync {
    /// Fetch the folder at `path` with its immediate children populated.
    ///
    /// `is_root_fetch` is set for the first request of a session, which may
    /// return more than one level.
    async fn get_tree_data(
        &self,
        context: &RepoContext,
        path: &str,
        is_root_fetch: bool,
        access_token: Option<&str>,
    ) -> Result<TreeData, LoadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_node_from_json() {
        let json = r#"{
            "path": "src",
            "name": "src",
            "type": "tree",
            "contents": [
                { "path": "src/lib.rs", "name": "lib.rs", "type": "blob", "url": "/blob/src/lib.rs" },
                { "path": "src/vendor", "name": "vendor", "type": "commit" }
            ]
        }"#;

        let node: RemoteNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.node_type, NodeType::Tree);
        let contents = node.contents.unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].url.as_deref(), Some("/blob/src/lib.rs"));
        assert_eq!(contents[1].node_type, NodeType::Commit);
        assert_eq!(contents[1].contents, None);
    }

    #[test]
    fn test_resolved_path() {
        let mut node = RemoteNode::blob("/docs/readme.md/");
        assert_eq!(node.resolved_path("ignored"), "docs/readme.md");
        assert_eq!(node.name, "readme.md");

        node.path = String::new();
        assert_eq!(node.resolved_path("docs"), "docs/readme.md");
        assert_eq!(node.resolved_path(""), "readme.md");
    }
}
