//! In-memory data source
//!
//! Serves a fixed repository tree, one level per request, the way a remote
//! host would. Used by the developer binary and throughout the tests, so it
//! also supports injected failures, gates that hold a folder's load until
//! released, and a call log.

use super::{RemoteNode, RepoContext, TreeData, TreeDataSource};
use crate::error::LoadError;
use crate::sync::lock;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Holds every load of one path until [`release`](Self::release) is called
#[derive(Debug, Clone)]
pub struct LoadGate {
    open: Arc<watch::Sender<bool>>,
}

impl LoadGate {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { open: Arc::new(tx) }
    }

    /// Let all current and future loads of the gated path through
    pub fn release(&self) {
        self.open.send_replace(true);
    }

    async fn wait(&self) {
        let mut rx = self.open.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting
        let _ = rx.wait_for(|open| *open).await;
    }
}

#[derive(Debug, Default)]
struct SourceState {
    failures: HashMap<String, LoadError>,
    gates: HashMap<String, LoadGate>,
    calls: Vec<(String, bool)>,
}

/// Data source backed by a nested [`RemoteNode`] fixture
#[derive(Debug)]
pub struct InMemorySource {
    root: RemoteNode,
    defer: bool,
    state: Mutex<SourceState>,
}

impl InMemorySource {
    /// Serve `root`. Every folder in the fixture must carry `contents`.
    pub fn new(root: RemoteNode) -> Self {
        Self {
            root,
            defer: false,
            state: Mutex::new(SourceState::default()),
        }
    }

    /// Parse a fixture from JSON (the same shape a host returns)
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let root: RemoteNode =
            serde_json::from_str(json).map_err(|e| LoadError::Malformed(e.to_string()))?;
        Ok(Self::new(root))
    }

    /// With `defer`, the root fetch returns a single level and every folder
    /// has to be loaded lazily; without it the whole tree comes back at once.
    pub fn with_defer(mut self, defer: bool) -> Self {
        self.defer = defer;
        self
    }

    /// Make every load of `path` fail with `error` until [`recover`](Self::recover)
    pub fn fail(&self, path: &str, error: LoadError) {
        lock(&self.state)
            .failures
            .insert(normalize(path).to_string(), error);
    }

    pub fn recover(&self, path: &str) {
        lock(&self.state).failures.remove(normalize(path));
    }

    /// Hold loads of `path` until the returned gate is released
    pub fn hold(&self, path: &str) -> LoadGate {
        let gate = LoadGate::new();
        lock(&self.state)
            .gates
            .insert(normalize(path).to_string(), gate.clone());
        gate
    }

    /// Every request so far as `(path, is_root_fetch)`
    pub fn calls(&self) -> Vec<(String, bool)> {
        lock(&self.state).calls.clone()
    }

    /// Number of requests for one folder
    pub fn calls_for(&self, path: &str) -> usize {
        let path = normalize(path);
        lock(&self.state)
            .calls
            .iter()
            .filter(|(p, _)| normalize(p) == path)
            .count()
    }

    fn find(&self, path: &str) -> Option<&RemoteNode> {
        let mut current = &self.root;
        if path.is_empty() {
            return Some(current);
        }
        let mut prefix = String::new();
        for segment in path.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            current = current
                .contents
                .as_ref()?
                .iter()
                .find(|child| child.resolved_path("") == prefix || child.name == segment)?;
        }
        Some(current)
    }
}

#[async_trait]
impl TreeDataSource for InMemorySource {
    async fn get_tree_data(
        &self,
        _context: &RepoContext,
        path: &str,
        is_root_fetch: bool,
        _access_token: Option<&str>,
    ) -> Result<TreeData, LoadError> {
        let path = normalize(path);
        let (gate, failure) = {
            let mut state = lock(&self.state);
            state.calls.push((path.to_string(), is_root_fetch));
            (state.gates.get(path).cloned(), state.failures.get(path).cloned())
        };

        if let Some(gate) = gate {
            gate.wait().await;
        }
        if let Some(error) = failure {
            return Err(error);
        }

        let node = self
            .find(path)
            .ok_or_else(|| LoadError::NotFound(path.to_string()))?;
        let root = if is_root_fetch && !self.defer {
            node.clone()
        } else {
            one_level(node)
        };

        Ok(TreeData {
            root,
            defer: is_root_fetch && self.defer,
        })
    }
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

/// Copy of `node` with its children present but their own contents stripped
fn one_level(node: &RemoteNode) -> RemoteNode {
    let mut level = node.clone();
    if let Some(contents) = level.contents.as_mut() {
        for child in contents {
            child.contents = None;
        }
    }
    level
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> RemoteNode {
        RemoteNode::tree(
            "",
            vec![
                RemoteNode::tree(
                    "dir1",
                    vec![RemoteNode::tree(
                        "dir1/subdir",
                        vec![RemoteNode::blob("dir1/subdir/file3.txt")],
                    )],
                ),
                RemoteNode::blob("file4.txt"),
            ],
        )
    }

    async fn fetch(source: &InMemorySource, path: &str, root: bool) -> Result<TreeData, LoadError> {
        source
            .get_tree_data(&RepoContext::default(), path, root, None)
            .await
    }

    #[tokio::test]
    async fn test_full_root_fetch() {
        let source = InMemorySource::new(fixture());
        let data = fetch(&source, "/", true).await.unwrap();

        assert!(!data.defer);
        let dir1 = &data.root.contents.as_ref().unwrap()[0];
        assert!(dir1.contents.is_some(), "nested levels delivered at once");
    }

    #[tokio::test]
    async fn test_deferred_root_fetch_is_one_level() {
        let source = InMemorySource::new(fixture()).with_defer(true);
        let data = fetch(&source, "/", true).await.unwrap();

        assert!(data.defer);
        let dir1 = &data.root.contents.as_ref().unwrap()[0];
        assert!(dir1.contents.is_none());
    }

    #[tokio::test]
    async fn test_nested_level() {
        let source = InMemorySource::new(fixture());
        let data = fetch(&source, "dir1/subdir", false).await.unwrap();

        assert_eq!(data.root.name, "subdir");
        assert_eq!(data.root.contents.unwrap()[0].name, "file3.txt");
        assert_eq!(source.calls_for("dir1/subdir"), 1);
    }

    #[tokio::test]
    async fn test_missing_path() {
        let source = InMemorySource::new(fixture());
        let err = fetch(&source, "nope", false).await.unwrap_err();
        assert_eq!(err, LoadError::NotFound("nope".to_string()));
    }

    #[tokio::test]
    async fn test_injected_failure_and_recovery() {
        let source = InMemorySource::new(fixture());
        source.fail("dir1", LoadError::rate_limited(None));

        assert!(fetch(&source, "dir1", false).await.is_err());
        source.recover("dir1");
        assert!(fetch(&source, "dir1", false).await.is_ok());
    }

    #[test]
    fn test_from_json() {
        let source = InMemorySource::from_json(
            r#"{"name": "", "type": "tree", "contents": [{"path": "a", "name": "a", "type": "blob"}]}"#,
        )
        .unwrap();
        assert!(source.find("a").is_some());
        assert!(InMemorySource::from_json("{").is_err());
    }
}
