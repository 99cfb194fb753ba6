use super::{RemoteNode, RepoContext, TreeData, TreeDataSource};
use crate::error::LoadError;
use crate::sync::lock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

type LoadResult = Result<RemoteNode, LoadError>;

/// Type alias for pending level requests map
type PendingLoads = Arc<Mutex<HashMap<String, Vec<oneshot::Sender<LoadResult>>>>>;

/// Loads tree levels on demand with request de-duplication
///
/// The LazyLoader sits between the generator and the data source,
/// providing:
/// - Request de-duplication (concurrent loads of the same folder share
///   one remote call)
/// - The session's repository context and access token
/// - Validation of what the source returned
pub struct LazyLoader {
    source: Arc<dyn TreeDataSource>,
    context: RepoContext,
    access_token: Option<String>,
    /// Map of path -> channels waiting for the in-flight request
    pending: PendingLoads,
}

impl fmt::Debug for LazyLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyLoader")
            .field("source", &"<dyn TreeDataSource>")
            .field("context", &self.context)
            .field("pending", &"<mutex>")
            .finish()
    }
}

impl LazyLoader {
    pub fn new(
        source: Arc<dyn TreeDataSource>,
        context: RepoContext,
        access_token: Option<String>,
    ) -> Self {
        Self {
            source,
            context,
            access_token,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn context(&self) -> &RepoContext {
        &self.context
    }

    /// First request of a session; may deliver more than one level
    pub async fn fetch_root(&self) -> Result<TreeData, LoadError> {
        tracing::debug!(
            "Fetching root tree for {}/{}@{}",
            self.context.user_name,
            self.context.repo_name,
            self.context.branch_name
        );
        self.source
            .get_tree_data(&self.context, "/", true, self.access_token.as_deref())
            .await
    }

    /// Load one folder level
    ///
    /// If several loads of the same folder overlap, only one remote call is
    /// made and every caller receives a copy of its result.
    pub async fn load(&self, path: &str) -> LoadResult {
        let waiter = {
            let mut pending = lock(&self.pending);
            match pending.get_mut(path) {
                Some(senders) => {
                    // There's already a request in progress, just add our channel
                    let (tx, rx) = oneshot::channel();
                    senders.push(tx);
                    Some(rx)
                }
                None => {
                    pending.insert(path.to_string(), Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            tracing::trace!("Joining in-flight load of {:?}", path);
            return rx.await.unwrap_or(Err(LoadError::Cancelled));
        }

        // Drops the waiters (they see `Cancelled`) if this future is dropped
        // before the source answers.
        let mut guard = PendingGuard {
            pending: &self.pending,
            path,
            armed: true,
        };

        let result = self
            .source
            .get_tree_data(&self.context, path, false, self.access_token.as_deref())
            .await
            .and_then(|data| validate_level(path, data.root));

        guard.armed = false;
        let senders = lock(&self.pending).remove(path).unwrap_or_default();
        for sender in senders {
            let _ = sender.send(result.clone());
        }

        match &result {
            Ok(node) => tracing::debug!(
                "Loaded {:?} ({} entries)",
                path,
                node.contents.as_ref().map_or(0, Vec::len)
            ),
            Err(e) => tracing::warn!("Failed to load {:?}: {}", path, e),
        }
        result
    }

    /// Number of distinct folders currently being fetched
    pub fn in_flight(&self) -> usize {
        lock(&self.pending).len()
    }
}

struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<String, Vec<oneshot::Sender<LoadResult>>>>,
    path: &'a str,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.pending).remove(self.path);
        }
    }
}

fn validate_level(path: &str, node: RemoteNode) -> LoadResult {
    if node.contents.is_none() {
        return Err(LoadError::Malformed(format!(
            "no contents returned for {path:?}"
        )));
    }
    Ok(node)
}
