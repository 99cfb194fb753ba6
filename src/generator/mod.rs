//! Visible-node generator
//!
//! Owns the tree of one session together with its expansion, focus and
//! search state, and publishes a fresh [`VisibleNodes`] snapshot after
//! every change. Folder contents are fetched through the [`LazyLoader`]
//! the first time a folder is expanded.
//!
//! The generator is cheap to clone; clones share state. The state lock is
//! only held between awaits. Every awaited load is re-validated before it
//! is committed:
//! - if the session epoch moved on, nothing is committed;
//! - if a newer expand/collapse request for the same folder arrived, or an
//!   ancestor was collapsed since the operation began, the loaded contents
//!   are kept but the expansion is not applied and the walk stops there.

pub mod notify;
pub mod snapshot;
mod state;

pub use notify::{Subscription, UpdateCallback};
pub use snapshot::{VisibleNode, VisibleNodes};

use crate::error::TreeError;
use crate::loader::{LazyLoader, RemoteNode};
use crate::session::EpochTicket;
use crate::sync::lock;
use crate::tree::{TreeArena, TreeNode};
use futures::future::join_all;
use notify::UpdateDispatcher;
use state::GeneratorState;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Behaviour switches for a generator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Expanding a folder whose only child is a folder keeps expanding
    /// down the chain
    pub compress_singleton_folder: bool,
}

/// Outcome of one awaited expansion step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Done,
    /// Contents were committed but a newer request overrode the expansion
    Superseded,
    /// The session moved on while loading; nothing was committed
    Stale,
}

struct Inner {
    state: Mutex<GeneratorState>,
    loader: LazyLoader,
    dispatcher: UpdateDispatcher,
    epoch: EpochTicket,
    options: GeneratorOptions,
}

/// Tree state and visible-list producer for one session
#[derive(Clone)]
pub struct VisibleNodesGenerator {
    inner: Arc<Inner>,
}

impl fmt::Debug for VisibleNodesGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("VisibleNodesGenerator")
            .field("nodes", &state.arena.len())
            .field("expanded", &state.expanded)
            .field("focused", &state.focused)
            .field("revision", &state.current.revision)
            .finish()
    }
}

impl VisibleNodesGenerator {
    /// Create a generator from the root fetch
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::LoadFailure`] if `root` is not a folder.
    pub fn new(
        root: RemoteNode,
        loader: LazyLoader,
        options: GeneratorOptions,
        epoch: EpochTicket,
    ) -> Result<Self, TreeError> {
        let arena = TreeArena::from_root(root).map_err(|e| TreeError::load_failure("", e))?;
        tracing::debug!("Generator created with {} nodes", arena.len());
        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(GeneratorState::new(arena)),
                loader,
                dispatcher: UpdateDispatcher::default(),
                epoch,
                options,
            }),
        })
    }

    pub fn options(&self) -> GeneratorOptions {
        self.inner.options
    }

    /// Whether this generator's session is still the live one
    pub fn is_current(&self) -> bool {
        self.inner.epoch.is_current()
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    /// Last published snapshot
    pub fn visible_nodes(&self) -> Arc<VisibleNodes> {
        Arc::clone(&lock(&self.inner.state).current)
    }

    pub fn node(&self, path: &str) -> Option<Arc<TreeNode>> {
        lock(&self.inner.state).arena.get(path).cloned()
    }

    pub fn root(&self) -> Arc<TreeNode> {
        lock(&self.inner.state).arena.root()
    }

    /// Loaded children of a folder
    pub fn children(&self, path: &str) -> Vec<Arc<TreeNode>> {
        lock(&self.inner.state).arena.children(path)
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        lock(&self.inner.state).expanded.contains(path)
    }

    pub fn is_loaded(&self, path: &str) -> bool {
        lock(&self.inner.state)
            .arena
            .get(path)
            .is_some_and(|n| n.is_loaded())
    }

    /// Number of nodes known to the session (root included)
    pub fn node_count(&self) -> usize {
        lock(&self.inner.state).arena.len()
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Call `callback` with every snapshot published from now on
    pub fn on_update(
        &self,
        callback: impl Fn(&Arc<VisibleNodes>) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.dispatcher.subscribe(Arc::new(callback), false)
    }

    /// Call `callback` with the next published snapshot only
    pub fn on_next_update(
        &self,
        callback: impl Fn(&Arc<VisibleNodes>) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.dispatcher.subscribe(Arc::new(callback), true)
    }

    /// Stream of published snapshots
    ///
    /// The listener stays registered until the returned subscription is
    /// unsubscribed; sends to a dropped receiver are ignored.
    pub fn updates(&self) -> (mpsc::UnboundedReceiver<Arc<VisibleNodes>>, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.on_update(move |snapshot| {
            let _ = tx.send(Arc::clone(snapshot));
        });
        (rx, subscription)
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    /// Flip a folder between expanded and collapsed
    pub async fn toggle_expand(&self, path: &str, recursive: bool) -> Result<(), TreeError> {
        let expand = !self.is_expanded(path);
        self.set_expand(path, expand, recursive).await
    }

    /// Expand or collapse a folder
    ///
    /// Files and submodule links are ignored. Expanding loads the folder
    /// first if needed; with `recursive`, every descendant folder is loaded
    /// and expanded too, and the call returns once all of them settled.
    /// Collapsing also forgets the expansion of every descendant.
    ///
    /// # Errors
    ///
    /// [`TreeError::NodeNotFound`] for an unknown path, or the first
    /// [`TreeError::LoadFailure`] hit while expanding.
    pub async fn set_expand(
        &self,
        path: &str,
        expand: bool,
        recursive: bool,
    ) -> Result<(), TreeError> {
        let node = self
            .node(path)
            .ok_or_else(|| TreeError::NodeNotFound(path.to_string()))?;
        if !node.is_folder() {
            tracing::trace!("Ignoring expand of non-folder {:?}", path);
            return Ok(());
        }

        if !expand {
            self.collapse(path);
            return Ok(());
        }

        let operation = self.begin_operation();
        if self.expand_one(path, operation).await? != Settled::Done {
            return Ok(());
        }

        if recursive {
            self.expand_descendants(path, operation).await
        } else if self.inner.options.compress_singleton_folder {
            self.expand_singleton_chain(path, operation).await
        } else {
            Ok(())
        }
    }

    /// Expand every root-level folder recursively
    pub async fn expand_all(&self) -> Result<(), TreeError> {
        let folders = self.child_folders("");
        let results = join_all(folders.iter().map(|p| self.set_expand(p, true, true))).await;
        results.into_iter().collect()
    }

    /// Set or clear the search key
    ///
    /// An empty key clears it. Always publishes, even if the key is unchanged.
    pub fn search(&self, key: Option<&str>) {
        self.commit(|state| {
            state.query = key.and_then(crate::search::SearchQuery::new);
            true
        });
    }

    /// Move focus to a visible node, or clear it
    ///
    /// # Errors
    ///
    /// [`TreeError::NodeNotVisible`] if `path` is not in the current list.
    pub fn focus_node(&self, path: Option<&str>) -> Result<(), TreeError> {
        self.try_commit(|state| match path {
            None => Ok(state.focused.take().is_some()),
            Some(path) => {
                if !state.current.contains(path) {
                    return Err(TreeError::NodeNotVisible(path.to_string()));
                }
                let changed = state.focused.as_deref() != Some(path);
                state.focused = Some(path.to_string());
                Ok(changed)
            }
        })
    }

    /// Make `path` reachable by expanding each of its ancestors
    ///
    /// Walks the path from the root, loading folders as it goes. The target
    /// itself is not expanded. Returns `None` if a segment does not exist,
    /// a load fails, or the session moved on; ancestors already expanded
    /// up to that point stay expanded.
    pub async fn expand_to(&self, path: &str) -> Option<Arc<TreeNode>> {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return None;
        }

        let (chain, operation) = {
            let state = lock(&self.inner.state);
            (state.arena.ancestors(path), state.operation_start())
        };
        let (target, ancestors) = chain.split_last()?;

        for folder in ancestors {
            if !self.node(folder).is_some_and(|n| n.is_folder()) {
                tracing::debug!("expand_to({:?}): {:?} is not a folder", path, folder);
                return None;
            }
            match self.expand_one(folder, operation).await {
                Ok(Settled::Done) => {}
                Ok(Settled::Superseded) => {
                    tracing::debug!("expand_to({:?}) superseded at {:?}", path, folder);
                    return None;
                }
                Ok(Settled::Stale) => return None,
                Err(e) => {
                    tracing::debug!("expand_to({:?}) stopped: {}", path, e);
                    return None;
                }
            }
        }

        let found = self.node(target);
        if found.is_none() {
            tracing::debug!("expand_to({:?}): no such node", path);
        }
        found
    }

    /// Re-fetch a folder and replace its contents
    ///
    /// Children that still exist keep their state; vanished ones are dropped
    /// along with their expansion and focus.
    pub async fn refresh(&self, path: &str) -> Result<(), TreeError> {
        let node = self
            .node(path)
            .ok_or_else(|| TreeError::NodeNotFound(path.to_string()))?;
        if !node.is_folder() {
            return Ok(());
        }

        let loaded = self.inner.loader.load(path).await;
        if !self.is_current() {
            tracing::debug!("Dropping stale refresh of {:?}", path);
            return Ok(());
        }
        let loaded = loaded.map_err(|e| TreeError::load_failure(path, e))?;

        self.try_commit(|state| {
            let removed = state
                .arena
                .commit_level(path, loaded)
                .map_err(|e| TreeError::load_failure(path, e))?;
            if !removed.is_empty() {
                tracing::debug!("Refresh of {:?} removed {} nodes", path, removed.len());
                state.prune();
            }
            Ok(true)
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn collapse(&self, path: &str) {
        self.commit(|state| state.begin_collapse(path));
    }

    fn begin_operation(&self) -> u64 {
        lock(&self.inner.state).operation_start()
    }

    /// Load `path` if needed and mark it expanded, unless a newer request
    /// for the same folder arrived or an ancestor was collapsed after
    /// `operation` began
    async fn expand_one(&self, path: &str, operation: u64) -> Result<Settled, TreeError> {
        let (intent, needs_load) = {
            let mut state = lock(&self.inner.state);
            let node = state
                .arena
                .get(path)
                .ok_or_else(|| TreeError::NodeNotFound(path.to_string()))?;
            let needs_load = !node.is_loaded();
            (state.begin_intent(path), needs_load)
        };

        let loaded = if needs_load {
            let result = self.inner.loader.load(path).await;
            if !self.is_current() {
                tracing::debug!("Dropping stale load of {:?}", path);
                return Ok(Settled::Stale);
            }
            Some(result.map_err(|e| TreeError::load_failure(path, e))?)
        } else {
            None
        };

        let mut settled = Settled::Done;
        self.try_commit(|state| {
            let mut changed = false;
            if let Some(level) = loaded {
                let removed = state
                    .arena
                    .commit_level(path, level)
                    .map_err(|e| TreeError::load_failure(path, e))?;
                if !removed.is_empty() {
                    state.prune();
                }
                changed = true;
            }

            if path.is_empty() {
                return Ok(changed);
            }
            if state.intent_is_current(path, intent)
                && !state.ancestor_collapsed_since(path, operation)
            {
                changed |= state.expanded.insert(path.to_string());
            } else {
                tracing::trace!("Expansion of {:?} superseded", path);
                settled = Settled::Superseded;
            }
            Ok(changed)
        })?;

        Ok(settled)
    }

    /// Expand every folder below `path`, one level at a time with the
    /// loads of a level running concurrently
    async fn expand_descendants(&self, path: &str, operation: u64) -> Result<(), TreeError> {
        let mut first_error = None;
        let mut frontier = self.child_folders(path);

        while !frontier.is_empty() {
            let results =
                join_all(frontier.iter().map(|p| self.expand_one(p, operation))).await;
            let mut next = Vec::new();
            for (folder, result) in frontier.iter().zip(results) {
                match result {
                    Ok(Settled::Done) => next.extend(self.child_folders(folder)),
                    Ok(Settled::Superseded) => {}
                    Ok(Settled::Stale) => return Ok(()),
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }
            frontier = next;
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn expand_singleton_chain(&self, path: &str, operation: u64) -> Result<(), TreeError> {
        let mut current = path.to_string();
        loop {
            let children = self.children(&current);
            let [only] = children.as_slice() else {
                return Ok(());
            };
            if !only.is_folder() {
                return Ok(());
            }
            if self.expand_one(&only.path, operation).await? != Settled::Done {
                return Ok(());
            }
            current = only.path.clone();
        }
    }

    fn child_folders(&self, path: &str) -> Vec<String> {
        self.children(path)
            .into_iter()
            .filter(|n| n.is_folder())
            .map(|n| n.path.clone())
            .collect()
    }

    /// Apply `mutate`; if it reports a change, publish a new snapshot
    fn commit(&self, mutate: impl FnOnce(&mut GeneratorState) -> bool) {
        // Infallible closures cannot produce an error here
        let _ = self.try_commit(|state| Ok::<_, TreeError>(mutate(state)));
    }

    fn try_commit<E>(
        &self,
        mutate: impl FnOnce(&mut GeneratorState) -> Result<bool, E>,
    ) -> Result<(), E> {
        {
            let mut state = lock(&self.inner.state);
            if !mutate(&mut state)? {
                return Ok(());
            }
            let snapshot = state.publish();
            tracing::trace!(
                "Publishing revision {} ({} rows)",
                snapshot.revision,
                snapshot.len()
            );
            self.inner.dispatcher.enqueue(snapshot);
        }
        self.inner.dispatcher.drain();
        Ok(())
    }
}
