//! Tree-load sessions
//!
//! A session covers one repository/branch. [`TreeSession::set_up`] performs
//! the root fetch, builds the generator and applies the initial expansion
//! policy. Tearing a session down advances its [`SessionEpoch`], after which
//! every load still in flight is dropped instead of committed.

use crate::config::SidebarConfig;
use crate::error::TreeError;
use crate::generator::VisibleNodesGenerator;
use crate::loader::{LazyLoader, RepoContext, TreeDataSource};
use crate::navigation::FileExplorer;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Session generation counter owned by the host
#[derive(Debug, Clone, Default)]
pub struct SessionEpoch {
    current: Arc<AtomicU64>,
}

impl SessionEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticket for work started now
    pub fn ticket(&self) -> EpochTicket {
        EpochTicket {
            epoch: self.current.load(Ordering::SeqCst),
            current: Arc::clone(&self.current),
        }
    }

    /// Invalidate every outstanding ticket; returns the new epoch
    pub fn advance(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

/// Proof that work belongs to a particular epoch
#[derive(Debug, Clone)]
pub struct EpochTicket {
    epoch: u64,
    current: Arc<AtomicU64>,
}

impl EpochTicket {
    /// A ticket no one can invalidate, for generators used outside a session
    pub fn detached() -> Self {
        SessionEpoch::new().ticket()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.epoch
    }
}

/// Host-page hints consulted once the tree is built
pub trait PlatformHints: Send + Sync {
    /// Expand every folder right away (e.g. a pull-request file list)
    fn should_expand_all(&self) -> bool {
        false
    }

    /// Path segments of the file or folder the host page currently shows
    fn current_path(&self, _branch_name: &str) -> Option<Vec<String>> {
        None
    }
}

/// Hints that never ask for anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHints;

impl PlatformHints for NoHints {}

/// Progress reported by [`TreeSession::set_up`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupPhase {
    /// Root fetch started
    TreeLoading,
    /// Root fetch done, generator being built
    TreeRendering,
    /// Initial expansion applied
    TreeRendered,
}

/// One repository/branch browsing session
pub struct TreeSession {
    source: Arc<dyn TreeDataSource>,
    hints: Arc<dyn PlatformHints>,
    context: RepoContext,
    config: SidebarConfig,
    epoch: SessionEpoch,
}

impl fmt::Debug for TreeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeSession")
            .field("context", &self.context)
            .field("config", &self.config)
            .field("epoch", &self.epoch.current())
            .finish()
    }
}

impl TreeSession {
    pub fn new(
        source: Arc<dyn TreeDataSource>,
        context: RepoContext,
        config: SidebarConfig,
    ) -> Self {
        Self {
            source,
            hints: Arc::new(NoHints),
            context,
            config,
            epoch: SessionEpoch::new(),
        }
    }

    pub fn with_hints(mut self, hints: Arc<dyn PlatformHints>) -> Self {
        self.hints = hints;
        self
    }

    /// Share an epoch the host already owns
    pub fn with_epoch(mut self, epoch: SessionEpoch) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn epoch(&self) -> &SessionEpoch {
        &self.epoch
    }

    pub fn context(&self) -> &RepoContext {
        &self.context
    }

    /// Abandon the session; in-flight loads of its explorers are dropped
    pub fn tear_down(&self) {
        let epoch = self.epoch.advance();
        tracing::debug!(
            "Tearing down session for {}/{} (epoch {})",
            self.context.user_name,
            self.context.repo_name,
            epoch
        );
    }

    /// Fetch the root, build the generator and apply the initial expansion
    ///
    /// With the expand-all hint every root-level folder is expanded
    /// recursively; otherwise the explorer navigates to the host's current
    /// path, if any. Returns `Ok(None)` if the session was torn down on the
    /// way.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::LoadFailure`] if the root fetch fails.
    pub async fn set_up(
        &self,
        mut on_phase: impl FnMut(SetupPhase) + Send,
    ) -> Result<Option<FileExplorer>, TreeError> {
        let ticket = self.epoch.ticket();
        if !ticket.is_current() {
            return Ok(None);
        }

        on_phase(SetupPhase::TreeLoading);
        let loader = LazyLoader::new(
            Arc::clone(&self.source),
            self.context.clone(),
            self.config.access_token.clone(),
        );
        let data = loader
            .fetch_root()
            .await
            .map_err(|e| TreeError::load_failure("", e))?;
        if !ticket.is_current() {
            tracing::debug!("Session went stale during root fetch");
            return Ok(None);
        }

        on_phase(SetupPhase::TreeRendering);
        let generator = VisibleNodesGenerator::new(
            data.root,
            loader,
            (&self.config).into(),
            ticket.clone(),
        )?;
        let explorer = FileExplorer::new(generator, &self.config).with_defer(data.defer);

        if self.hints.should_expand_all() {
            if let Err(e) = explorer.generator().expand_all().await {
                tracing::warn!("Initial expand-all incomplete: {}", e);
            }
        } else if let Some(path) = self.hints.current_path(&self.context.branch_name) {
            if explorer.go_to(path.as_slice()).await.is_none() {
                tracing::debug!("Current path {:?} not found in tree", path.join("/"));
            }
        }

        if !ticket.is_current() {
            return Ok(None);
        }
        on_phase(SetupPhase::TreeRendered);
        Ok(Some(explorer))
    }
}
