//! Sidebar controller
//!
//! [`FileExplorer`] turns keyboard and mouse input into generator calls.
//! It never touches a UI: every handler returns an outcome describing what
//! the host should do next (move DOM focus, open a URL, or let the browser
//! handle the event).
//!
//! With singleton-folder compression on, a merged chain such as
//! `src/main/java` is one step for the arrow keys, and key actions on it
//! apply to its innermost folder.

use crate::compress::CompressedView;
use crate::config::{RecursiveToggleModifier, SidebarConfig};
use crate::error::TreeError;
use crate::generator::{VisibleNode, VisibleNodes, VisibleNodesGenerator};
use crate::sync::lock;
use crate::tree::{NodeKind, TreeNode};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Operating system of the host, for modifier conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    MacOs,
    Other,
}

impl HostOs {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Enter,
    /// Anything else; never handled
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyInput {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_alt(mut self) -> Self {
        self.modifiers.alt = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.modifiers.meta = true;
        self
    }
}

/// What the host should do after a key press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Not ours; let the default action run
    Ignored,
    /// Consumed; suppress the default action
    Handled,
    /// Focus left the list; move input focus to the search box
    FocusSearch,
    /// A row got focus from the search box; move input focus to the list
    FocusTree,
    /// Navigate to `url`
    Open { url: String, new_window: bool },
}

/// Mouse state of a row click
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickModifiers {
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub middle_button: bool,
}

impl ClickModifiers {
    /// The browser would open the link in a new tab or window
    pub fn opens_in_new_window(&self) -> bool {
        self.ctrl || self.meta || self.shift || self.middle_button
    }
}

/// What the host should do after a row click
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Let the browser follow the link as usual
    PassThrough,
    /// Consumed
    Handled,
    /// Load `url` in place
    Open { url: String },
}

/// Nearest row above `path` that lists it among its contents
pub fn get_visible_parent_node<'a>(nodes: &'a VisibleNodes, path: &str) -> Option<&'a VisibleNode> {
    let index = nodes.index_of(path)?;
    nodes.nodes[..index]
        .iter()
        .rev()
        .find(|row| row.contains(path))
}

/// Arrow-key steps over a snapshot
///
/// Without compression every row is a step. With it, each displayed row of
/// the [`CompressedView`] is one step, standing for its innermost node.
struct Steps {
    view: Option<CompressedView>,
}

impl Steps {
    fn new(snapshot: &VisibleNodes, compress: bool) -> Self {
        let view = (compress && !snapshot.is_searching()).then(|| CompressedView::new(snapshot));
        Self { view }
    }

    /// Flat index of the node acting for the step that shows `index`
    fn representative(&self, index: usize) -> usize {
        self.view
            .as_ref()
            .and_then(|view| view.index_for_row(view.row_for_index(index)?))
            .unwrap_or(index)
    }

    /// Flat index of the outermost node shown by the step at `index`
    fn outermost(&self, index: usize) -> usize {
        self.view
            .as_ref()
            .and_then(|view| view.rows().get(view.row_for_index(index)?))
            .map_or(index, |row| row.first_index)
    }

    fn first(&self) -> usize {
        self.representative(0)
    }

    fn next(&self, index: usize) -> Option<usize> {
        match &self.view {
            Some(view) => view.index_for_row(view.row_for_index(index)? + 1),
            None => Some(index + 1),
        }
    }

    fn prev(&self, index: usize) -> Option<usize> {
        match &self.view {
            Some(view) => view.index_for_row(view.row_for_index(index)?.checked_sub(1)?),
            None => index.checked_sub(1),
        }
    }
}

/// Input handling on top of a [`VisibleNodesGenerator`]
#[derive(Debug, Clone)]
pub struct FileExplorer {
    generator: VisibleNodesGenerator,
    recursive_toggle: RecursiveToggleModifier,
    host_os: HostOs,
    defer: bool,
}

impl FileExplorer {
    pub fn new(generator: VisibleNodesGenerator, config: &SidebarConfig) -> Self {
        Self {
            generator,
            recursive_toggle: config.recursive_toggle_folder,
            host_os: HostOs::current(),
            defer: false,
        }
    }

    pub fn with_host_os(mut self, host_os: HostOs) -> Self {
        self.host_os = host_os;
        self
    }

    pub(crate) fn with_defer(mut self, defer: bool) -> Self {
        self.defer = defer;
        self
    }

    /// The data source could not deliver the whole tree up front
    pub fn is_deferred(&self) -> bool {
        self.defer
    }

    pub fn generator(&self) -> &VisibleNodesGenerator {
        &self.generator
    }

    pub fn visible_nodes(&self) -> Arc<VisibleNodes> {
        self.generator.visible_nodes()
    }

    /// Set the search key from the search box
    pub fn update_search_key(&self, key: &str) {
        self.generator.search(Some(key));
    }

    /// The search box got input focus
    pub fn on_focus_search_bar(&self) {
        // Clearing focus cannot fail
        let _ = self.generator.focus_node(None);
    }

    /// Leave search mode, then reveal and focus the node at `segments`
    ///
    /// Waits for the snapshot of the cleared search to be delivered before
    /// expanding, so listeners see the hierarchy view first.
    pub async fn go_to<S: AsRef<str>>(&self, segments: &[S]) -> Option<Arc<TreeNode>> {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        self.generator.on_next_update(move |_| {
            if let Some(tx) = lock(&tx).take() {
                let _ = tx.send(());
            }
        });
        self.generator.search(None);
        rx.await.ok()?;

        self.expand_to(segments).await
    }

    /// Expand every ancestor of `segments` and focus the node
    pub async fn expand_to<S: AsRef<str>>(&self, segments: &[S]) -> Option<Arc<TreeNode>> {
        let path = join_segments(segments);
        let node = self.generator.expand_to(&path).await?;
        if let Err(e) = self.generator.focus_node(Some(&node.path)) {
            tracing::debug!("Could not focus {:?}: {}", node.path, e);
        }
        Some(node)
    }

    /// Focus a folder and flip its expansion
    pub async fn toggle_node_expansion(&self, path: &str, recursive: bool) -> Result<(), TreeError> {
        let expand = !self.generator.is_expanded(path);
        self.set_expand(path, expand, recursive).await
    }

    /// Focus a folder and expand or collapse it
    ///
    /// Files and submodule links are left alone.
    pub async fn set_expand(&self, path: &str, expand: bool, recursive: bool) -> Result<(), TreeError> {
        let node = self
            .generator
            .node(path)
            .ok_or_else(|| TreeError::NodeNotFound(path.to_string()))?;
        if !node.is_folder() {
            return Ok(());
        }
        self.generator.focus_node(Some(path))?;
        self.generator.set_expand(path, expand, recursive).await
    }

    /// Keyboard handling for the sidebar
    pub async fn handle_key(&self, input: KeyInput) -> Result<KeyOutcome, TreeError> {
        let snapshot = self.generator.visible_nodes();
        let steps = Steps::new(&snapshot, self.generator.options().compress_singleton_folder);

        let Some(index) = snapshot.focused_index().map(|idx| steps.representative(idx)) else {
            return self.handle_key_from_search(&snapshot, &steps, input.key);
        };
        let focused = &snapshot.nodes[index];
        let alt = input.modifiers.alt;

        match input.key {
            Key::Up => self.move_focus(&snapshot, steps.prev(index)),
            Key::Down => self.move_focus(&snapshot, steps.next(index)),
            Key::Left => {
                if self.would_block_history_navigation(input.modifiers) {
                    return Ok(KeyOutcome::Ignored);
                }
                if snapshot.is_expanded(&focused.path) {
                    self.toggle_node_expansion(&focused.path, alt).await?;
                    return Ok(KeyOutcome::Handled);
                }
                let outermost = &snapshot.nodes[steps.outermost(index)];
                if let Some(parent) = get_visible_parent_node(&snapshot, &outermost.path) {
                    let target = snapshot
                        .index_of(&parent.path)
                        .map_or(parent, |idx| &snapshot.nodes[steps.representative(idx)]);
                    self.generator.focus_node(Some(&target.path))?;
                }
                Ok(KeyOutcome::Handled)
            }
            Key::Right => {
                if self.would_block_history_navigation(input.modifiers) {
                    return Ok(KeyOutcome::Ignored);
                }
                if focused.is_folder() && snapshot.is_expanded(&focused.path) {
                    if let Some(next) = snapshot.get(index + 1) {
                        if focused.contains(&next.path) {
                            let target = &snapshot.nodes[steps.representative(index + 1)];
                            self.generator.focus_node(Some(&target.path))?;
                        }
                    }
                    return Ok(KeyOutcome::Handled);
                }
                self.activate(&focused.node, alt).await
            }
            Key::Enter => {
                if snapshot.is_searching() {
                    let segments: Vec<&str> = focused.path.split('/').collect();
                    self.go_to(segments.as_slice()).await;
                    return Ok(KeyOutcome::Handled);
                }
                self.activate(&focused.node, alt).await
            }
            Key::Other => Ok(KeyOutcome::Ignored),
        }
    }

    /// Mouse handling for a row
    pub async fn on_node_click(
        &self,
        path: &str,
        click: ClickModifiers,
    ) -> Result<ClickOutcome, TreeError> {
        let node = self
            .generator
            .node(path)
            .ok_or_else(|| TreeError::NodeNotFound(path.to_string()))?;

        match &node.kind {
            NodeKind::Tree { .. } => {
                let recursive = match self.recursive_toggle {
                    RecursiveToggleModifier::Shift => click.shift,
                    RecursiveToggleModifier::Alt => click.alt,
                };
                // The recursive modifier wins over the browser's own binding
                if !recursive && click.opens_in_new_window() {
                    return Ok(ClickOutcome::PassThrough);
                }
                self.toggle_node_expansion(path, recursive).await?;
                Ok(ClickOutcome::Handled)
            }
            NodeKind::Blob => {
                if click.opens_in_new_window() {
                    return Ok(ClickOutcome::PassThrough);
                }
                self.generator.focus_node(Some(path))?;
                match &node.url {
                    Some(url) if !url.contains('#') => Ok(ClickOutcome::Open { url: url.clone() }),
                    _ => Ok(ClickOutcome::PassThrough),
                }
            }
            NodeKind::Commit => Ok(ClickOutcome::PassThrough),
        }
    }

    fn handle_key_from_search(
        &self,
        snapshot: &VisibleNodes,
        steps: &Steps,
        key: Key,
    ) -> Result<KeyOutcome, TreeError> {
        let target = match key {
            Key::Down => snapshot.get(steps.first()),
            Key::Up => snapshot.nodes.last(),
            _ => None,
        };
        match target {
            Some(row) => {
                self.generator.focus_node(Some(&row.path))?;
                Ok(KeyOutcome::FocusTree)
            }
            None => Ok(KeyOutcome::Ignored),
        }
    }

    fn move_focus(
        &self,
        snapshot: &VisibleNodes,
        index: Option<usize>,
    ) -> Result<KeyOutcome, TreeError> {
        match index.and_then(|idx| snapshot.get(idx)) {
            Some(row) => {
                self.generator.focus_node(Some(&row.path))?;
                Ok(KeyOutcome::Handled)
            }
            None => {
                self.generator.focus_node(None)?;
                Ok(KeyOutcome::FocusSearch)
            }
        }
    }

    /// Confirm action on a row: toggle a folder, open a file or submodule
    async fn activate(&self, node: &TreeNode, recursive: bool) -> Result<KeyOutcome, TreeError> {
        match &node.kind {
            NodeKind::Tree { .. } => {
                self.toggle_node_expansion(&node.path, recursive).await?;
                Ok(KeyOutcome::Handled)
            }
            NodeKind::Blob | NodeKind::Commit => Ok(match &node.url {
                Some(url) => KeyOutcome::Open {
                    url: url.clone(),
                    new_window: node.is_submodule(),
                },
                None => KeyOutcome::Handled,
            }),
        }
    }

    /// Cmd+Left/Right on macOS and Alt+Left/Right elsewhere go back/forward
    fn would_block_history_navigation(&self, modifiers: Modifiers) -> bool {
        match self.host_os {
            HostOs::MacOs => modifiers.meta,
            HostOs::Other => modifiers.alt,
        }
    }
}

fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
