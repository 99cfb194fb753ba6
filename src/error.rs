//! Error types

use std::time::Duration;

/// Errors reported by a [`TreeDataSource`](crate::loader::TreeDataSource).
///
/// `Clone` because one in-flight fetch may be shared by several waiters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// Transport failure while talking to the remote host.
    #[error("Network error: {0}")]
    Network(String),

    /// The access token is missing, expired or lacks permission.
    #[error("Unauthorized")]
    Unauthorized,

    /// The remote API throttled the request.
    #[error("Rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited {
        /// Seconds until the limit resets, when the host says so.
        retry_after_secs: Option<u64>,
    },

    /// The requested path does not exist on the remote side.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The provider answered with a shape the tree cannot use.
    #[error("Malformed tree data: {0}")]
    Malformed(String),

    /// The shared request was dropped before it produced a result.
    #[error("Request cancelled")]
    Cancelled,
}

impl LoadError {
    /// Creates a rate-limit error from an optional reset delay.
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::RateLimited {
            retry_after_secs: retry_after.map(|d| d.as_secs()),
        }
    }
}

/// Errors surfaced by generator and navigation operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// Loading a folder's contents failed; the folder stays collapsed.
    #[error("Failed to load `{path}`: {source}")]
    LoadFailure {
        /// Folder whose contents were requested.
        path: String,
        /// Underlying provider error.
        #[source]
        source: LoadError,
    },

    /// No node with this path is known to the tree.
    #[error("No node at `{0}`")]
    NodeNotFound(String),

    /// Focus was requested for a node that is not in the visible list.
    #[error("Node `{0}` is not visible")]
    NodeNotVisible(String),
}

impl TreeError {
    pub(crate) fn load_failure(path: impl Into<String>, source: LoadError) -> Self {
        Self::LoadFailure {
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from the data source (and a retry may help).
    pub fn is_load_failure(&self) -> bool {
        matches!(self, Self::LoadFailure { .. })
    }
}
