//! Slow data source for testing
//!
//! This module provides a decorator around any TreeDataSource that adds
//! configurable delays to simulate a slow host (large repositories, API
//! throttling, bad connections). This is useful for exercising the
//! generator with overlapping, out-of-order loads.

use super::{RepoContext, TreeData, TreeDataSource};
use crate::error::LoadError;
use crate::sync::lock;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Configuration for slow host simulation
#[derive(Debug, Clone, Default)]
pub struct SlowSourceConfig {
    /// Delay for the first (root) request
    pub root_delay: Duration,
    /// Delay for every level request
    pub level_delay: Duration,
    /// Per-path overrides of `level_delay`
    pub path_delays: HashMap<String, Duration>,
}

impl SlowSourceConfig {
    /// Create a config with uniform delay for all requests
    pub fn uniform(delay: Duration) -> Self {
        Self {
            root_delay: delay,
            level_delay: delay,
            path_delays: HashMap::new(),
        }
    }

    /// Create a config with no delays (useful as a baseline)
    pub fn none() -> Self {
        Self::default()
    }

    /// Create a config simulating a slow network host
    pub fn slow_network() -> Self {
        Self {
            root_delay: Duration::from_millis(800),
            level_delay: Duration::from_millis(300),
            path_delays: HashMap::new(),
        }
    }

    /// Override the delay for one folder
    pub fn with_path_delay(mut self, path: impl Into<String>, delay: Duration) -> Self {
        self.path_delays.insert(path.into(), delay);
        self
    }

    fn delay_for(&self, path: &str, is_root_fetch: bool) -> Duration {
        if is_root_fetch {
            return self.root_delay;
        }
        self.path_delays
            .get(path)
            .copied()
            .unwrap_or(self.level_delay)
    }
}

/// Metrics tracking for data-source requests
#[derive(Debug, Clone, Default)]
pub struct SourceMetrics {
    /// Number of root requests
    pub root_calls: usize,
    /// Number of level requests
    pub level_calls: usize,
    /// Number of requests that returned an error
    pub failures: usize,
    /// Total time spent in artificial delays
    pub total_delay_time: Duration,
}

impl SourceMetrics {
    /// Reset all metrics to zero
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Get total number of requests
    pub fn total_calls(&self) -> usize {
        self.root_calls + self.level_calls
    }
}

/// Slow data source wrapper for testing
///
/// Wraps any TreeDataSource implementation and adds configurable delays to
/// each request. Also tracks metrics about request counts and timing.
pub struct SlowSource {
    /// The underlying real source
    inner: Arc<dyn TreeDataSource>,
    /// Configuration for delays
    config: SlowSourceConfig,
    /// Metrics tracking
    metrics: Mutex<SourceMetrics>,
}

impl SlowSource {
    /// Create a new slow data source
    pub fn new(inner: Arc<dyn TreeDataSource>, config: SlowSourceConfig) -> Self {
        Self {
            inner,
            config,
            metrics: Mutex::new(SourceMetrics::default()),
        }
    }

    /// Create with uniform delay for all requests
    pub fn with_uniform_delay(inner: Arc<dyn TreeDataSource>, delay: Duration) -> Self {
        Self::new(inner, SlowSourceConfig::uniform(delay))
    }

    /// Get a snapshot of current metrics
    pub fn metrics(&self) -> SourceMetrics {
        lock(&self.metrics).clone()
    }

    /// Reset metrics to zero
    pub fn reset_metrics(&self) {
        lock(&self.metrics).reset();
    }
}

#[async_trait]
impl TreeDataSource for SlowSource {
    async fn get_tree_data(
        &self,
        context: &RepoContext,
        path: &str,
        is_root_fetch: bool,
        access_token: Option<&str>,
    ) -> Result<TreeData, LoadError> {
        let delay = self
            .config
            .delay_for(path.trim_matches('/'), is_root_fetch);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = self
            .inner
            .get_tree_data(context, path, is_root_fetch, access_token)
            .await;

        let mut metrics = lock(&self.metrics);
        if is_root_fetch {
            metrics.root_calls += 1;
        } else {
            metrics.level_calls += 1;
        }
        if result.is_err() {
            metrics.failures += 1;
        }
        metrics.total_delay_time += delay;
        drop(metrics);

        result
    }
}
