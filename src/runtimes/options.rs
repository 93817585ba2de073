//! Engine-level configuration plus per-run options.
//!
//! [`EngineConfig`] captures process-wide tuning and can be loaded from the
//! environment (`WIREFLOW_CONCURRENCY`, `WIREFLOW_STREAM_BUFFER`,
//! `WIREFLOW_HUB_CAPACITY`). [`RunOptions`] carries everything that may vary
//! between two runs of the same executor: cancellation, sinks, freeze
//! overrides, and limit overrides.

use std::fmt;

use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::events::{ResultSink, StdOutSink};
use crate::types::NodeId;

// ============================================================================
// Engine Configuration
// ============================================================================

/// Process-wide executor tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on concurrently running node bodies.
    pub concurrency_limit: usize,
    /// Capacity of each node's result channel, in events.
    pub stream_buffer: usize,
    /// Capacity of the broadcast hub subscribers read from.
    pub hub_capacity: usize,
}

impl EngineConfig {
    pub const DEFAULT_CONCURRENCY: usize = 4;
    pub const DEFAULT_STREAM_BUFFER: usize = 64;
    pub const DEFAULT_HUB_CAPACITY: usize = 1024;

    /// Load configuration from the environment, falling back to the
    /// defaults above for anything unset or unparseable.
    ///
    /// Reads a `.env` file first when one is present.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            concurrency_limit: env_usize("WIREFLOW_CONCURRENCY", Self::DEFAULT_CONCURRENCY),
            stream_buffer: env_usize("WIREFLOW_STREAM_BUFFER", Self::DEFAULT_STREAM_BUFFER),
            hub_capacity: env_usize("WIREFLOW_HUB_CAPACITY", Self::DEFAULT_HUB_CAPACITY),
        }
    }

    #[must_use]
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    #[must_use]
    pub fn with_stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_hub_capacity(mut self, capacity: usize) -> Self {
        self.hub_capacity = capacity.max(1);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: Self::DEFAULT_CONCURRENCY,
            stream_buffer: Self::DEFAULT_STREAM_BUFFER,
            hub_capacity: Self::DEFAULT_HUB_CAPACITY,
        }
    }
}

fn env_usize(key: &'static str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<usize>() {
            Ok(value) if value > 0 => value,
            _ => {
                warn!(key, raw = %raw, default, "ignoring unparseable value");
                default
            }
        },
        Err(_) => default,
    }
}

// ============================================================================
// Per-Run Options
// ============================================================================

/// Options for a single [`Executor::run`](crate::runtimes::Executor::run).
///
/// Built with consuming setters:
///
/// ```
/// use wireflow::events::MemorySink;
/// use wireflow::runtimes::RunOptions;
///
/// let sink = MemorySink::new();
/// let options = RunOptions::new()
///     .with_concurrency_limit(2)
///     .with_sink(sink.clone())
///     .freeze("fetch");
/// ```
#[derive(Default)]
pub struct RunOptions {
    pub(crate) concurrency_limit: Option<usize>,
    pub(crate) stream_buffer: Option<usize>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) frozen_overrides: FxHashMap<NodeId, bool>,
    pub(crate) sinks: Vec<Box<dyn ResultSink>>,
}

impl RunOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap concurrently running bodies for this run only.
    #[must_use]
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = Some(limit.max(1));
        self
    }

    /// Override the per-node result channel capacity for this run only.
    #[must_use]
    pub fn with_stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = Some(capacity.max(1));
        self
    }

    /// Drive cancellation from an external token instead of the one the
    /// run handle creates.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Attach a sink that receives every event of this run in order.
    #[must_use]
    pub fn with_sink(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Attach a [`StdOutSink`] with the default formatter.
    #[must_use]
    pub fn with_stdout_sink(self) -> Self {
        self.with_sink(StdOutSink::default())
    }

    /// Treat the node as frozen for this run, regardless of how the graph
    /// declares it.
    #[must_use]
    pub fn freeze(mut self, node: impl Into<NodeId>) -> Self {
        self.frozen_overrides.insert(node.into(), true);
        self
    }

    /// Force the node to execute even if the graph declares it frozen.
    #[must_use]
    pub fn thaw(mut self, node: impl Into<NodeId>) -> Self {
        self.frozen_overrides.insert(node.into(), false);
        self
    }

    /// Whether a node should be served from cache, given how the graph
    /// declares it. Run overrides win over the declaration.
    #[must_use]
    pub(crate) fn effective_frozen(&self, node: &NodeId, declared: bool) -> bool {
        self.frozen_overrides.get(node).copied().unwrap_or(declared)
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("concurrency_limit", &self.concurrency_limit)
            .field("stream_buffer", &self.stream_buffer)
            .field("cancellation", &self.cancellation.is_some())
            .field("frozen_overrides", &self.frozen_overrides)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
