use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::runtimes::{RunSummary, SkipReason};
use crate::types::NodeId;

/// One observation from a run, delivered to sinks and hub subscribers.
///
/// Events for a single node arrive in order: every `Partial` strictly
/// before that node's `Final`. Events from different nodes may interleave.
/// `RunComplete` is always the last event of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// One chunk of a streaming node's output.
    Partial {
        run_id: Uuid,
        node_id: NodeId,
        /// Output port the chunk was published on.
        output: String,
        /// 0-based position in the node's chunk sequence.
        seq: u64,
        chunk: Value,
        at: DateTime<Utc>,
    },
    /// A node's consolidated result.
    Final {
        run_id: Uuid,
        node_id: NodeId,
        output: String,
        value: Value,
        /// True when served from the frozen-result cache without executing.
        cached: bool,
        at: DateTime<Utc>,
    },
    /// A node's body returned an error; its dependents will be skipped.
    NodeFailed {
        run_id: Uuid,
        node_id: NodeId,
        error: String,
        at: DateTime<Utc>,
    },
    /// A node settled without executing.
    NodeSkipped {
        run_id: Uuid,
        node_id: NodeId,
        reason: SkipReason,
        at: DateTime<Utc>,
    },
    /// The run settled; carries the full per-node accounting.
    RunComplete {
        run_id: Uuid,
        summary: RunSummary,
        at: DateTime<Utc>,
    },
}

impl RunEvent {
    pub fn partial(
        run_id: Uuid,
        node_id: impl Into<NodeId>,
        output: impl Into<String>,
        seq: u64,
        chunk: Value,
    ) -> Self {
        Self::Partial {
            run_id,
            node_id: node_id.into(),
            output: output.into(),
            seq,
            chunk,
            at: Utc::now(),
        }
    }

    pub fn final_value(
        run_id: Uuid,
        node_id: impl Into<NodeId>,
        output: impl Into<String>,
        value: Value,
        cached: bool,
    ) -> Self {
        Self::Final {
            run_id,
            node_id: node_id.into(),
            output: output.into(),
            value,
            cached,
            at: Utc::now(),
        }
    }

    pub fn node_failed(run_id: Uuid, node_id: impl Into<NodeId>, error: impl Into<String>) -> Self {
        Self::NodeFailed {
            run_id,
            node_id: node_id.into(),
            error: error.into(),
            at: Utc::now(),
        }
    }

    pub fn node_skipped(run_id: Uuid, node_id: impl Into<NodeId>, reason: SkipReason) -> Self {
        Self::NodeSkipped {
            run_id,
            node_id: node_id.into(),
            reason,
            at: Utc::now(),
        }
    }

    pub fn run_complete(summary: RunSummary) -> Self {
        Self::RunComplete {
            run_id: summary.run_id,
            summary,
            at: Utc::now(),
        }
    }

    /// The run this event belongs to.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        match self {
            Self::Partial { run_id, .. }
            | Self::Final { run_id, .. }
            | Self::NodeFailed { run_id, .. }
            | Self::NodeSkipped { run_id, .. }
            | Self::RunComplete { run_id, .. } => *run_id,
        }
    }

    /// The node this event concerns; `None` for run-level events.
    #[must_use]
    pub fn node_id(&self) -> Option<&NodeId> {
        match self {
            Self::Partial { node_id, .. }
            | Self::Final { node_id, .. }
            | Self::NodeFailed { node_id, .. }
            | Self::NodeSkipped { node_id, .. } => Some(node_id),
            Self::RunComplete { .. } => None,
        }
    }

    #[must_use]
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::Partial { at, .. }
            | Self::Final { at, .. }
            | Self::NodeFailed { at, .. }
            | Self::NodeSkipped { at, .. }
            | Self::RunComplete { at, .. } => *at,
        }
    }

    /// Stable label matching the serialized `event` tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Partial { .. } => "partial",
            Self::Final { .. } => "final",
            Self::NodeFailed { .. } => "node_failed",
            Self::NodeSkipped { .. } => "node_skipped",
            Self::RunComplete { .. } => "run_complete",
        }
    }

    /// Convert to a structured JSON value.
    ///
    /// # Example
    ///
    /// ```
    /// use uuid::Uuid;
    /// use wireflow::events::RunEvent;
    ///
    /// let event = RunEvent::node_failed(Uuid::new_v4(), "fetch", "connection refused");
    /// let json = event.to_json_value().unwrap();
    /// assert_eq!(json["event"], "node_failed");
    /// assert_eq!(json["node_id"], "fetch");
    /// ```
    pub fn to_json_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Convert to a compact JSON string.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partial {
                node_id,
                output,
                seq,
                chunk,
                ..
            } => write!(f, "[{node_id}.{output}#{seq}] {chunk}"),
            Self::Final {
                node_id,
                output,
                value,
                cached,
                ..
            } => {
                write!(f, "[{node_id}.{output}] {value}")?;
                if *cached {
                    write!(f, " (cached)")?;
                }
                Ok(())
            }
            Self::NodeFailed { node_id, error, .. } => {
                write!(f, "[{node_id}] failed: {error}")
            }
            Self::NodeSkipped {
                node_id, reason, ..
            } => write!(f, "[{node_id}] skipped: {reason}"),
            Self::RunComplete { summary, .. } => write!(f, "{summary}"),
        }
    }
}
