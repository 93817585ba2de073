//! The concurrent executor: dispatch, worker supervision, and settling.
//!
//! [`Executor::run`] spawns two tasks per run. The scheduler task owns the
//! [`RunState`] ledger: it dispatches `Ready` nodes up to the concurrency
//! limit, serves frozen nodes from the result cache, and applies worker
//! outcomes as they land. The router task merges every node's event channel
//! and fans the events out to sinks and the broadcast hub, closing the run
//! with `RunComplete` once the scheduler hands over the summary.
//!
//! Workers are plain spawned tasks supervised through a [`JoinSet`]. A body
//! error, a panic, or a cancellation settles only that node; the rest of the
//! run keeps going, with the failed node's downstream cone skipped.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures_util::StreamExt;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

use crate::component::{
    BodyContext, BodyOutput, BodyRegistry, BodyStream, ComponentBody, ComponentExecutionError,
    ResolvedInputs, StreamItem,
};
use crate::events::router::EventRouter;
use crate::events::{EventHub, EventStream, RunEvent};
use crate::graphs::{CompileError, ExecutionPlan, Graph, PlanNode, compile};
use crate::registry::TemplateRegistry;
use crate::types::{NodeId, TemplateId};

use super::cache::{CacheKey, CachedResult, ResultCache};
use super::handle::RunHandle;
use super::options::{EngineConfig, RunOptions};
use super::state::{NodeState, RunState, RunSummary, SkipReason, resolve_inputs};

// ============================================================================
// Executor
// ============================================================================

/// Errors surfaced before or after a run, as opposed to per-node failures,
/// which land in the [`RunSummary`].
#[derive(Debug, Error, Diagnostic)]
pub enum ExecutorError {
    /// A planned template has no executable body registered.
    #[error("no body registered for template {template}")]
    #[diagnostic(
        code(wireflow::executor::missing_body),
        help("Register a ComponentBody for every template the plan uses before running.")
    )]
    MissingBody { template: TemplateId },

    /// The run task itself failed, typically because it was aborted.
    #[error(transparent)]
    #[diagnostic(code(wireflow::executor::join))]
    Join(#[from] JoinError),
}

/// Executes compiled plans against a template catalog and its bodies.
///
/// One executor serves many runs, sequential or concurrent. The frozen-result
/// cache and the event hub are shared across all of them: a node frozen in a
/// later run can reuse a result produced by an earlier one, and a single hub
/// subscription observes every run (filter on
/// [`RunEvent::run_id`](crate::events::RunEvent::run_id) when that matters).
///
/// # Examples
///
/// ```rust,no_run
/// use wireflow::runtimes::{Executor, RunOptions};
/// # async fn example(
/// #     registry: wireflow::registry::TemplateRegistry,
/// #     bodies: wireflow::component::BodyRegistry,
/// #     graph: wireflow::graphs::Graph,
/// # ) -> miette::Result<()> {
/// let executor = Executor::new(registry, bodies);
/// let plan = executor.compile(&graph)?;
/// let summary = executor.invoke(&plan, RunOptions::new()).await?;
/// println!("{summary}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Executor {
    registry: TemplateRegistry,
    bodies: BodyRegistry,
    cache: Arc<ResultCache>,
    hub: Arc<EventHub>,
    config: EngineConfig,
}

impl Executor {
    /// Build an executor with the default [`EngineConfig`].
    #[must_use]
    pub fn new(registry: TemplateRegistry, bodies: BodyRegistry) -> Self {
        Self::with_config(registry, bodies, EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(
        registry: TemplateRegistry,
        bodies: BodyRegistry,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            bodies,
            cache: Arc::new(ResultCache::new()),
            hub: EventHub::new(config.hub_capacity),
            config,
        }
    }

    /// Build an executor configured from the environment.
    #[must_use]
    pub fn from_env(registry: TemplateRegistry, bodies: BodyRegistry) -> Self {
        Self::with_config(registry, bodies, EngineConfig::from_env())
    }

    #[must_use]
    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    #[must_use]
    pub fn bodies(&self) -> &BodyRegistry {
        &self.bodies
    }

    /// The frozen-result cache, shared by every run of this executor.
    #[must_use]
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    #[must_use]
    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    /// Subscribe to the event hub. Only events published after this call are
    /// observed.
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        self.hub.subscribe()
    }

    /// Validate and order `graph` against this executor's template catalog.
    pub fn compile(&self, graph: &Graph) -> Result<ExecutionPlan, CompileError> {
        compile(graph, &self.registry)
    }

    /// Start a run and return its handle without waiting for completion.
    ///
    /// Fails up front if any planned template lacks a registered body; once
    /// a handle is returned, per-node failures are reported through events
    /// and the summary, never as an `Err`.
    #[instrument(skip(self, plan, options), fields(nodes = plan.len()), err)]
    pub async fn run(
        &self,
        plan: &ExecutionPlan,
        mut options: RunOptions,
    ) -> Result<RunHandle, ExecutorError> {
        let mut bodies: Vec<Arc<dyn ComponentBody>> = Vec::with_capacity(plan.len());
        for node in plan.nodes() {
            let body = self.bodies.get(&node.template.id).ok_or_else(|| {
                ExecutorError::MissingBody {
                    template: node.template.id.clone(),
                }
            })?;
            bodies.push(body);
        }

        let run_id = Uuid::new_v4();
        let events = self.hub.subscribe();
        let cancellation = options.cancellation.take().unwrap_or_default();
        let limit = options
            .concurrency_limit
            .unwrap_or(self.config.concurrency_limit);
        let buffer = options.stream_buffer.unwrap_or(self.config.stream_buffer);
        let sinks = std::mem::take(&mut options.sinks);

        // One bounded channel per node keeps that node's partials and final
        // in order without serializing unrelated nodes.
        let mut senders = Vec::with_capacity(plan.len());
        let mut receivers = Vec::with_capacity(plan.len());
        for _ in 0..plan.len() {
            let (tx, rx) = flume::bounded(buffer);
            senders.push(tx);
            receivers.push(rx);
        }

        let (summary_tx, summary_rx) = oneshot::channel();
        let router = EventRouter::new(receivers, sinks, Arc::clone(&self.hub));
        let router_task = tokio::spawn(router.run(summary_rx));

        let plan = Arc::new(plan.clone());
        let scheduler = Scheduler {
            state: RunState::new(&plan),
            announced: vec![false; plan.len()],
            plan,
            bodies,
            cache: Arc::clone(&self.cache),
            run_id,
            started_at: Utc::now(),
            cancellation: cancellation.clone(),
            cancelled: false,
            limit,
            options,
            senders,
            join_set: JoinSet::new(),
            workers: FxHashMap::default(),
        };

        let join_handle = tokio::spawn(async move {
            let summary = scheduler.drive(summary_tx).await;
            // RunComplete must reach sinks before the handle resolves.
            if router_task.await.is_err() {
                tracing::warn!("event router task failed");
            }
            summary
        });

        Ok(RunHandle::new(run_id, cancellation, events, join_handle))
    }

    /// Run the plan to completion and return the summary.
    pub async fn invoke(
        &self,
        plan: &ExecutionPlan,
        options: RunOptions,
    ) -> Result<RunSummary, ExecutorError> {
        self.run(plan, options).await?.join().await
    }

    /// Start a run and return its handle together with a hub subscription
    /// opened before the first event, so nothing is missed.
    pub async fn invoke_streaming(
        &self,
        plan: &ExecutionPlan,
        options: RunOptions,
    ) -> Result<(RunHandle, EventStream), ExecutorError> {
        let mut handle = self.run(plan, options).await?;
        let events = handle.events().unwrap_or_else(|| self.hub.subscribe());
        Ok((handle, events))
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Sole owner of the run ledger; everything here runs on one task.
struct Scheduler {
    plan: Arc<ExecutionPlan>,
    /// Bodies by plan index, resolved during pre-flight.
    bodies: Vec<Arc<dyn ComponentBody>>,
    state: RunState,
    /// Nodes whose `NodeSkipped` event has been emitted.
    announced: Vec<bool>,
    cache: Arc<ResultCache>,
    run_id: Uuid,
    started_at: chrono::DateTime<Utc>,
    cancellation: CancellationToken,
    cancelled: bool,
    limit: usize,
    options: RunOptions,
    senders: Vec<flume::Sender<RunEvent>>,
    join_set: JoinSet<WorkerOutcome>,
    /// Task id to plan index, for attributing panicked workers.
    workers: FxHashMap<tokio::task::Id, usize>,
}

impl Scheduler {
    #[instrument(skip_all, fields(run_id = %self.run_id))]
    async fn drive(mut self, summary_tx: oneshot::Sender<RunSummary>) -> RunSummary {
        tracing::debug!(nodes = self.plan.len(), limit = self.limit, "run started");
        let cancellation = self.cancellation.clone();

        loop {
            let dispatch_span = tracing::info_span!("dispatch", in_flight = self.join_set.len());
            dispatch_span.in_scope(|| self.dispatch_ready()).await;
            if self.state.is_settled() {
                break;
            }

            tokio::select! {
                joined = self.join_set.join_next_with_id(), if !self.join_set.is_empty() => {
                    if let Some(joined) = joined {
                        let settle_span = tracing::info_span!("settle");
                        settle_span.in_scope(|| self.apply(joined)).await;
                    }
                }
                () = cancellation.cancelled(), if !self.cancelled => {
                    tracing::debug!("cancellation requested, skipping pending nodes");
                    self.cancelled = true;
                    self.state.cancel_pending();
                    self.announce_skips().await;
                }
            }
        }

        debug_assert!(self.join_set.is_empty());
        let Self {
            state,
            plan,
            mut senders,
            run_id,
            started_at,
            cancelled,
            ..
        } = self;

        // Closing the node channels lets the router finish draining; it then
        // waits on the oneshot to emit RunComplete.
        senders.clear();
        let finalize_span = tracing::info_span!("finalize", cancelled);
        let summary =
            finalize_span.in_scope(|| state.into_summary(&plan, run_id, started_at, cancelled));
        tracing::info!(%summary, "run settled");
        let _ = summary_tx.send(summary.clone());
        summary
    }

    /// Fill free worker slots with `Ready` nodes, in plan order.
    async fn dispatch_ready(&mut self) {
        if self.cancelled {
            return;
        }
        while self.join_set.len() < self.limit {
            let Some(idx) = self.state.next_ready() else {
                return;
            };
            self.dispatch(idx).await;
        }
    }

    async fn dispatch(&mut self, idx: usize) {
        let plan = Arc::clone(&self.plan);
        let node = plan.node_at(idx);
        let inputs = resolve_inputs(&plan, &self.state, idx);
        let key = CacheKey::new(&node.template.id, &inputs);

        let declared_frozen = node.frozen || node.template.frozen_default;
        if self.options.effective_frozen(&node.id, declared_frozen) {
            if let Some(hit) = self.cache.get(&key) {
                tracing::debug!(node = %node.id, "serving frozen node from cache");
                let output = hit
                    .active_output
                    .clone()
                    .unwrap_or_else(|| primary_output(node));
                let event =
                    RunEvent::final_value(self.run_id, node.id.clone(), output, hit.value.clone(), true);
                self.state
                    .settle_success(&plan, idx, hit.value, hit.active_output, true, None);
                self.send(idx, event).await;
                self.announce_skips().await;
                return;
            }
        }

        self.state.mark_running(idx);
        let task = WorkerTask {
            idx,
            body: Arc::clone(&self.bodies[idx]),
            inputs: ResolvedInputs::from_map(inputs),
            ctx: BodyContext {
                run_id: self.run_id,
                node_id: node.id.clone(),
                cancellation: self.cancellation.clone(),
            },
            contract: RouteContract {
                conditional: node.template.is_conditional(),
                outputs: node.template.outputs.iter().map(|o| o.name.clone()).collect(),
                primary: primary_output(node),
            },
            events: self.senders[idx].clone(),
            key,
        };
        let handle = self.join_set.spawn(run_node(task));
        self.workers.insert(handle.id(), idx);
    }

    async fn apply(&mut self, joined: Result<(tokio::task::Id, WorkerOutcome), JoinError>) {
        match joined {
            Ok((task_id, outcome)) => {
                self.workers.remove(&task_id);
                self.settle_worker(
                    outcome.idx,
                    Some(outcome.key),
                    outcome.result,
                    Some(outcome.duration_ms),
                )
                .await;
            }
            Err(error) => {
                let Some(idx) = self.workers.remove(&error.id()) else {
                    tracing::warn!("finished worker was not tracked");
                    return;
                };
                let result = Err(ComponentExecutionError::Panicked {
                    message: panic_message(error),
                });
                self.settle_worker(idx, None, result, None).await;
            }
        }
    }

    async fn settle_worker(
        &mut self,
        idx: usize,
        key: Option<CacheKey>,
        result: Result<Settled, ComponentExecutionError>,
        duration_ms: Option<u64>,
    ) {
        let plan = Arc::clone(&self.plan);
        let node_id = plan.node_at(idx).id.clone();
        match result {
            Ok(Settled {
                value,
                active_output,
            }) => {
                // Every success is cached so a later frozen run can reuse it.
                if let Some(key) = key {
                    self.cache.put(
                        key,
                        CachedResult {
                            value: value.clone(),
                            active_output: active_output.clone(),
                        },
                    );
                }
                let output = active_output
                    .clone()
                    .unwrap_or_else(|| primary_output(plan.node_at(idx)));
                let event =
                    RunEvent::final_value(self.run_id, node_id, output, value.clone(), false);
                self.state
                    .settle_success(&plan, idx, value, active_output, false, duration_ms);
                self.send(idx, event).await;
            }
            Err(ComponentExecutionError::Cancelled) if self.cancellation.is_cancelled() => {
                if !self.cancelled {
                    self.cancelled = true;
                    self.state.cancel_pending();
                }
                self.state.skip(idx, SkipReason::Cancelled);
            }
            Err(error) => {
                let message = error.to_string();
                tracing::debug!(node = %node_id, error = %message, "node failed");
                let event = RunEvent::node_failed(self.run_id, node_id, message.clone());
                self.state.settle_failure(&plan, idx, message, duration_ms);
                self.send(idx, event).await;
            }
        }
        self.announce_skips().await;
    }

    /// Emit `NodeSkipped` for every node the ledger skipped since last call.
    async fn announce_skips(&mut self) {
        for idx in 0..self.plan.len() {
            if self.announced[idx] {
                continue;
            }
            let slot = self.state.slot(idx);
            if slot.state != NodeState::Skipped {
                continue;
            }
            self.announced[idx] = true;
            let Some(reason) = slot.skip.clone() else {
                continue;
            };
            let node_id = self.plan.node_at(idx).id.clone();
            let event = RunEvent::node_skipped(self.run_id, node_id, reason);
            self.send(idx, event).await;
        }
    }

    async fn send(&self, idx: usize, event: RunEvent) {
        if self.senders[idx].send_async(event).await.is_err() {
            tracing::warn!(node = %self.plan.node_at(idx).id, "event channel closed before delivery");
        }
    }
}

/// The output name a non-routed value is published under.
fn primary_output(node: &PlanNode) -> String {
    node.template
        .outputs
        .first()
        .map(|o| o.name.clone())
        .unwrap_or_else(|| "output".to_string())
}

fn panic_message(error: JoinError) -> String {
    if error.is_panic() {
        let payload = error.into_panic();
        if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        }
    } else {
        "worker task was aborted".to_string()
    }
}

// ============================================================================
// Workers
// ============================================================================

/// Everything a worker needs, prepared on the scheduler task.
struct WorkerTask {
    idx: usize,
    body: Arc<dyn ComponentBody>,
    inputs: ResolvedInputs,
    ctx: BodyContext,
    contract: RouteContract,
    events: flume::Sender<RunEvent>,
    key: CacheKey,
}

/// The routing rules the node's template declared, checked against what the
/// body actually returned.
struct RouteContract {
    conditional: bool,
    outputs: Vec<String>,
    primary: String,
}

struct WorkerOutcome {
    idx: usize,
    key: CacheKey,
    result: Result<Settled, ComponentExecutionError>,
    duration_ms: u64,
}

struct Settled {
    value: serde_json::Value,
    active_output: Option<String>,
}

async fn run_node(task: WorkerTask) -> WorkerOutcome {
    let WorkerTask {
        idx,
        body,
        inputs,
        ctx,
        contract,
        events,
        key,
    } = task;
    let started = Instant::now();
    let run_id = ctx.run_id;
    let node_id = ctx.node_id.clone();
    let cancellation = ctx.cancellation.clone();

    let invoked = tokio::select! {
        result = body.invoke(inputs, ctx) => result,
        () = cancellation.cancelled() => Err(ComponentExecutionError::Cancelled),
    };
    let result = match invoked {
        Ok(output) => {
            interpret_output(output, &contract, run_id, &node_id, &events, &cancellation).await
        }
        Err(error) => Err(error),
    };

    WorkerOutcome {
        idx,
        key,
        result,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

async fn interpret_output(
    output: BodyOutput,
    contract: &RouteContract,
    run_id: Uuid,
    node_id: &NodeId,
    events: &flume::Sender<RunEvent>,
    cancellation: &CancellationToken,
) -> Result<Settled, ComponentExecutionError> {
    match output {
        BodyOutput::Value(value) => {
            if contract.conditional {
                return Err(ComponentExecutionError::route_violation(
                    "conditional template must route its value to one declared output",
                ));
            }
            Ok(Settled {
                value,
                active_output: None,
            })
        }
        BodyOutput::Routed { output, value } => {
            if !contract.conditional {
                return Err(ComponentExecutionError::route_violation(format!(
                    "template is not conditional but the body routed to {output}"
                )));
            }
            if !contract.outputs.iter().any(|declared| declared == &output) {
                return Err(ComponentExecutionError::route_violation(format!(
                    "{output} is not a declared output of this template"
                )));
            }
            Ok(Settled {
                value,
                active_output: Some(output),
            })
        }
        BodyOutput::Stream(stream) => {
            if contract.conditional {
                return Err(ComponentExecutionError::route_violation(
                    "conditional templates cannot stream",
                ));
            }
            drain_stream(stream, contract, run_id, node_id, events, cancellation).await
        }
    }
}

/// Forward chunks as `Partial` events until the stream yields its `Final`.
///
/// A stream that ends without a `Final` fails the node with
/// [`ComponentExecutionError::StreamTruncated`]; chunks already forwarded
/// stay delivered.
async fn drain_stream(
    mut stream: BodyStream,
    contract: &RouteContract,
    run_id: Uuid,
    node_id: &NodeId,
    events: &flume::Sender<RunEvent>,
    cancellation: &CancellationToken,
) -> Result<Settled, ComponentExecutionError> {
    let mut seq: u64 = 0;
    loop {
        let item = tokio::select! {
            item = stream.next() => item,
            () = cancellation.cancelled() => return Err(ComponentExecutionError::Cancelled),
        };
        match item {
            Some(Ok(StreamItem::Chunk(chunk))) => {
                let event =
                    RunEvent::partial(run_id, node_id.clone(), contract.primary.clone(), seq, chunk);
                if events.send_async(event).await.is_err() {
                    return Err(ComponentExecutionError::failed(
                        "event channel closed while streaming",
                    ));
                }
                seq += 1;
            }
            Some(Ok(StreamItem::Final(value))) => {
                return Ok(Settled {
                    value,
                    active_output: None,
                });
            }
            Some(Err(error)) => return Err(error),
            None => return Err(ComponentExecutionError::StreamTruncated),
        }
    }
}
