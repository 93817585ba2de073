//! Component bodies shared across integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use serde_json::json;
use wireflow::component::{
    BodyContext, BodyOutput, ComponentBody, ComponentExecutionError, ResolvedInputs, StreamItem,
};

/// Emits its `value` field unchanged. The usual graph source.
pub struct LiteralBody;

#[async_trait]
impl ComponentBody for LiteralBody {
    async fn invoke(
        &self,
        inputs: ResolvedInputs,
        _ctx: BodyContext,
    ) -> Result<BodyOutput, ComponentExecutionError> {
        Ok(BodyOutput::Value(inputs.require("value")?.clone()))
    }
}

/// Uppercases the `input` string.
pub struct UppercaseBody;

#[async_trait]
impl ComponentBody for UppercaseBody {
    async fn invoke(
        &self,
        inputs: ResolvedInputs,
        _ctx: BodyContext,
    ) -> Result<BodyOutput, ComponentExecutionError> {
        let text = inputs.get_str("input")?;
        Ok(BodyOutput::Value(json!(text.to_uppercase())))
    }
}

/// Joins the `parts` fan-in array with commas, preserving edge order.
pub struct ConcatBody;

#[async_trait]
impl ComponentBody for ConcatBody {
    async fn invoke(
        &self,
        inputs: ResolvedInputs,
        _ctx: BodyContext,
    ) -> Result<BodyOutput, ComponentExecutionError> {
        let parts = inputs.get_array("parts")?;
        let joined = parts
            .iter()
            .map(|part| part.as_str().map(str::to_string).unwrap_or_else(|| part.to_string()))
            .collect::<Vec<_>>()
            .join(",");
        Ok(BodyOutput::Value(json!(joined)))
    }
}

/// Conditional body: routes `input` to `then` when it equals the `expects`
/// literal, to `otherwise` when it does not.
pub struct RouterBody;

#[async_trait]
impl ComponentBody for RouterBody {
    async fn invoke(
        &self,
        inputs: ResolvedInputs,
        _ctx: BodyContext,
    ) -> Result<BodyOutput, ComponentExecutionError> {
        let input = inputs.get_str("input")?;
        let expects = inputs.get_str("expects")?;
        let output = if input == expects { "then" } else { "otherwise" };
        Ok(BodyOutput::routed(output, json!(input)))
    }
}

/// Routes every invocation to one fixed output name, declared or not.
pub struct RoutingBody {
    pub output: String,
}

impl RoutingBody {
    pub fn to(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
        }
    }
}

#[async_trait]
impl ComponentBody for RoutingBody {
    async fn invoke(
        &self,
        _inputs: ResolvedInputs,
        _ctx: BodyContext,
    ) -> Result<BodyOutput, ComponentExecutionError> {
        Ok(BodyOutput::routed(self.output.clone(), json!("routed")))
    }
}

/// Always fails with the configured message.
pub struct FailingBody {
    pub message: String,
}

impl FailingBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl ComponentBody for FailingBody {
    async fn invoke(
        &self,
        _inputs: ResolvedInputs,
        _ctx: BodyContext,
    ) -> Result<BodyOutput, ComponentExecutionError> {
        Err(ComponentExecutionError::failed(self.message.clone()))
    }
}

/// Panics mid-invocation; the executor must contain it.
pub struct PanickingBody;

#[async_trait]
impl ComponentBody for PanickingBody {
    async fn invoke(
        &self,
        _inputs: ResolvedInputs,
        _ctx: BodyContext,
    ) -> Result<BodyOutput, ComponentExecutionError> {
        panic!("kaboom");
    }
}

/// Counts invocations and tags its output with the running count, so cache
/// hits are distinguishable from re-executions.
pub struct CountingBody {
    pub counter: Arc<AtomicUsize>,
}

impl CountingBody {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        Self { counter }
    }
}

#[async_trait]
impl ComponentBody for CountingBody {
    async fn invoke(
        &self,
        inputs: ResolvedInputs,
        _ctx: BodyContext,
    ) -> Result<BodyOutput, ComponentExecutionError> {
        let value = inputs.get_str("value")?;
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(BodyOutput::Value(json!(format!("{value}#{n}"))))
    }
}

/// Sleeps before answering, for cancellation and concurrency tests.
pub struct SlowBody {
    pub delay: Duration,
}

impl SlowBody {
    pub fn millis(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
        }
    }
}

#[async_trait]
impl ComponentBody for SlowBody {
    async fn invoke(
        &self,
        _inputs: ResolvedInputs,
        _ctx: BodyContext,
    ) -> Result<BodyOutput, ComponentExecutionError> {
        tokio::time::sleep(self.delay).await;
        Ok(BodyOutput::Value(json!("slow")))
    }
}

/// Streams its chunks one by one, then the concatenation as the final value.
///
/// `fail_after` injects a mid-stream error after that many chunks;
/// `truncate` ends the stream without a final item.
pub struct StreamerBody {
    pub chunks: Vec<String>,
    pub fail_after: Option<usize>,
    pub truncate: bool,
}

impl StreamerBody {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            fail_after: None,
            truncate: false,
        }
    }

    pub fn failing_after(mut self, chunks: usize) -> Self {
        self.fail_after = Some(chunks);
        self
    }

    pub fn truncated(mut self) -> Self {
        self.truncate = true;
        self
    }
}

#[async_trait]
impl ComponentBody for StreamerBody {
    async fn invoke(
        &self,
        _inputs: ResolvedInputs,
        _ctx: BodyContext,
    ) -> Result<BodyOutput, ComponentExecutionError> {
        let chunks = self.chunks.clone();
        let fail_after = self.fail_after;
        let truncate = self.truncate;
        Ok(BodyOutput::stream(stream! {
            let mut joined = String::new();
            for (i, chunk) in chunks.into_iter().enumerate() {
                if fail_after == Some(i) {
                    yield Err(ComponentExecutionError::failed("stream source dropped"));
                    return;
                }
                joined.push_str(&chunk);
                yield Ok(StreamItem::Chunk(json!(chunk)));
            }
            if !truncate {
                yield Ok(StreamItem::Final(json!(joined)));
            }
        }))
    }
}

/// Tracks how many invocations overlap, for concurrency-limit tests.
pub struct GaugeBody {
    pub current: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
}

impl GaugeBody {
    pub fn new(current: Arc<AtomicUsize>, peak: Arc<AtomicUsize>) -> Self {
        Self { current, peak }
    }
}

#[async_trait]
impl ComponentBody for GaugeBody {
    async fn invoke(
        &self,
        _inputs: ResolvedInputs,
        _ctx: BodyContext,
    ) -> Result<BodyOutput, ComponentExecutionError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(BodyOutput::Value(json!("ok")))
    }
}

/// Waits on a shared barrier; completes only when enough peers run at once.
pub struct BarrierBody {
    pub barrier: Arc<tokio::sync::Barrier>,
}

impl BarrierBody {
    pub fn new(barrier: Arc<tokio::sync::Barrier>) -> Self {
        Self { barrier }
    }
}

#[async_trait]
impl ComponentBody for BarrierBody {
    async fn invoke(
        &self,
        _inputs: ResolvedInputs,
        _ctx: BodyContext,
    ) -> Result<BodyOutput, ComponentExecutionError> {
        self.barrier.wait().await;
        Ok(BodyOutput::Value(json!("ok")))
    }
}
