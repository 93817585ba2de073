use std::io::{self, Result as IoResult, Stdout, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::event::RunEvent;
use crate::telemetry::{PlainFormatter, TelemetryFormatter};

/// Abstraction over an output target that consumes run events.
///
/// Sinks are driven sequentially by the run's event router: `handle` is
/// never called concurrently for one run, and events for a single node
/// always arrive in production order. A sink error is logged and does not
/// affect the run.
pub trait ResultSink: Send + Sync {
    /// Handle a structured event. Sink decides how to serialize/format it.
    fn handle(&mut self, event: &RunEvent) -> IoResult<()>;
}

/// Stdout sink with optional formatting.
pub struct StdOutSink<F: TelemetryFormatter = PlainFormatter> {
    handle: Stdout,
    formatter: F,
}

impl Default for StdOutSink {
    fn default() -> Self {
        Self {
            handle: io::stdout(),
            formatter: PlainFormatter::new(),
        }
    }
}

impl<F: TelemetryFormatter> StdOutSink<F> {
    pub fn with_formatter(formatter: F) -> Self {
        Self {
            handle: io::stdout(),
            formatter,
        }
    }
}

impl<F: TelemetryFormatter> ResultSink for StdOutSink<F> {
    fn handle(&mut self, event: &RunEvent) -> IoResult<()> {
        let rendered = match event {
            RunEvent::RunComplete { summary, .. } => self.formatter.render_summary(summary),
            other => self.formatter.render_event(other),
        };
        self.handle.write_all(rendered.join_lines().as_bytes())?;
        self.handle.flush()
    }
}

/// In-memory sink for testing and snapshots.
///
/// Clones share storage, so keep one handle and pass another to the run.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<RunEvent>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of all captured events.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RunEvent> {
        self.entries.lock().clone()
    }

    /// Clear all captured events.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl ResultSink for MemorySink {
    fn handle(&mut self, event: &RunEvent) -> IoResult<()> {
        self.entries.lock().push(event.clone());
        Ok(())
    }
}

/// Channel-based sink for streaming to async consumers (e.g., web clients).
///
/// Events are forwarded to a tokio mpsc channel without blocking.
/// Useful for real-time dashboards, SSE endpoints, or live logging.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelSink {
    /// Create a new channel sink.
    ///
    /// # Example
    /// ```no_run
    /// use tokio::sync::mpsc;
    /// use wireflow::events::ChannelSink;
    ///
    /// let (tx, mut rx) = mpsc::unbounded_channel();
    /// let sink = ChannelSink::new(tx);
    ///
    /// // In another task, consume events:
    /// tokio::spawn(async move {
    ///     while let Some(event) = rx.recv().await {
    ///         println!("Received: {}", event);
    ///     }
    /// });
    /// ```
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        Self { tx }
    }
}

impl ResultSink for ChannelSink {
    fn handle(&mut self, event: &RunEvent) -> IoResult<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "channel receiver dropped"))
    }
}
