use std::sync::Arc;

use flume::Receiver;
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::oneshot;
use tracing::warn;

use super::event::RunEvent;
use super::hub::EventHub;
use super::sink::ResultSink;
use crate::runtimes::RunSummary;

/// Delivery pump for one run: merges every producer channel, fans events
/// out to the sinks sequentially, then republishes to the hub.
///
/// Each node writes to its own bounded channel, so a slow sink stalls only
/// the nodes that are actively producing into a full buffer. Per-channel
/// FIFO plus sequential fan-out gives sinks the per-node ordering
/// guarantee. `RunComplete` is delivered last, once every producer channel
/// has closed and the scheduler has handed over the summary.
pub(crate) struct EventRouter {
    channels: Vec<Receiver<RunEvent>>,
    sinks: Vec<Box<dyn ResultSink>>,
    hub: Arc<EventHub>,
}

impl EventRouter {
    pub fn new(
        channels: Vec<Receiver<RunEvent>>,
        sinks: Vec<Box<dyn ResultSink>>,
        hub: Arc<EventHub>,
    ) -> Self {
        Self {
            channels,
            sinks,
            hub,
        }
    }

    /// Drain every producer channel to completion, then emit `RunComplete`.
    pub async fn run(mut self, summary: oneshot::Receiver<RunSummary>) {
        let mut events = stream::select_all(
            self.channels
                .drain(..)
                .map(|receiver| receiver.into_stream().boxed()),
        );
        while let Some(event) = events.next().await {
            self.deliver(&event);
        }

        // Producers are done; the scheduler's summary closes out the run.
        match summary.await {
            Ok(summary) => self.deliver(&RunEvent::run_complete(summary)),
            Err(_) => warn!("scheduler dropped without a run summary"),
        }
    }

    fn deliver(&mut self, event: &RunEvent) {
        for sink in &mut self.sinks {
            if let Err(error) = sink.handle(event) {
                warn!(%error, kind = event.kind(), "result sink rejected event");
            }
        }
        self.hub.publish(event.clone());
    }
}
