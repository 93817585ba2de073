use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::stream;
use tokio::sync::broadcast::{self, Receiver, Sender};

use super::event::RunEvent;

/// Broadcast fan-out for [`RunEvent`]s.
///
/// The run's event router publishes every delivered event here, so any
/// number of observers can subscribe without being wired in as sinks.
/// Subscribers that fall behind lose the oldest events; the hub counts
/// what was lost in [`dropped`](Self::dropped).
#[derive(Debug)]
pub struct EventHub {
    sender: Sender<RunEvent>,
    dropped_events: AtomicUsize,
    capacity: usize,
}

impl EventHub {
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Arc::new(Self {
            sender,
            dropped_events: AtomicUsize::new(0),
            capacity,
        })
    }

    /// Publish an event to all current subscribers.
    ///
    /// Delivery needs at least one live subscriber; with none, the event
    /// is silently discarded.
    pub fn publish(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(self: &Arc<Self>) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
            hub: Arc::clone(self),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events lost to lagging subscribers across the hub's lifetime.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped_events.load(Ordering::Relaxed)
    }
}

/// One subscriber's view of the hub.
///
/// Falling behind the hub's capacity surfaces as a `Lagged` error on the
/// next receive; the stream stays usable and continues from the oldest
/// retained event.
#[derive(Debug)]
pub struct EventStream {
    receiver: Receiver<RunEvent>,
    hub: Arc<EventHub>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Result<RunEvent, broadcast::error::RecvError> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                self.hub
                    .dropped_events
                    .fetch_add(missed as usize, Ordering::Relaxed);
                Err(broadcast::error::RecvError::Lagged(missed))
            }
            Err(err) => Err(err),
        }
    }

    pub fn try_recv(&mut self) -> Result<RunEvent, broadcast::error::TryRecvError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(event),
            Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                self.hub
                    .dropped_events
                    .fetch_add(missed as usize, Ordering::Relaxed);
                Err(broadcast::error::TryRecvError::Lagged(missed))
            }
            Err(err) => Err(err),
        }
    }

    /// Adapt into a `Stream`, transparently skipping over lag gaps.
    pub fn into_async_stream(self) -> impl futures_util::stream::Stream<Item = RunEvent> {
        stream::unfold(self, |mut stream| async move {
            loop {
                match stream.recv().await {
                    Ok(event) => return Some((event, stream)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }
}
