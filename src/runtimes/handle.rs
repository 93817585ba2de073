//! Handle to an in-flight run.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::events::EventStream;

use super::executor::ExecutorError;
use super::state::RunSummary;

/// Owner's view of a run started with
/// [`Executor::run`](crate::runtimes::Executor::run).
///
/// Dropping the handle detaches the run; it keeps executing and its sinks
/// keep receiving events. Use [`cancel`](Self::cancel) for a graceful stop
/// that still settles every node and yields a summary, or
/// [`abort`](Self::abort) to kill the run task outright.
#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    cancellation: CancellationToken,
    events: Option<EventStream>,
    join_handle: JoinHandle<RunSummary>,
}

impl RunHandle {
    pub(crate) fn new(
        run_id: Uuid,
        cancellation: CancellationToken,
        events: EventStream,
        join_handle: JoinHandle<RunSummary>,
    ) -> Self {
        Self {
            run_id,
            cancellation,
            events: Some(events),
            join_handle,
        }
    }

    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Take this run's hub subscription, opened before the first event.
    ///
    /// Returns `None` once taken. The subscription carries every event of
    /// this executor's runs; filter on
    /// [`RunEvent::run_id`](crate::events::RunEvent::run_id) if other runs
    /// may be in flight.
    pub fn events(&mut self) -> Option<EventStream> {
        self.events.take()
    }

    /// Request cancellation. Running bodies observe the token and stop at
    /// their next suspension point; nodes that never started settle as
    /// skipped. [`join`](Self::join) still returns a full summary.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// The token driving this run's cancellation, for wiring into external
    /// shutdown machinery.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Abort the run task. [`join`](Self::join) returns an error afterwards
    /// and no summary is produced.
    pub fn abort(&self) {
        self.join_handle.abort();
    }

    /// True once the run task has completed or aborted.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Await the run's summary.
    pub async fn join(self) -> Result<RunSummary, ExecutorError> {
        self.join_handle.await.map_err(ExecutorError::from)
    }
}
