//! Run observability: structured events, sinks, and the broadcast hub.
//!
//! Execution reports through [`RunEvent`]s. Per run, events flow from the
//! workers through bounded channels into a router task that drives the
//! configured [`ResultSink`]s in sequence and republishes everything on an
//! [`EventHub`] for ad-hoc subscribers.
//!
//! Ordering contract: for any single node, partials arrive in sequence and
//! strictly before that node's final; events of different nodes may
//! interleave; `RunComplete` is always last.

pub mod event;
pub mod hub;
pub mod sink;

pub(crate) mod router;

pub use event::RunEvent;
pub use hub::{EventHub, EventStream};
pub use sink::{ChannelSink, MemorySink, ResultSink, StdOutSink};
