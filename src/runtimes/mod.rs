//! Runtime execution of compiled plans.
//!
//! This module turns an immutable [`ExecutionPlan`](crate::graphs::ExecutionPlan)
//! into a live run: concurrent dispatch, per-node lifecycle tracking, frozen
//! result reuse, and cancellation.
//!
//! # Architecture
//!
//! - **[`Executor`]** - Long-lived entry point; owns the template catalog,
//!   the component bodies, the shared result cache, and the event hub
//! - **[`RunOptions`]** - Per-run knobs: sinks, cancellation, freeze
//!   overrides, limit overrides
//! - **[`RunHandle`]** - Owner's view of one in-flight run
//! - **[`RunSummary`]** - Per-node accounting once the run settles
//! - **[`ResultCache`]** - Frozen-node results keyed by template and inputs
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use wireflow::events::MemorySink;
//! use wireflow::runtimes::{Executor, RunOptions};
//! # async fn example(
//! #     registry: wireflow::registry::TemplateRegistry,
//! #     bodies: wireflow::component::BodyRegistry,
//! #     graph: wireflow::graphs::Graph,
//! # ) -> miette::Result<()> {
//! let executor = Executor::new(registry, bodies);
//! let plan = executor.compile(&graph)?;
//!
//! let sink = MemorySink::new();
//! let summary = executor
//!     .invoke(&plan, RunOptions::new().with_sink(sink.clone()))
//!     .await?;
//!
//! assert!(summary.is_success());
//! for event in sink.snapshot() {
//!     println!("{event}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod executor;
pub mod handle;
pub mod options;
mod state;

pub use cache::{CacheKey, CachedResult, ResultCache};
pub use executor::{Executor, ExecutorError};
pub use handle::RunHandle;
pub use options::{EngineConfig, RunOptions};
pub use state::{NodeReport, NodeState, RunSummary, SkipReason};
