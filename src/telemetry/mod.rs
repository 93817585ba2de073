//! Rendering and tracing setup for run events.
//!
//! Sinks that write human-readable output delegate formatting to a
//! [`TelemetryFormatter`]; [`PlainFormatter`] is the built-in text renderer
//! with optional ANSI color. [`init`] wires up the `tracing` subscriber the
//! engine logs through.

use std::io::IsTerminal;

use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

use crate::events::RunEvent;
use crate::runtimes::RunSummary;

pub const CONTEXT_COLOR: &str = "\x1b[32m"; // green
pub const LINE_COLOR: &str = "\x1b[35m"; // magenta / dark pink
pub const ERROR_COLOR: &str = "\x1b[31m"; // red
pub const RESET_COLOR: &str = "\x1b[0m";

/// Formatter color mode for telemetry output.
///
/// Controls whether ANSI color codes are included in formatted output:
/// - [`FormatterMode::Auto`]: Automatically detects TTY capability via `stderr.is_terminal()`
/// - [`FormatterMode::Colored`]: Always include color codes (for forced color output)
/// - [`FormatterMode::Plain`]: Never include color codes (for logs/files)
///
/// # Examples
/// ```
/// use wireflow::telemetry::FormatterMode;
///
/// // Auto-detect based on TTY
/// let mode = FormatterMode::auto_detect();
///
/// // Force colored output
/// let mode = FormatterMode::Colored;
///
/// // Force plain output for logging
/// let mode = FormatterMode::Plain;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatterMode {
    /// Auto-detect TTY capability (checks `stderr.is_terminal()`)
    #[default]
    Auto,
    /// Always include ANSI color codes
    Colored,
    /// Never include ANSI color codes
    Plain,
}

impl FormatterMode {
    /// Auto-detect formatter mode based on stderr TTY capability.
    ///
    /// Returns `FormatterMode::Colored` if stderr is a terminal, otherwise `FormatterMode::Plain`.
    #[must_use]
    pub fn auto_detect() -> Self {
        if std::io::stderr().is_terminal() {
            FormatterMode::Colored
        } else {
            FormatterMode::Plain
        }
    }

    /// Returns true if this mode should use colored output.
    ///
    /// For `Auto` mode, performs TTY detection on each call.
    #[must_use]
    pub fn is_colored(&self) -> bool {
        match self {
            FormatterMode::Auto => std::io::stderr().is_terminal(),
            FormatterMode::Colored => true,
            FormatterMode::Plain => false,
        }
    }
}

/// Rendered output for a telemetry item that can be consumed by sinks.
#[derive(Clone, Debug, Default)]
pub struct EventRender {
    pub context: Option<String>,
    pub lines: Vec<String>,
}

impl EventRender {
    #[must_use]
    pub fn join_lines(&self) -> String {
        self.lines.join("")
    }
}

pub trait TelemetryFormatter: Send + Sync {
    fn render_event(&self, event: &RunEvent) -> EventRender;
    fn render_summary(&self, summary: &RunSummary) -> EventRender;
}

/// Plain text formatter with optional ANSI color codes.
///
/// Color output is controlled by [`FormatterMode`]:
/// - `Auto`: Uses color when stderr is a TTY
/// - `Colored`: Always uses color
/// - `Plain`: Never uses color
///
/// # Examples
/// ```
/// use wireflow::telemetry::{FormatterMode, PlainFormatter};
///
/// // Auto-detect TTY
/// let formatter = PlainFormatter::new();
///
/// // Force plain output (no colors)
/// let formatter = PlainFormatter::with_mode(FormatterMode::Plain);
/// ```
pub struct PlainFormatter {
    mode: FormatterMode,
}

impl PlainFormatter {
    /// Create a new formatter with auto-detected color mode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: FormatterMode::Auto,
        }
    }

    /// Create a new formatter with explicit color mode.
    #[must_use]
    pub fn with_mode(mode: FormatterMode) -> Self {
        Self { mode }
    }

    fn paint(&self, ansi_code: &str, text: &str) -> String {
        if self.mode.is_colored() {
            format!("{ansi_code}{text}{RESET_COLOR}\n")
        } else {
            format!("{text}\n")
        }
    }
}

impl Default for PlainFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryFormatter for PlainFormatter {
    fn render_event(&self, event: &RunEvent) -> EventRender {
        let color = match event {
            RunEvent::NodeFailed { .. } => ERROR_COLOR,
            _ => LINE_COLOR,
        };
        EventRender {
            context: event.node_id().map(|id| id.to_string()),
            lines: vec![self.paint(color, &event.to_string())],
        }
    }

    fn render_summary(&self, summary: &RunSummary) -> EventRender {
        let mut lines = vec![self.paint(CONTEXT_COLOR, &summary.to_string())];
        for report in summary.failed() {
            let message = report.error.as_deref().unwrap_or("unknown error");
            lines.push(self.paint(ERROR_COLOR, &format!("  {}: {message}", report.node_id)));
        }
        for report in summary.skipped() {
            if let Some(reason) = &report.skip {
                lines.push(self.paint(LINE_COLOR, &format!("  {}: skipped, {reason}", report.node_id)));
            }
        }
        EventRender {
            context: Some(summary.run_id.to_string()),
            lines,
        }
    }
}

/// Install the global `tracing` subscriber used by the engine.
///
/// The filter comes from `WIREFLOW_LOG`, falling back to `RUST_LOG`, then
/// to `warn,wireflow=info`. Safe to call more than once; later calls are
/// no-ops.
pub fn init() {
    let _ = try_init();
}

/// Like [`init`], but surfaces the error when a global subscriber is
/// already installed.
pub fn try_init() -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_env("WIREFLOW_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn,wireflow=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(ErrorLayer::default())
        .try_init()
}
