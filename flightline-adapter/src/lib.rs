//! Rust adapter for driving the Whitebox `lidar_flightline_overlap`
//! geoprocessing tool as a subprocess.
//!
//! This crate provides discovery, validation, and execution of the
//! `lidar_flightline_overlap` command-line tool, with near-real-time
//! classification of its line-oriented progress protocol and support for
//! cancellation and timeouts. Host applications implement [`EventSink`] to
//! receive progress, error, and info events as the tool emits them, plus a
//! single terminal outcome per invocation.

/// Command-line argument construction for tool invocations.
pub mod cmd;
/// Discovery and resolution of the tool executable path.
pub mod discovery;
/// Error types returned by adapter operations.
pub mod error;
/// Classification of tool output lines into structured events.
pub mod parse;
/// Subprocess execution with streaming, cancellation, and signal handling.
pub mod process;
/// Shared data types for requests, configuration, events, and outcomes.
pub mod types;

pub use discovery::{discover_tool, tool_in_dir, FLIGHTLINE_BIN_ENV_VAR, TOOL_NAME};
pub use error::FlightlineError;
pub use parse::classify_line;
pub use process::{run_flightline, CANCELLED_REASON, PROGRESS_RESET_LABEL};
pub use tokio_util::sync::CancellationToken;
pub use types::*;

/// High-level client for the flightline-overlap tool.
#[derive(Clone)]
pub struct FlightlineCli {
    /// Filesystem path to the tool executable.
    pub path: std::path::PathBuf,
}

impl FlightlineCli {
    /// Creates a new `FlightlineCli` from a resolved executable path.
    #[must_use]
    pub const fn new(path: std::path::PathBuf) -> Self {
        Self { path }
    }

    /// Locates the tool executable and creates a client for it.
    ///
    /// # Errors
    ///
    /// Returns `FlightlineError::ExecutableNotFound` when the tool cannot
    /// be located.
    pub fn discover() -> Result<Self, FlightlineError> {
        discover_tool(None).map(Self::new)
    }

    /// Runs one invocation to completion, streaming events to `sink`.
    ///
    /// The returned outcome is also delivered to the sink; see
    /// [`run_flightline`] for the delivery contract.
    pub async fn run<S: EventSink + ?Sized>(
        &self,
        request: &InvocationRequest,
        config: &ToolConfig,
        sink: &S,
    ) -> InvocationOutcome {
        run_flightline(&self.path, request, config, sink, CancellationToken::new()).await
    }

    /// Like [`FlightlineCli::run`], but the invocation can be cancelled
    /// externally. Cancelling kills the tool and yields a terminal
    /// `Failure` with reason [`CANCELLED_REASON`].
    pub async fn run_with_cancel<S: EventSink + ?Sized>(
        &self,
        request: &InvocationRequest,
        config: &ToolConfig,
        sink: &S,
        cancel: CancellationToken,
    ) -> InvocationOutcome {
        run_flightline(&self.path, request, config, sink, cancel).await
    }
}
