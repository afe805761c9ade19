//! Shared data types for tool requests, configuration, events, and outcomes.

use crate::error::FlightlineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Palette file passed to the tool unless overridden.
pub const DEFAULT_PALETTE: &str = "light_quant.pal";

/// A validated request to run the flightline-overlap tool.
///
/// Construct with [`InvocationRequest::new`] or, when the three parameters
/// arrive as raw strings from a host dialog, with
/// [`InvocationRequest::from_raw_args`]. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// Input LAS point-cloud file.
    pub input: PathBuf,
    /// Output raster file.
    pub output: PathBuf,
    /// Output raster grid resolution in xy units.
    pub resolution: f64,
}

impl InvocationRequest {
    /// Creates a validated request.
    ///
    /// # Errors
    ///
    /// Returns `FlightlineError::EmptyPath` if either path is empty, or
    /// `FlightlineError::InvalidResolution` if the resolution is not a
    /// positive finite number.
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        resolution: f64,
    ) -> Result<Self, FlightlineError> {
        let input = input.into();
        let output = output.into();
        if input.as_os_str().is_empty() {
            return Err(FlightlineError::EmptyPath("input"));
        }
        if output.as_os_str().is_empty() {
            return Err(FlightlineError::EmptyPath("output"));
        }
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(FlightlineError::InvalidResolution(resolution.to_string()));
        }
        Ok(Self {
            input,
            output,
            resolution,
        })
    }

    /// Builds a request from exactly three raw parameters: input path,
    /// output path, and resolution string.
    ///
    /// # Errors
    ///
    /// Returns `FlightlineError::InvalidArgumentCount` for any other number
    /// of parameters, `FlightlineError::InvalidResolution` if the resolution
    /// does not parse as a positive finite number, or
    /// `FlightlineError::EmptyPath` for an empty path parameter.
    pub fn from_raw_args(args: &[String]) -> Result<Self, FlightlineError> {
        if args.len() != 3 {
            return Err(FlightlineError::InvalidArgumentCount {
                expected: 3,
                got: args.len(),
            });
        }
        let resolution = args[2]
            .trim()
            .parse::<f64>()
            .map_err(|_| FlightlineError::InvalidResolution(args[2].clone()))?;
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(FlightlineError::InvalidResolution(args[2].clone()));
        }
        Self::new(&args[0], &args[1], resolution)
    }
}

/// Configuration for a single tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Palette file name passed via `-palette`.
    pub palette: String,
    /// Whether to pass `-v` for verbose line output.
    pub verbose: bool,
    /// Working directory for the subprocess. Defaults to the executable's
    /// parent directory.
    pub working_dir: Option<PathBuf>,
    /// Maximum wall-clock duration before the tool is shut down. `None`
    /// means no limit; overlap runs on large point clouds can take hours.
    pub timeout: Option<Duration>,
    /// Extra environment variables passed to the subprocess.
    pub env: Vec<(String, String)>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            palette: DEFAULT_PALETTE.to_string(),
            verbose: true,
            working_dir: None,
            timeout: None,
            env: Vec::new(),
        }
    }
}

/// A classified line of tool output.
///
/// Events carry no identity beyond their emission order; hosts that render
/// a progress bar should reflect only the latest event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputEvent {
    /// A progress update parsed from a `%`-bearing line.
    Progress {
        /// Label text preceding the percent token.
        label: String,
        /// Parsed percent value.
        percent: i32,
    },
    /// An error reported by the tool, or a line whose percent token failed
    /// to parse.
    Error {
        /// The full offending line.
        message: String,
    },
    /// Any other line. Hosts render these as a status update with an
    /// implicit percent of zero.
    Info {
        /// The full line.
        message: String,
    },
}

/// Terminal result of one invocation. Exactly one is produced per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvocationOutcome {
    /// The tool exited cleanly; the artifact should be at `output_path`.
    /// The adapter does not verify the file exists.
    Success {
        /// Output path taken verbatim from the originating request.
        output_path: PathBuf,
    },
    /// The tool failed, was cancelled, or could not be launched.
    Failure {
        /// Human-readable failure reason.
        reason: String,
    },
}

/// Receiver for classified events and the terminal outcome of a run.
///
/// The adapter calls [`EventSink::event`] once per classified output line,
/// in line order, then [`EventSink::outcome`] exactly once, and finally one
/// more `event` with a `Progress { label: "Progress", percent: 0 }` reset.
/// Nothing is retained after delivery.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Delivers one classified output line.
    async fn event(&self, event: OutputEvent);

    /// Delivers the terminal outcome. Always the last delivery before the
    /// final progress reset.
    async fn outcome(&self, outcome: &InvocationOutcome);
}
