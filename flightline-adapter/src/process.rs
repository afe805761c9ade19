//! Subprocess execution and lifecycle management for the flightline tool.

use crate::error::FlightlineError;
use crate::parse::classify_line;
use crate::types::{EventSink, InvocationOutcome, InvocationRequest, OutputEvent, ToolConfig};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const CHANNEL_CAPACITY: usize = 100;
#[cfg(unix)]
const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Failure reason reported when an invocation is cancelled from outside.
pub const CANCELLED_REASON: &str = "cancelled";

/// Label of the unconditional progress reset issued after every run.
pub const PROGRESS_RESET_LABEL: &str = "Progress";

/// How the streaming loop ended.
enum StreamEnd {
    /// Both pipes reached EOF and every buffered line was delivered.
    Drained,
    /// Waiting on the child failed at the OS level.
    WaitFailed(std::io::Error),
    /// The caller's cancellation token fired.
    Cancelled,
    /// The configured wall-clock limit elapsed.
    TimedOut(Duration),
}

/// Runs one tool invocation, streaming classified output events to `sink`.
///
/// Events are delivered in line order; the terminal [`InvocationOutcome`] is
/// delivered to the sink exactly once after the last event, followed by an
/// unconditional progress reset, and is also returned. Launch failures,
/// abnormal exits, cancellation, and timeouts all surface as
/// `InvocationOutcome::Failure` rather than as errors; the stream protocol
/// never aborts across this boundary.
///
/// A runner invocation is single-use; run concurrent invocations by calling
/// this function once per request, each with its own executable path.
pub async fn run_flightline<S: EventSink + ?Sized>(
    path: &Path,
    request: &InvocationRequest,
    config: &ToolConfig,
    sink: &S,
    cancel: CancellationToken,
) -> InvocationOutcome {
    let outcome = match spawn_tool(path, request, config) {
        Ok(child) => stream_to_sink(child, request, config, sink, &cancel).await,
        Err(e) => {
            tracing::warn!(error = %e, tool = %path.display(), "failed to launch tool");
            InvocationOutcome::Failure {
                reason: e.to_string(),
            }
        }
    };

    sink.outcome(&outcome).await;
    // The host progress indicator is reset no matter how the run ended.
    sink.event(OutputEvent::Progress {
        label: PROGRESS_RESET_LABEL.to_string(),
        percent: 0,
    })
    .await;

    outcome
}

/// Spawns the tool with piped stdout/stderr and an explicit working
/// directory, so concurrent invocations never race on process-wide state.
fn spawn_tool(
    path: &Path,
    request: &InvocationRequest,
    config: &ToolConfig,
) -> Result<Child, FlightlineError> {
    let args = crate::cmd::build_args(request, config);

    let mut cmd = Command::new(path);
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match &config.working_dir {
        Some(dir) => {
            cmd.current_dir(dir);
        }
        None => {
            // The tool resolves its palette files relative to its own
            // installation directory.
            if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                cmd.current_dir(dir);
            }
        }
    }

    for (k, v) in &config.env {
        cmd.env(k, v);
    }

    tracing::debug!(tool = %path.display(), input = %request.input.display(), "spawning tool");
    cmd.spawn().map_err(|e| FlightlineError::SpawnFailed {
        stage: "spawn".to_string(),
        source: e,
    })
}

/// Pumps the combined output stream through the classifier into the sink
/// and converts the child's end state into an [`InvocationOutcome`].
async fn stream_to_sink<S: EventSink + ?Sized>(
    mut child: Child,
    request: &InvocationRequest,
    config: &ToolConfig,
    sink: &S,
    cancel: &CancellationToken,
) -> InvocationOutcome {
    let Some(stdout) = child.stdout.take() else {
        return InvocationOutcome::Failure {
            reason: FlightlineError::NoStdout.to_string(),
        };
    };
    let Some(stderr) = child.stderr.take() else {
        return InvocationOutcome::Failure {
            reason: FlightlineError::NoStderr.to_string(),
        };
    };
    let pid = child.id();

    // Both pipes funnel into one bounded channel so the combined stream
    // reaches the classifier line by line, with backpressure. The reader
    // tasks own the senders, which closes the channel once both pipes hit
    // EOF.
    let (line_tx, mut line_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let stderr_tx = line_tx.clone();
    let stdout_task = tokio::spawn(forward_lines(stdout, line_tx));
    let stderr_task = tokio::spawn(forward_lines(stderr, stderr_tx));

    let mut last_error: Option<String> = None;
    let mut exit_status: Option<ExitStatus> = None;

    let pump = async {
        loop {
            tokio::select! {
                maybe_line = line_rx.recv() => match maybe_line {
                    Some(line) => {
                        if let Some(event) = classify_line(&line) {
                            if let OutputEvent::Error { message } = &event {
                                last_error = Some(message.clone());
                            }
                            sink.event(event).await;
                        }
                    }
                    None => break StreamEnd::Drained,
                },
                status = child.wait(), if exit_status.is_none() => match status {
                    // Keep looping: buffered lines may still be in flight.
                    Ok(status) => exit_status = Some(status),
                    Err(e) => break StreamEnd::WaitFailed(e),
                },
                () = cancel.cancelled() => break StreamEnd::Cancelled,
            }
        }
    };

    let end = match config.timeout {
        Some(limit) => timeout(limit, pump)
            .await
            .unwrap_or(StreamEnd::TimedOut(limit)),
        None => pump.await,
    };

    let outcome = match end {
        StreamEnd::Drained => {
            let status = match exit_status {
                Some(status) => Ok(status),
                None => child.wait().await,
            };
            match status {
                Ok(status) => outcome_for_exit(status, last_error, request),
                Err(e) => wait_failure(e),
            }
        }
        StreamEnd::WaitFailed(e) => wait_failure(e),
        StreamEnd::Cancelled => {
            terminate(&mut child, pid).await;
            InvocationOutcome::Failure {
                reason: CANCELLED_REASON.to_string(),
            }
        }
        StreamEnd::TimedOut(limit) => {
            terminate(&mut child, pid).await;
            InvocationOutcome::Failure {
                reason: format!("timed out after {limit:?}"),
            }
        }
    };

    stdout_task.abort();
    stderr_task.abort();

    outcome
}

/// Reads one pipe line-buffered, forwarding each line as soon as it is
/// complete.
async fn forward_lines(stream: impl AsyncRead + Unpin + Send + 'static, tx: mpsc::Sender<String>) {
    let mut reader = BufReader::new(stream).lines();
    while let Ok(Some(line)) = reader.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}

/// Maps the child's exit status to the terminal outcome. An explicit error
/// line observed during streaming takes priority over the raw exit code.
fn outcome_for_exit(
    status: ExitStatus,
    last_error: Option<String>,
    request: &InvocationRequest,
) -> InvocationOutcome {
    if status.success() {
        return InvocationOutcome::Success {
            output_path: request.output.clone(),
        };
    }
    let reason = last_error.unwrap_or_else(|| match status.code() {
        Some(code) => format!("tool exited with code {code}"),
        None => "tool terminated by signal".to_string(),
    });
    InvocationOutcome::Failure { reason }
}

fn wait_failure(source: std::io::Error) -> InvocationOutcome {
    InvocationOutcome::Failure {
        reason: reap_error("wait", source).to_string(),
    }
}

/// Best-effort shutdown; falls back to a hard kill if graceful shutdown
/// fails.
async fn terminate(child: &mut Child, pid: Option<u32>) {
    if let Err(e) = shutdown_child(child, pid).await {
        tracing::warn!(error = %e, "tool did not shut down cleanly");
        let _ = child.kill().await;
    }
}

fn reap_error(stage: &str, source: std::io::Error) -> FlightlineError {
    FlightlineError::SpawnFailed {
        stage: stage.to_string(),
        source,
    }
}

/// Asks the tool to stop with `SIGTERM`, escalating to `SIGKILL` when it
/// is still running after `GRACE_PERIOD`.
#[cfg(unix)]
async fn shutdown_child(child: &mut Child, pid: Option<u32>) -> Result<(), FlightlineError> {
    use nix::sys::signal::Signal;

    send_signal(pid, Signal::SIGTERM)?;
    if let Ok(waited) = timeout(GRACE_PERIOD, child.wait()).await {
        waited.map_err(|e| reap_error("reap after SIGTERM", e))?;
        return Ok(());
    }

    tracing::warn!(pid, "tool still running after SIGTERM, escalating");
    send_signal(pid, Signal::SIGKILL)?;
    child
        .wait()
        .await
        .map_err(|e| reap_error("reap after SIGKILL", e))
        .map(drop)
}

#[cfg(unix)]
fn send_signal(pid: Option<u32>, signal: nix::sys::signal::Signal) -> Result<(), FlightlineError> {
    let pid = pid.ok_or(FlightlineError::NoPid)?;
    let target = i32::try_from(pid)
        .map(nix::unistd::Pid::from_raw)
        .map_err(|e| FlightlineError::SignalFailed {
            signal: signal.as_str().to_string(),
            pid,
            reason: e.to_string(),
        })?;
    nix::sys::signal::kill(target, signal).map_err(|errno| FlightlineError::SignalFailed {
        signal: signal.as_str().to_string(),
        pid,
        reason: errno.to_string(),
    })
}

/// Windows has no `SIGTERM` equivalent for console children, so the tool
/// is stopped outright.
#[cfg(windows)]
async fn shutdown_child(child: &mut Child, _pid: Option<u32>) -> Result<(), FlightlineError> {
    child.kill().await.map_err(|e| reap_error("kill", e))?;
    child
        .wait()
        .await
        .map_err(|e| reap_error("reap after kill", e))
        .map(drop)
}
