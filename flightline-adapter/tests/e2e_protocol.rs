//! End-to-end tests for the tool invocation protocol.
//!
//! Rather than requiring the real `lidar_flightline_overlap` binary, these
//! tests script a fake tool that speaks the same line protocol and exit
//! conventions, then assert the exact delivery sequence observed by the
//! sink: classified events in line order, one terminal outcome, and the
//! unconditional progress reset.
//!
//! The fake tool is a shell script, so this file is Unix-only.

#![cfg(unix)]

use async_trait::async_trait;
use flightline_adapter::{
    run_flightline, CancellationToken, EventSink, FlightlineCli, InvocationOutcome,
    InvocationRequest, OutputEvent, ToolConfig, CANCELLED_REASON, PROGRESS_RESET_LABEL,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::Mutex;

/// One sink delivery, in order of arrival.
#[derive(Debug, Clone, PartialEq)]
enum Delivery {
    Event(OutputEvent),
    Outcome(InvocationOutcome),
}

#[derive(Default)]
struct RecordingSink {
    deliveries: Mutex<Vec<Delivery>>,
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn event(&self, event: OutputEvent) {
        self.deliveries.lock().await.push(Delivery::Event(event));
    }

    async fn outcome(&self, outcome: &InvocationOutcome) {
        self.deliveries
            .lock()
            .await
            .push(Delivery::Outcome(outcome.clone()));
    }
}

impl RecordingSink {
    async fn snapshot(&self) -> Vec<Delivery> {
        self.deliveries.lock().await.clone()
    }
}

/// Writes an executable shell script standing in for the tool.
fn write_fake_tool(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake_overlap_tool");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake tool");
    let mut perms = std::fs::metadata(&path).expect("stat fake tool").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod fake tool");
    path
}

fn request(dir: &Path) -> InvocationRequest {
    InvocationRequest::new(dir.join("points.las"), dir.join("overlap.dep"), 2.0)
        .expect("valid request")
}

fn progress(label: &str, percent: i32) -> Delivery {
    Delivery::Event(OutputEvent::Progress {
        label: label.to_string(),
        percent,
    })
}

fn reset() -> Delivery {
    progress(PROGRESS_RESET_LABEL, 0)
}

#[tokio::test]
async fn happy_path_streams_events_then_success_then_reset() {
    let dir = TempDir::new().expect("temp dir");
    let tool = write_fake_tool(
        dir.path(),
        r#"echo "Computing overlap 10%"
echo "Computing overlap 55%"
echo "*internal note"
echo "Done"
exit 0"#,
    );
    let request = request(dir.path());
    let sink = RecordingSink::default();

    let outcome = run_flightline(
        &tool,
        &request,
        &ToolConfig::default(),
        &sink,
        CancellationToken::new(),
    )
    .await;

    assert_eq!(
        outcome,
        InvocationOutcome::Success {
            output_path: request.output.clone(),
        }
    );
    assert_eq!(
        sink.snapshot().await,
        vec![
            progress("Computing overlap", 10),
            progress("Computing overlap", 55),
            Delivery::Event(OutputEvent::Info {
                message: "Done".to_string(),
            }),
            Delivery::Outcome(outcome),
            reset(),
        ]
    );
}

#[tokio::test]
async fn error_line_outranks_the_exit_code_as_failure_reason() {
    let dir = TempDir::new().expect("temp dir");
    let tool = write_fake_tool(
        dir.path(),
        r#"echo "Error: bad LAS header"
exit 1"#,
    );
    let sink = RecordingSink::default();

    let outcome = run_flightline(
        &tool,
        &request(dir.path()),
        &ToolConfig::default(),
        &sink,
        CancellationToken::new(),
    )
    .await;

    assert_eq!(
        outcome,
        InvocationOutcome::Failure {
            reason: "Error: bad LAS header".to_string(),
        }
    );
    assert_eq!(
        sink.snapshot().await,
        vec![
            Delivery::Event(OutputEvent::Error {
                message: "Error: bad LAS header".to_string(),
            }),
            Delivery::Outcome(outcome),
            reset(),
        ]
    );
}

#[tokio::test]
async fn silent_abnormal_exit_reports_the_exit_code() {
    let dir = TempDir::new().expect("temp dir");
    let tool = write_fake_tool(dir.path(), "exit 2");
    let sink = RecordingSink::default();

    let outcome = run_flightline(
        &tool,
        &request(dir.path()),
        &ToolConfig::default(),
        &sink,
        CancellationToken::new(),
    )
    .await;

    assert_eq!(
        outcome,
        InvocationOutcome::Failure {
            reason: "tool exited with code 2".to_string(),
        }
    );
    assert_eq!(
        sink.snapshot().await,
        vec![Delivery::Outcome(outcome), reset()]
    );
}

#[tokio::test]
async fn stderr_joins_the_combined_line_stream() {
    let dir = TempDir::new().expect("temp dir");
    let tool = write_fake_tool(
        dir.path(),
        r#"echo "Interpolating 80%" 1>&2
exit 0"#,
    );
    let sink = RecordingSink::default();

    let outcome = run_flightline(
        &tool,
        &request(dir.path()),
        &ToolConfig::default(),
        &sink,
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(outcome, InvocationOutcome::Success { .. }));
    assert_eq!(
        sink.snapshot().await,
        vec![
            progress("Interpolating", 80),
            Delivery::Outcome(outcome),
            reset(),
        ]
    );
}

#[tokio::test]
async fn cancellation_kills_the_tool_and_reports_cancelled() {
    let dir = TempDir::new().expect("temp dir");
    let tool = write_fake_tool(dir.path(), "exec sleep 30");
    let sink = RecordingSink::default();
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let outcome = run_flightline(
        &tool,
        &request(dir.path()),
        &ToolConfig::default(),
        &sink,
        cancel,
    )
    .await;

    assert_eq!(
        outcome,
        InvocationOutcome::Failure {
            reason: CANCELLED_REASON.to_string(),
        }
    );
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "cancellation should terminate the tool promptly, took {:?}",
        started.elapsed()
    );
    assert_eq!(
        sink.snapshot().await,
        vec![Delivery::Outcome(outcome), reset()]
    );
}

#[tokio::test]
async fn timeout_kills_a_hung_tool() {
    let dir = TempDir::new().expect("temp dir");
    let tool = write_fake_tool(dir.path(), "exec sleep 30");
    let sink = RecordingSink::default();
    let config = ToolConfig {
        timeout: Some(Duration::from_millis(300)),
        ..ToolConfig::default()
    };

    let outcome = run_flightline(
        &tool,
        &request(dir.path()),
        &config,
        &sink,
        CancellationToken::new(),
    )
    .await;

    match &outcome {
        InvocationOutcome::Failure { reason } => {
            assert!(
                reason.starts_with("timed out"),
                "unexpected failure reason: {reason}"
            );
        }
        InvocationOutcome::Success { .. } => panic!("hung tool must not succeed"),
    }
    assert_eq!(
        sink.snapshot().await,
        vec![Delivery::Outcome(outcome), reset()]
    );
}

#[tokio::test]
async fn launch_failure_yields_only_the_outcome_and_reset() {
    let dir = TempDir::new().expect("temp dir");
    let missing = dir.path().join("no_such_tool");
    let sink = RecordingSink::default();

    let outcome = run_flightline(
        &missing,
        &request(dir.path()),
        &ToolConfig::default(),
        &sink,
        CancellationToken::new(),
    )
    .await;

    match &outcome {
        InvocationOutcome::Failure { reason } => {
            assert!(
                reason.contains("Failed to spawn"),
                "unexpected failure reason: {reason}"
            );
        }
        InvocationOutcome::Success { .. } => panic!("missing tool must not succeed"),
    }
    assert_eq!(
        sink.snapshot().await,
        vec![Delivery::Outcome(outcome), reset()]
    );
}

#[tokio::test]
async fn invalid_arguments_never_reach_the_process_layer() {
    // `run_flightline` only accepts a validated `InvocationRequest`, so a
    // bad parameter list fails before anything can spawn; the sink sees
    // nothing at all.
    let raw: Vec<String> = ["in.las", "out.dep", "2.0", "extra"]
        .iter()
        .map(ToString::to_string)
        .collect();
    let err = InvocationRequest::from_raw_args(&raw).expect_err("four args must fail");
    assert!(matches!(
        err,
        flightline_adapter::FlightlineError::InvalidArgumentCount {
            expected: 3,
            got: 4
        }
    ));
}

#[tokio::test]
async fn client_runs_through_the_same_delivery_contract() {
    let dir = TempDir::new().expect("temp dir");
    let tool = write_fake_tool(
        dir.path(),
        r#"echo "Binning points 100%"
exit 0"#,
    );
    let sink = RecordingSink::default();
    let cli = FlightlineCli::new(tool);

    let outcome = cli
        .run(&request(dir.path()), &ToolConfig::default(), &sink)
        .await;

    assert!(matches!(outcome, InvocationOutcome::Success { .. }));
    assert_eq!(
        sink.snapshot().await,
        vec![
            progress("Binning points", 100),
            Delivery::Outcome(outcome),
            reset(),
        ]
    );
}

#[tokio::test]
async fn concurrent_invocations_are_independent() {
    let dir = TempDir::new().expect("temp dir");
    let tool_a = write_fake_tool(dir.path(), "echo \"A 10%\"\nexit 0");

    let dir_b = TempDir::new().expect("temp dir");
    let tool_b = write_fake_tool(dir_b.path(), "echo \"B 20%\"\nexit 0");

    let request_a = request(dir.path());
    let request_b = request(dir_b.path());

    let sink_a = RecordingSink::default();
    let sink_b = RecordingSink::default();
    let config_a = ToolConfig::default();
    let config_b = ToolConfig::default();

    let (outcome_a, outcome_b) = tokio::join!(
        run_flightline(
            &tool_a,
            &request_a,
            &config_a,
            &sink_a,
            CancellationToken::new(),
        ),
        run_flightline(
            &tool_b,
            &request_b,
            &config_b,
            &sink_b,
            CancellationToken::new(),
        ),
    );

    assert!(matches!(outcome_a, InvocationOutcome::Success { .. }));
    assert!(matches!(outcome_b, InvocationOutcome::Success { .. }));
    assert_eq!(
        sink_a.snapshot().await,
        vec![progress("A", 10), Delivery::Outcome(outcome_a), reset()]
    );
    assert_eq!(
        sink_b.snapshot().await,
        vec![progress("B", 20), Delivery::Outcome(outcome_b), reset()]
    );
}
