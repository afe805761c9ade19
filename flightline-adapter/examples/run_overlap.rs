//! Runs the flightline-overlap tool against a LAS file, printing protocol
//! events as they arrive.
//!
//! ```bash
//! cargo run --example run_overlap -- points.las overlap.dep 2.0
//! ```
//!
//! The tool executable is resolved from `FLIGHTLINE_TOOL_BIN`, `$PATH`, or
//! common install locations.

use async_trait::async_trait;
use flightline_adapter::{
    EventSink, FlightlineCli, InvocationOutcome, InvocationRequest, OutputEvent, ToolConfig,
};

struct PrintSink;

#[async_trait]
impl EventSink for PrintSink {
    async fn event(&self, event: OutputEvent) {
        match event {
            OutputEvent::Progress { label, percent } => println!("[{percent:>3}%] {label}"),
            OutputEvent::Error { message } => eprintln!("ERROR: {message}"),
            OutputEvent::Info { message } => println!("       {message}"),
        }
    }

    async fn outcome(&self, _outcome: &InvocationOutcome) {}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let request = InvocationRequest::from_raw_args(&args)?;

    let cli = FlightlineCli::discover()?;
    match cli.run(&request, &ToolConfig::default(), &PrintSink).await {
        InvocationOutcome::Success { output_path } => {
            println!("wrote {}", output_path.display());
            Ok(())
        }
        InvocationOutcome::Failure { reason } => anyhow::bail!(reason),
    }
}
