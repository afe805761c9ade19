use thiserror::Error;

/// Errors returned by adapter operations.
#[derive(Debug, Error)]
pub enum FlightlineError {
    #[error("Incorrect number of arguments: expected {expected}, got {got}")]
    InvalidArgumentCount { expected: usize, got: usize },

    #[error("Invalid grid resolution: {0:?}")]
    InvalidResolution(String),

    #[error("The {0} path must not be empty")]
    EmptyPath(&'static str),

    #[error("Flightline tool executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Failed to spawn process at stage '{stage}': {source}")]
    SpawnFailed {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Child process stdout was not captured")]
    NoStdout,

    #[error("Child process stderr was not captured")]
    NoStderr,

    #[error("Could not get PID from child process")]
    NoPid,

    #[error("Failed to send signal {signal} to PID {pid}: {reason}")]
    SignalFailed {
        signal: String,
        pid: u32,
        reason: String,
    },
}
