//! Error taxonomy for tool invocations and stream capture
//!
//! Malformed text lines are not errors: the parsers skip them silently.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the runner, the aggregator and the stream capture
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The process was killed and reaped before this was returned
    #[error("Command `{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Failed to run `{command}`: {source}")]
    ExecutionFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Control tool backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Command `{command}` exited with code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Failed to write capture to {}: {source}", path.display())]
    CaptureWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Fieldless classification of a [`BridgeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    ExecutionFailure,
    BackendUnavailable,
    CommandFailed,
    CaptureWriteFailure,
    InvalidArgument,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Timeout { .. } => ErrorKind::Timeout,
            BridgeError::ExecutionFailure { .. } => ErrorKind::ExecutionFailure,
            BridgeError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            BridgeError::CommandFailed { .. } => ErrorKind::CommandFailed,
            BridgeError::CaptureWriteFailure { .. } => ErrorKind::CaptureWriteFailure,
            BridgeError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    /// Build a `CommandFailed` from a finished invocation
    pub fn command_failed(command: impl Into<String>, exit_code: i32, stderr: &str) -> Self {
        BridgeError::CommandFailed {
            command: command.into(),
            exit_code,
            stderr: stderr.trim().to_string(),
        }
    }
}
