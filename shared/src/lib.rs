//! adbridge Shared Types
//!
//! This crate provides the runtime-free pieces shared by the command runner,
//! the telemetry aggregator and the stream capture: the invocation model,
//! the device record, the error taxonomy and the text parsers.

pub mod error;
pub mod parse;
pub mod record;
pub mod state_machine;

use std::collections::HashMap;
use std::time::Duration;

pub use error::{BridgeError, ErrorKind};
pub use record::{
    BatteryInfo, ConnectionType, DeviceInfo, DeviceRecord, HardwareInfo, NetworkInfo, OsInfo,
};

/// Placeholder for any telemetry field that could not be resolved
pub const UNKNOWN: &str = "Unknown";

/// Key/value pairs extracted from one text blob
pub type PropertyMap = HashMap<String, String>;

/// Timing bounds for tool invocations
pub mod limits {
    use std::time::Duration;

    /// Default bound for simple queries
    pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

    /// Bound for the device listing call
    pub const LIST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Bound for the background service readiness check
    pub const READINESS_TIMEOUT: Duration = Duration::from_secs(30);

    /// Upper bound on a single read while capturing a stream
    pub const STREAM_POLL_INTERVAL: Duration = Duration::from_millis(500);

    /// Time a captured process gets to exit after SIGTERM before SIGKILL
    pub const TERMINATION_GRACE: Duration = Duration::from_secs(2);

    /// Default stream capture duration
    pub const DEFAULT_CAPTURE_DURATION: Duration = Duration::from_secs(10);

    /// Bound for file transfers to and from a device
    pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(120);

    /// Bound for package installation
    pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(180);

    /// Longest recording `screenrecord` accepts, in seconds
    pub const MAX_SCREEN_RECORD_SECS: u32 = 180;
}

/// One bounded execution of the control tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Device serial; empty for commands not bound to a device
    pub target: String,
    /// Arguments passed after the target selector, in order
    pub args: Vec<String>,
    /// Hard bound on the execution time
    pub timeout: Duration,
}

impl Invocation {
    /// Create an invocation against one device
    pub fn new<I, S>(target: impl Into<String>, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target: target.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    /// Create an invocation that is not bound to a device (e.g. `devices -l`)
    pub fn broadcast<I, S>(args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(String::new(), args, timeout)
    }

    /// Full argument vector handed to the tool, including `-s <target>`
    pub fn command_line(&self) -> Vec<String> {
        let mut line = Vec::with_capacity(self.args.len() + 2);
        if !self.target.is_empty() {
            line.push("-s".to_string());
            line.push(self.target.clone());
        }
        line.extend(self.args.iter().cloned());
        line
    }

    /// Human-readable rendering used in logs and error messages
    pub fn describe(&self) -> String {
        self.command_line().join(" ")
    }
}

/// Output of a completed invocation
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct InvocationResult {
    /// Process exit code; -1 when the process was terminated by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl InvocationResult {
    /// Whether the tool reported success
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Whether the tool succeeded and printed something
    pub fn has_output(&self) -> bool {
        self.success() && !self.stdout.trim().is_empty()
    }
}
