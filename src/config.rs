//! Runtime configuration for the bridge

use adbridge_shared::limits;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Environment variable overriding the control tool path
pub const ENV_ADB_PATH: &str = "ADBRIDGE_ADB_PATH";
/// Environment variable overriding the default command timeout (seconds)
pub const ENV_TIMEOUT_SECS: &str = "ADBRIDGE_TIMEOUT_SECS";
/// Environment variable overriding where default artifacts are written
pub const ENV_OUTPUT_DIR: &str = "ADBRIDGE_OUTPUT_DIR";

/// Configuration for the runner, the aggregator and the stream capture
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Control tool executable (looked up on PATH when relative)
    pub adb_path: PathBuf,
    /// Bound for simple queries
    pub default_timeout: Duration,
    /// Bound for the device listing call
    pub list_timeout: Duration,
    /// Bound for the background service readiness check
    pub readiness_timeout: Duration,
    /// Upper bound on a single read while capturing
    pub poll_interval: Duration,
    /// Time between SIGTERM and SIGKILL when stopping a capture
    pub termination_grace: Duration,
    /// Directory for screenshots, recordings and logs without an explicit path
    pub output_dir: PathBuf,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            adb_path: PathBuf::from("adb"),
            default_timeout: limits::DEFAULT_COMMAND_TIMEOUT,
            list_timeout: limits::LIST_TIMEOUT,
            readiness_timeout: limits::READINESS_TIMEOUT,
            poll_interval: limits::STREAM_POLL_INTERVAL,
            termination_grace: limits::TERMINATION_GRACE,
            output_dir: std::env::temp_dir(),
        }
    }
}

impl BridgeConfig {
    /// Defaults overlaid with `ADBRIDGE_*` environment variables
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup(ENV_ADB_PATH).filter(|p| !p.trim().is_empty()) {
            self.adb_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.default_timeout = Duration::from_secs(secs),
                _ => warn!("Ignoring invalid {}={:?}", ENV_TIMEOUT_SECS, raw),
            }
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR).filter(|d| !d.trim().is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
        self
    }

    /// Default artifact path: `<output_dir>/<serial>_<kind>_<unix secs>.<ext>`
    pub fn artifact_path(&self, serial: &str, kind: &str, extension: &str) -> PathBuf {
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.output_dir
            .join(format!("{serial}_{kind}_{stamp}.{extension}"))
    }
}
