//! Background service readiness

use super::process::execute;
use super::traits::BackendReadiness;
use adbridge_shared::{BridgeError, Invocation};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Starts the adb server once per readiness instance.
///
/// Concurrent callers wait on the same start attempt; a failed attempt is
/// not remembered, so the next call tries again.
pub struct AdbServerReadiness {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    ready: OnceCell<()>,
}

impl AdbServerReadiness {
    /// Run `<program> start-server` on first use
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self::with_args(program, ["start-server"], timeout)
    }

    /// Use a custom start command
    pub fn with_args<I, S>(program: impl Into<PathBuf>, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
            ready: OnceCell::new(),
        }
    }

    /// Whether a start attempt has already succeeded
    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    async fn start(&self) -> Result<(), BridgeError> {
        let invocation = Invocation::broadcast(self.args.clone(), self.timeout);
        debug!(command = %invocation.describe(), "Starting control tool backend");

        match execute(&self.program, &invocation).await {
            Ok(result) if result.success() => {
                info!("Control tool backend ready");
                Ok(())
            }
            Ok(result) => Err(BridgeError::BackendUnavailable(format!(
                "`{}` exited with code {}: {}",
                invocation.describe(),
                result.exit_code,
                result.stderr
            ))),
            Err(e) => Err(BridgeError::BackendUnavailable(e.to_string())),
        }
    }
}

#[async_trait]
impl BackendReadiness for AdbServerReadiness {
    async fn ensure_ready(&self) -> Result<(), BridgeError> {
        self.ready.get_or_try_init(|| self.start()).await?;
        Ok(())
    }
}

/// Readiness for tools without a background service
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysReady;

#[async_trait]
impl BackendReadiness for AlwaysReady {
    async fn ensure_ready(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adbridge_shared::ErrorKind;

    #[tokio::test]
    async fn test_second_call_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("starts");
        let script = format!("echo started >> '{}'", marker.display());
        let readiness =
            AdbServerReadiness::with_args("sh", ["-c", script.as_str()], Duration::from_secs(5));

        assert!(!readiness.is_ready());
        readiness.ensure_ready().await.unwrap();
        readiness.ensure_ready().await.unwrap();
        assert!(readiness.is_ready());

        let contents = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_failed_start_is_backend_unavailable() {
        let readiness =
            AdbServerReadiness::with_args("sh", ["-c", "exit 3"], Duration::from_secs(5));
        let err = readiness.ensure_ready().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert!(!readiness.is_ready());
    }

    #[tokio::test]
    async fn test_missing_tool_is_backend_unavailable() {
        let readiness =
            AdbServerReadiness::new("/nonexistent/adbridge-adb", Duration::from_secs(5));
        let err = readiness.ensure_ready().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    }

    #[tokio::test]
    async fn test_hung_start_times_out() {
        let readiness =
            AdbServerReadiness::with_args("sh", ["-c", "sleep 10"], Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = readiness.ensure_ready().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
