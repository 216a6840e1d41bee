//! Entry points consumed by the dispatch layer

use crate::actions::ActionContext;
use crate::capture::{CaptureReport, StreamCapture};
use crate::config::BridgeConfig;
use crate::runner::{AdbRunner, CommandRunner};
use crate::telemetry::{DeviceListing, TelemetryAggregator};
use adbridge_shared::{BridgeError, Invocation, InvocationResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Wires the runner, aggregator, capture and actions around one config.
///
/// Every call is independent; a `Bridge` can be shared across tasks.
pub struct Bridge {
    config: BridgeConfig,
    runner: Arc<AdbRunner>,
    aggregator: TelemetryAggregator,
    capture: StreamCapture,
    actions: ActionContext,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        let runner = Arc::new(AdbRunner::new(&config));
        Self::with_runner(config, runner)
    }

    pub fn with_runner(config: BridgeConfig, runner: Arc<AdbRunner>) -> Self {
        let dyn_runner: Arc<dyn CommandRunner> = runner.clone();
        Self {
            aggregator: TelemetryAggregator::new(dyn_runner.clone(), &config),
            capture: StreamCapture::new(&runner, &config),
            actions: ActionContext::new(dyn_runner, config.clone()),
            runner,
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Run one tool invocation; `timeout` falls back to the default
    pub async fn run_command(
        &self,
        target: &str,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<InvocationResult, BridgeError> {
        let timeout = timeout.unwrap_or(self.config.default_timeout);
        self.runner
            .run(&Invocation::new(target, args.iter().copied(), timeout))
            .await
    }

    /// Describe every attached device
    pub async fn list_devices(&self) -> Result<DeviceListing, BridgeError> {
        self.aggregator.list_devices().await
    }

    /// Capture a device's log for `duration` into `sink` (or a default
    /// file in the output directory)
    pub async fn capture_stream(
        &self,
        serial: &str,
        duration: Duration,
        sink: Option<&Path>,
        cancel: CancellationToken,
    ) -> Result<CaptureReport, BridgeError> {
        let sink: PathBuf = sink.map(Path::to_path_buf).unwrap_or_else(|| {
            self.config
                .artifact_path(&crate::actions::file_safe(serial), "logcat", "log")
        });
        self.capture
            .capture_logs(serial, duration, &sink, cancel)
            .await
    }

    pub fn actions(&self) -> &ActionContext {
        &self.actions
    }
}
