//! Stream capture session
//!
//! Reads a long-running process line by line until the deadline passes,
//! the caller cancels or the source closes. All three exits share one
//! termination path: SIGTERM, a short grace period, then SIGKILL.

use crate::config::BridgeConfig;
use crate::runner::{build_command, kill_tree, signal_group, AdbRunner, BackendReadiness, Signal};
use adbridge_shared::state_machine::{
    CaptureEnd, CaptureEvent, CaptureStateMachine, TransitionResult,
};
use adbridge_shared::{BridgeError, Invocation};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of a completed capture
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    pub sink_path: PathBuf,
    pub elapsed_seconds: f64,
    pub lines: usize,
    pub end: CaptureEnd,
}

/// Captures bounded slices of a streaming command
pub struct StreamCapture {
    program: PathBuf,
    readiness: Arc<dyn BackendReadiness>,
    poll_interval: Duration,
    termination_grace: Duration,
}

impl StreamCapture {
    /// Share the runner's executable and readiness check
    pub fn new(runner: &AdbRunner, config: &BridgeConfig) -> Self {
        Self {
            program: runner.program().to_path_buf(),
            readiness: runner.readiness(),
            poll_interval: config.poll_interval,
            termination_grace: config.termination_grace,
        }
    }

    /// Capture `logcat` output of one device into `sink`
    pub async fn capture_logs(
        &self,
        serial: &str,
        duration: Duration,
        sink: &Path,
        cancel: CancellationToken,
    ) -> Result<CaptureReport, BridgeError> {
        self.capture(serial, &["logcat"], duration, sink, cancel).await
    }

    /// Capture the output of `args` for at most `duration`.
    ///
    /// Returns after the source process has been terminated and the buffer
    /// written. A write failure is reported as `CaptureWriteFailure`.
    pub async fn capture(
        &self,
        target: &str,
        args: &[&str],
        duration: Duration,
        sink: &Path,
        cancel: CancellationToken,
    ) -> Result<CaptureReport, BridgeError> {
        self.readiness.ensure_ready().await?;

        let invocation = Invocation::new(target, args.iter().copied(), duration);
        let command = invocation.describe();
        let mut child = build_command(&self.program, &invocation)
            .spawn()
            .map_err(|source| BridgeError::ExecutionFailure {
                command: command.clone(),
                source,
            })?;
        let pid = child.id();

        let mut fsm = CaptureStateMachine::new();
        fsm.start(Instant::now(), duration);
        info!(command = %command, ?duration, "Stream capture started");

        let stderr_drain = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("stream stderr: {}", line);
                }
            })
        });

        let mut buffer = Vec::new();
        match child.stdout.take() {
            Some(stdout) => self.pump(&mut fsm, stdout, &mut buffer, &cancel).await,
            None => record(&mut fsm, CaptureEvent::ReadFailed),
        }

        // Runs whatever happened while reading
        self.terminate(&mut child, pid).await;
        if let Some(drain) = stderr_drain {
            drain.abort();
        }
        record(&mut fsm, CaptureEvent::ProcessTerminated);

        let elapsed = fsm.elapsed(Instant::now());
        let end = fsm.end().unwrap_or(CaptureEnd::SourceClosed);
        info!(
            command = %command,
            lines = buffer.len(),
            ?end,
            "Stream capture finished after {:.1}s",
            elapsed.as_secs_f64()
        );

        write_sink(sink, &buffer).await?;

        Ok(CaptureReport {
            sink_path: sink.to_path_buf(),
            elapsed_seconds: elapsed.as_secs_f64(),
            lines: buffer.len(),
            end,
        })
    }

    async fn pump<R: AsyncRead + Unpin>(
        &self,
        fsm: &mut CaptureStateMachine,
        source: R,
        buffer: &mut Vec<String>,
        cancel: &CancellationToken,
    ) {
        let mut reader = BufReader::new(source);
        // Partial line carried across timed-out reads
        let mut pending = Vec::new();

        while fsm.is_capturing() {
            let now = Instant::now();
            if fsm.check_deadline(now) {
                break;
            }
            let bound = fsm.read_bound(now, self.poll_interval);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => record(fsm, CaptureEvent::CancelRequested),
                read = timeout(bound, reader.read_until(b'\n', &mut pending)) => match read {
                    Err(_) => record(fsm, CaptureEvent::ReadTimedOut),
                    Ok(Ok(0)) => record(fsm, CaptureEvent::EndOfStream),
                    Ok(Ok(_)) => {
                        buffer.push(String::from_utf8_lossy(&pending).into_owned());
                        pending.clear();
                        record(fsm, CaptureEvent::ChunkRead);
                    }
                    Ok(Err(e)) => {
                        warn!("Error reading stream output: {}", e);
                        record(fsm, CaptureEvent::ReadFailed);
                    }
                },
            }
        }

        if !pending.is_empty() {
            buffer.push(String::from_utf8_lossy(&pending).into_owned());
        }
    }

    /// SIGTERM the group, wait for the grace period, then SIGKILL
    async fn terminate(&self, child: &mut Child, pid: Option<u32>) {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(?status, "Stream source already exited");
                if let Some(pid) = pid {
                    kill_stragglers(pid);
                }
                return;
            }
            Ok(None) => {}
            Err(e) => debug!("Could not poll stream source: {}", e),
        }

        let signalled = pid.map(|pid| signal_group(pid, Signal::Terminate));
        if !matches!(signalled, Some(Ok(()))) {
            if let Err(e) = child.start_kill() {
                debug!("Failed to signal stream source: {}", e);
            }
        }

        match timeout(self.termination_grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(?status, "Stream source terminated");
                if let Some(pid) = pid {
                    kill_stragglers(pid);
                }
            }
            Ok(Err(e)) => {
                warn!("Failed waiting for stream source: {}", e);
                kill_tree(child, pid).await;
            }
            Err(_) => {
                warn!(grace = ?self.termination_grace, "Stream source ignored SIGTERM, killing");
                kill_tree(child, pid).await;
            }
        }
    }
}

/// SIGKILL whatever is left in the group once the leader has exited
fn kill_stragglers(pid: u32) {
    if let Err(e) = signal_group(pid, Signal::Kill) {
        debug!(pid, "No stragglers left in process group: {}", e);
    }
}

fn record(fsm: &mut CaptureStateMachine, event: CaptureEvent) {
    if let TransitionResult::Invalid { from, event } = fsm.process_event(event) {
        debug!(?from, ?event, "Ignoring capture event");
    }
}

async fn write_sink(path: &Path, buffer: &[String]) -> Result<(), BridgeError> {
    let fail = |source| BridgeError::CaptureWriteFailure {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    tokio::fs::write(path, buffer.concat()).await.map_err(fail)
}
