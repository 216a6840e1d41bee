//! Subprocess execution with bounded time and guaranteed reaping

use super::readiness::AdbServerReadiness;
use super::traits::{BackendReadiness, CommandRunner};
use crate::config::BridgeConfig;
use adbridge_shared::{BridgeError, Invocation, InvocationResult};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs the adb executable, ensuring its server is up before each call
pub struct AdbRunner {
    program: PathBuf,
    readiness: Arc<dyn BackendReadiness>,
}

impl AdbRunner {
    /// Create a runner with the default `adb start-server` readiness check
    pub fn new(config: &BridgeConfig) -> Self {
        let readiness = AdbServerReadiness::new(config.adb_path.clone(), config.readiness_timeout);
        Self::with_readiness(config.adb_path.clone(), Arc::new(readiness))
    }

    /// Create a runner with an explicit readiness checker
    pub fn with_readiness(
        program: impl Into<PathBuf>,
        readiness: Arc<dyn BackendReadiness>,
    ) -> Self {
        Self {
            program: program.into(),
            readiness,
        }
    }

    /// Path of the executable
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The readiness checker shared with stream captures
    pub fn readiness(&self) -> Arc<dyn BackendReadiness> {
        self.readiness.clone()
    }

    /// Ensure the background service is running
    pub async fn ensure_ready(&self) -> Result<(), BridgeError> {
        self.readiness.ensure_ready().await
    }
}

#[async_trait]
impl CommandRunner for AdbRunner {
    async fn run(&self, invocation: &Invocation) -> Result<InvocationResult, BridgeError> {
        self.readiness.ensure_ready().await?;
        execute(&self.program, invocation).await
    }
}

/// Build the command for an invocation.
///
/// The child leads its own process group so that everything it forks can
/// be signalled together.
pub(crate) fn build_command(program: &Path, invocation: &Invocation) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(invocation.command_line())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

/// Spawn `program` for one invocation and wait for it within its timeout.
///
/// On timeout or I/O failure the whole process group is killed and the
/// child reaped before the error is returned.
pub async fn execute(
    program: &Path,
    invocation: &Invocation,
) -> Result<InvocationResult, BridgeError> {
    let command = invocation.describe();
    let mut child = build_command(program, invocation)
        .spawn()
        .map_err(|source| BridgeError::ExecutionFailure {
            command: command.clone(),
            source,
        })?;
    let pid = child.id();
    debug!(command = %command, pid = ?pid, "Spawned control tool");

    let outcome = timeout(invocation.timeout, collect_output(&mut child)).await;
    match outcome {
        Ok(Ok(result)) => {
            debug!(command = %command, exit_code = result.exit_code, "Control tool finished");
            Ok(result)
        }
        Ok(Err(source)) => {
            kill_tree(&mut child, pid).await;
            Err(BridgeError::ExecutionFailure { command, source })
        }
        Err(_) => {
            warn!(
                command = %command,
                timeout = ?invocation.timeout,
                "Control tool timed out, killing"
            );
            kill_tree(&mut child, pid).await;
            Err(BridgeError::Timeout {
                command,
                timeout: invocation.timeout,
            })
        }
    }
}

async fn collect_output(child: &mut Child) -> io::Result<InvocationResult> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (status, stdout, stderr) = tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr));
    let status = status?;

    Ok(InvocationResult {
        exit_code: status.code().unwrap_or(-1),
        stdout: stdout?.trim().to_string(),
        stderr: stderr?.trim().to_string(),
    })
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<String> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// SIGKILL the process group, then kill and reap the child itself
pub(crate) async fn kill_tree(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        if let Err(e) = signal_group(pid, Signal::Kill) {
            debug!(pid, "Process group already gone: {}", e);
        }
    }
    if let Err(e) = child.kill().await {
        debug!("Child already reaped: {}", e);
    }
}

/// Signals used to stop a process group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    Terminate,
    Kill,
}

#[cfg(unix)]
pub(crate) fn signal_group(pid: u32, signal: Signal) -> io::Result<()> {
    if pid == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid pid 0"));
    }
    let signal = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };

    // SAFETY: killpg only takes numeric arguments; `pid` is the non-zero id
    // of a child spawned as its own process group leader.
    let result = unsafe { libc::killpg(pid as libc::pid_t, signal) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn signal_group(_pid: u32, _signal: Signal) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process groups not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::AlwaysReady;
    use adbridge_shared::ErrorKind;
    use std::time::{Duration, Instant};

    fn sh(script: &str, timeout: Duration) -> Invocation {
        Invocation::broadcast(["-c", script], timeout)
    }

    fn process_exists(pid: i32) -> bool {
        // SAFETY: signal 0 only checks for existence.
        unsafe { libc::kill(pid, 0) == 0 }
    }

    #[tokio::test]
    async fn test_collects_exit_code_and_streams() {
        let inv = sh("echo hello; echo oops 1>&2; exit 3", Duration::from_secs(5));
        let result = execute(Path::new("sh"), &inv).await.unwrap();
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout, "hello");
        assert_eq!(result.stderr, "oops");
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_timeout_kills_and_reaps() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("echo $$ > '{}'; sleep 30", pid_file.display());
        let inv = sh(&script, Duration::from_millis(300));

        let started = Instant::now();
        let err = execute(Path::new("sh"), &inv).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(5));

        let pid: i32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        assert!(!process_exists(pid), "process {pid} outlived its invocation");
    }

    /// Dead or a zombie waiting for its new parent to reap it
    #[cfg(target_os = "linux")]
    fn is_dead(pid: i32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Err(_) => true,
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .map_or(true, |state| state == "Z" || state == "X"),
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("grandchild");
        let script = format!(
            "sh -c 'echo $$ > \"{}\"; sleep 30' & sleep 30",
            pid_file.display()
        );
        let inv = sh(&script, Duration::from_millis(500));

        let err = execute(Path::new("sh"), &inv).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let pid: i32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        // SIGKILL delivery is asynchronous
        let mut dead = is_dead(pid);
        for _ in 0..40 {
            if dead {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            dead = is_dead(pid);
        }
        assert!(dead, "grandchild {pid} survived the timeout");
    }

    #[tokio::test]
    async fn test_missing_program_is_execution_failure() {
        let inv = Invocation::broadcast(["devices"], Duration::from_secs(1));
        let err = execute(Path::new("/nonexistent/adbridge-adb"), &inv).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionFailure);
    }

    #[tokio::test]
    async fn test_runner_checks_readiness_first() {
        struct Down;

        #[async_trait]
        impl BackendReadiness for Down {
            async fn ensure_ready(&self) -> Result<(), BridgeError> {
                Err(BridgeError::BackendUnavailable("server refused to start".into()))
            }
        }

        let runner = AdbRunner::with_readiness("sh", Arc::new(Down));
        let err = runner.run(&sh("echo unreachable", Duration::from_secs(1))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    }

    #[tokio::test]
    async fn test_concurrent_invocations_are_independent() {
        let runner = Arc::new(AdbRunner::with_readiness("sh", Arc::new(AlwaysReady)));

        let slow = {
            let runner = runner.clone();
            tokio::spawn(async move {
                runner
                    .run(&sh("sleep 5", Duration::from_millis(200)))
                    .await
            })
        };
        let fast = runner.run(&sh("echo fast", Duration::from_secs(5))).await.unwrap();

        assert_eq!(fast.stdout, "fast");
        let slow = slow.await.unwrap().unwrap_err();
        assert_eq!(slow.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_run_command_prepends_target() {
        let runner = AdbRunner::with_readiness("echo", Arc::new(AlwaysReady));
        let result = runner
            .run_command("emulator-5554", &["shell", "getprop"], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.stdout, "-s emulator-5554 shell getprop");
    }
}
