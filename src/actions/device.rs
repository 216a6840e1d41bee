//! Power, screen and shell actions

use super::files::{pull_file, remove_file};
use super::{file_safe, ActionContext};
use crate::telemetry::network;
use adbridge_shared::{limits, BridgeError, Invocation, InvocationResult, NetworkInfo};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Target of a reboot request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebootMode {
    #[default]
    Normal,
    Bootloader,
    Recovery,
    Sideload,
}

impl RebootMode {
    fn arg(&self) -> Option<&'static str> {
        match self {
            RebootMode::Normal => None,
            RebootMode::Bootloader => Some("bootloader"),
            RebootMode::Recovery => Some("recovery"),
            RebootMode::Sideload => Some("sideload"),
        }
    }
}

impl FromStr for RebootMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "normal" | "system" => Ok(RebootMode::Normal),
            "bootloader" => Ok(RebootMode::Bootloader),
            "recovery" => Ok(RebootMode::Recovery),
            "sideload" => Ok(RebootMode::Sideload),
            other => Err(BridgeError::InvalidArgument(format!(
                "unknown reboot mode '{other}' (expected bootloader, recovery or sideload)"
            ))),
        }
    }
}

/// Reboot a device, optionally into a special mode
pub async fn reboot(
    ctx: &ActionContext,
    serial: &str,
    mode: RebootMode,
) -> Result<(), BridgeError> {
    let mut args = vec!["reboot"];
    args.extend(mode.arg());
    ctx.run_checked(serial, &args).await?;
    info!(serial, ?mode, "Device rebooting");
    Ok(())
}

/// Power a device off
pub async fn shutdown(ctx: &ActionContext, serial: &str) -> Result<(), BridgeError> {
    ctx.run_checked(serial, &["reboot", "-p"]).await?;
    info!(serial, "Device shutting down");
    Ok(())
}

/// Clear the device log buffer
pub async fn clear_logs(ctx: &ActionContext, serial: &str) -> Result<(), BridgeError> {
    ctx.run_checked(serial, &["logcat", "-c"]).await?;
    Ok(())
}

/// Run a shell command on the device. The exit code is returned, not judged.
pub async fn execute_shell(
    ctx: &ActionContext,
    serial: &str,
    command: &str,
) -> Result<InvocationResult, BridgeError> {
    if command.trim().is_empty() {
        return Err(BridgeError::InvalidArgument("empty shell command".into()));
    }
    let invocation = Invocation::new(serial, ["shell", command], ctx.config.default_timeout);
    ctx.runner.run(&invocation).await
}

/// Capture the screen as PNG and copy it to `local` (or the output directory)
pub async fn take_screenshot(
    ctx: &ActionContext,
    serial: &str,
    local: Option<&Path>,
) -> Result<PathBuf, BridgeError> {
    let device_path = format!("/sdcard/{}_screenshot.png", file_safe(serial));
    ctx.run_checked(serial, &["shell", "screencap", "-p", device_path.as_str()])
        .await?;

    let local = local
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ctx.config.artifact_path(&file_safe(serial), "screenshot", "png"));
    fetch_and_remove(ctx, serial, &device_path, &local).await
}

/// Record the screen for `seconds` and copy the video locally
pub async fn screen_record(
    ctx: &ActionContext,
    serial: &str,
    seconds: u32,
    local: Option<&Path>,
) -> Result<PathBuf, BridgeError> {
    if seconds == 0 || seconds > limits::MAX_SCREEN_RECORD_SECS {
        return Err(BridgeError::InvalidArgument(format!(
            "recording length must be 1..={} seconds, got {seconds}",
            limits::MAX_SCREEN_RECORD_SECS
        )));
    }

    let device_path = format!("/sdcard/{}_video_recording.mp4", file_safe(serial));
    let limit = seconds.to_string();
    ctx.run_checked_with(
        serial,
        &["shell", "screenrecord", "--time-limit", limit.as_str(), device_path.as_str()],
        Duration::from_secs(u64::from(seconds) * 2),
    )
    .await?;

    let local = local
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ctx.config.artifact_path(&file_safe(serial), "video", "mp4"));
    fetch_and_remove(ctx, serial, &device_path, &local).await
}

/// Dump the current UI hierarchy as XML and copy it locally
pub async fn dump_screen(
    ctx: &ActionContext,
    serial: &str,
    local: Option<&Path>,
) -> Result<PathBuf, BridgeError> {
    let device_path = format!("/sdcard/{}_window_dump.xml", file_safe(serial));
    ctx.run_checked(serial, &["shell", "uiautomator", "dump", device_path.as_str()])
        .await?;

    let local = local
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ctx.config.artifact_path(&file_safe(serial), "window_dump", "xml"));
    fetch_and_remove(ctx, serial, &device_path, &local).await
}

/// Network section of one device, resolved with the same fallbacks as
/// the device listing
pub async fn network_details(ctx: &ActionContext, serial: &str) -> NetworkInfo {
    network::resolve(ctx.runner.as_ref(), serial, ctx.config.default_timeout).await
}

/// Pull a device-side artifact, then delete it from the device.
/// A failed delete is only logged.
async fn fetch_and_remove(
    ctx: &ActionContext,
    serial: &str,
    device_path: &str,
    local: &Path,
) -> Result<PathBuf, BridgeError> {
    let local = pull_file(ctx, serial, device_path, Some(local)).await?;
    if let Err(e) = remove_file(ctx, serial, device_path).await {
        warn!(serial, device_path, "Failed to remove device-side artifact: {}", e);
    }
    Ok(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::tests::context;
    use crate::runner::testing::{Reply, ScriptedRunner};
    use adbridge_shared::ErrorKind;

    #[test]
    fn test_reboot_mode_parsing() {
        assert_eq!("".parse::<RebootMode>().unwrap(), RebootMode::Normal);
        assert_eq!("Recovery".parse::<RebootMode>().unwrap(), RebootMode::Recovery);
        let err = "fastboot".parse::<RebootMode>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_reboot_into_bootloader() {
        let (runner, ctx) = context(ScriptedRunner::default().ok("-s dev1 reboot bootloader", ""));
        reboot(&ctx, "dev1", RebootMode::Bootloader).await.unwrap();
        assert!(runner.called("-s dev1 reboot bootloader"));
    }

    #[tokio::test]
    async fn test_shutdown_failure() {
        let (_, ctx) =
            context(ScriptedRunner::default().reply("-s dev1 reboot -p", Reply::Output(1, "")));
        let err = shutdown(&ctx, "dev1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandFailed);
    }

    #[tokio::test]
    async fn test_execute_shell_returns_any_exit_code() {
        let (_, ctx) = context(
            ScriptedRunner::default().reply("-s dev1 shell ls /nope", Reply::Output(1, "")),
        );
        let result = execute_shell(&ctx, "dev1", "ls /nope").await.unwrap();
        assert_eq!(result.exit_code, 1);

        let err = execute_shell(&ctx, "dev1", "  ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_screenshot_pulls_and_cleans_up() {
        let (runner, ctx) = context(
            ScriptedRunner::default()
                .ok("-s dev1 shell screencap -p /sdcard/dev1_screenshot.png", "")
                .ok("-s dev1 pull /sdcard/dev1_screenshot.png /tmp/shot.png", "1 file pulled")
                .reply("-s dev1 shell rm /sdcard/dev1_screenshot.png", Reply::Timeout),
        );

        let path = take_screenshot(&ctx, "dev1", Some(Path::new("/tmp/shot.png"))).await.unwrap();
        assert_eq!(path, PathBuf::from("/tmp/shot.png"));
        assert!(runner.called("-s dev1 shell rm /sdcard/dev1_screenshot.png"));
    }

    #[tokio::test]
    async fn test_screen_record_bounds() {
        let (runner, ctx) = context(ScriptedRunner::default());
        let err = screen_record(&ctx, "dev1", 0, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = screen_record(&ctx, "dev1", 181, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dump_screen_failure_skips_pull() {
        let (runner, ctx) = context(ScriptedRunner::default());
        let err = dump_screen(&ctx, "dev1", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandFailed);
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_network_details_without_wifi() {
        let (_, ctx) = context(
            ScriptedRunner::default().ok(
                "-s dev1 shell ifconfig",
                "          inet addr:10.12.3.4  Mask:255.255.255.252",
            ),
        );
        let network = network_details(&ctx, "dev1").await;
        assert_eq!(network.ip_address, "10.12.3.4");
        assert_eq!(network.wifi_name, adbridge_shared::UNKNOWN);
        assert_eq!(network.connection_type, adbridge_shared::ConnectionType::MobileData);
    }
}
