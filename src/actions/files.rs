//! File transfer between the host and a device

use super::ActionContext;
use adbridge_shared::parse::parse_listing;
use adbridge_shared::{limits, BridgeError};
use std::path::{Path, PathBuf};
use tracing::info;

/// Copy a device file to `local`, or into the output directory.
///
/// Returns the local path of the copy.
pub async fn pull_file(
    ctx: &ActionContext,
    serial: &str,
    device_path: &str,
    local: Option<&Path>,
) -> Result<PathBuf, BridgeError> {
    let local = match local {
        Some(path) => path.to_path_buf(),
        None => {
            let name = device_path.rsplit('/').next().filter(|n| !n.is_empty()).ok_or_else(|| {
                BridgeError::InvalidArgument(format!("'{device_path}' does not name a file"))
            })?;
            ctx.config.output_dir.join(name)
        }
    };

    let local_arg = local.to_string_lossy().into_owned();
    ctx.run_checked_with(
        serial,
        &["pull", device_path, local_arg.as_str()],
        limits::TRANSFER_TIMEOUT,
    )
    .await?;
    info!(serial, device_path, local = %local.display(), "File pulled");
    Ok(local)
}

/// Copy a local file into a device directory
pub async fn push_file(
    ctx: &ActionContext,
    serial: &str,
    local: &Path,
    device_dir: &str,
) -> Result<(), BridgeError> {
    if !local.is_file() {
        return Err(BridgeError::InvalidArgument(format!(
            "'{}' is not a readable file",
            local.display()
        )));
    }

    let local_arg = local.to_string_lossy().into_owned();
    ctx.run_checked_with(
        serial,
        &["push", local_arg.as_str(), device_dir],
        limits::TRANSFER_TIMEOUT,
    )
    .await?;
    info!(serial, local = %local.display(), device_dir, "File pushed");
    Ok(())
}

/// Delete a file on the device
pub async fn remove_file(
    ctx: &ActionContext,
    serial: &str,
    device_path: &str,
) -> Result<(), BridgeError> {
    ctx.run_checked(serial, &["shell", "rm", device_path]).await?;
    Ok(())
}

/// Entries of a device directory; empty for an empty directory
pub async fn list_files(
    ctx: &ActionContext,
    serial: &str,
    device_path: &str,
) -> Result<Vec<String>, BridgeError> {
    let result = ctx.run_checked(serial, &["shell", "ls", device_path]).await?;
    Ok(parse_listing(&result.stdout, None))
}
