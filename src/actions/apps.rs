//! Package management actions

use super::ActionContext;
use adbridge_shared::parse::{parse_key_equals, parse_listing, PACKAGE_PREFIX};
use adbridge_shared::record::or_unknown;
use adbridge_shared::{limits, BridgeError, InvocationResult};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Version and install metadata of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppDetails {
    pub package: String,
    pub version_name: String,
    pub target_sdk: String,
    pub first_install_time: String,
    pub last_update_time: String,
}

const DETAIL_KEYS: [&str; 4] = ["versionName", "targetSdk", "firstInstallTime", "lastUpdateTime"];

/// Package names installed for the primary user
pub async fn list_installed_apps(
    ctx: &ActionContext,
    serial: &str,
) -> Result<Vec<String>, BridgeError> {
    let result = ctx
        .run_checked(serial, &["shell", "pm", "list", "packages", "--user", "0"])
        .await?;
    Ok(parse_listing(&result.stdout, Some(PACKAGE_PREFIX)))
}

/// Version and install times from the package manager dump
pub async fn app_details(
    ctx: &ActionContext,
    serial: &str,
    package: &str,
) -> Result<AppDetails, BridgeError> {
    let result = ctx
        .run_checked(serial, &["shell", "dumpsys", "package", package])
        .await?;
    let fields = parse_key_equals(&result.stdout, &DETAIL_KEYS);
    let get = |key: &str| or_unknown(fields.get(key).map(String::as_str));

    Ok(AppDetails {
        package: package.to_string(),
        version_name: get("versionName"),
        target_sdk: get("targetSdk"),
        first_install_time: get("firstInstallTime"),
        last_update_time: get("lastUpdateTime"),
    })
}

/// Install (or replace) an APK
pub async fn install_app(ctx: &ActionContext, serial: &str, apk: &Path) -> Result<(), BridgeError> {
    if !apk.is_file() {
        return Err(BridgeError::InvalidArgument(format!(
            "'{}' is not a readable file",
            apk.display()
        )));
    }
    let apk_arg = apk.to_string_lossy().into_owned();
    let result = ctx
        .run_checked_with(serial, &["install", "-r", apk_arg.as_str()], limits::INSTALL_TIMEOUT)
        .await?;
    reject_failure_report("install", &result)?;
    info!(serial, apk = %apk.display(), "Package installed");
    Ok(())
}

/// Remove a package
pub async fn uninstall_app(
    ctx: &ActionContext,
    serial: &str,
    package: &str,
) -> Result<(), BridgeError> {
    let result = ctx.run_checked(serial, &["uninstall", package]).await?;
    reject_failure_report("uninstall", &result)?;
    info!(serial, package, "Package uninstalled");
    Ok(())
}

/// Start the launcher activity of a package
pub async fn launch_app(
    ctx: &ActionContext,
    serial: &str,
    package: &str,
) -> Result<(), BridgeError> {
    let result = ctx
        .run_checked(
            serial,
            &["shell", "monkey", "-p", package, "-c", "android.intent.category.LAUNCHER", "1"],
        )
        .await?;
    if result.stdout.contains("No activities found") || result.stdout.contains("monkey aborted") {
        return Err(BridgeError::command_failed(
            format!("launch {package}"),
            result.exit_code,
            &result.stdout,
        ));
    }
    Ok(())
}

/// The package manager can exit 0 and still print `Failure [...]`
fn reject_failure_report(action: &str, result: &InvocationResult) -> Result<(), BridgeError> {
    let report = result
        .stdout
        .lines()
        .chain(result.stderr.lines())
        .find(|line| line.trim_start().starts_with("Failure"));
    match report {
        Some(line) => Err(BridgeError::command_failed(action, result.exit_code, line)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::tests::context;
    use crate::runner::testing::ScriptedRunner;
    use adbridge_shared::{ErrorKind, UNKNOWN};

    #[tokio::test]
    async fn test_list_installed_apps() {
        let (_, ctx) = context(ScriptedRunner::default().ok(
            "-s dev1 shell pm list packages --user 0",
            "package:com.android.chrome\npackage:com.google.android.gm\n",
        ));
        let apps = list_installed_apps(&ctx, "dev1").await.unwrap();
        assert_eq!(apps, vec!["com.android.chrome", "com.google.android.gm"]);
    }

    #[tokio::test]
    async fn test_app_details_with_missing_fields() {
        let (_, ctx) = context(ScriptedRunner::default().ok(
            "-s dev1 shell dumpsys package com.example.app",
            "  Package [com.example.app] (a1b2c3):\n\
             \x20   versionCode=3 minSdk=24 targetSdk=33\n\
             \x20   versionName=2.0.1\n",
        ));
        let details = app_details(&ctx, "dev1", "com.example.app").await.unwrap();
        assert_eq!(details.version_name, "2.0.1");
        assert_eq!(details.target_sdk, "33");
        assert_eq!(details.first_install_time, UNKNOWN);
    }

    #[tokio::test]
    async fn test_uninstall_failure_report() {
        let (_, ctx) = context(
            ScriptedRunner::default()
                .ok("-s dev1 uninstall com.missing", "Failure [DELETE_FAILED_INTERNAL_ERROR]"),
        );
        let err = uninstall_app(&ctx, "dev1", "com.missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandFailed);
        assert!(err.to_string().contains("DELETE_FAILED_INTERNAL_ERROR"));
    }

    #[tokio::test]
    async fn test_launch_without_activity() {
        let (_, ctx) = context(ScriptedRunner::default().ok(
            "-s dev1 shell monkey -p com.example.svc -c android.intent.category.LAUNCHER 1",
            "** No activities found to run, monkey aborted.",
        ));
        let err = launch_app(&ctx, "dev1", "com.example.svc").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandFailed);
    }

    #[tokio::test]
    async fn test_install_requires_apk() {
        let (_, ctx) = context(ScriptedRunner::default());
        let err = install_app(&ctx, "dev1", Path::new("/nonexistent/app.apk")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
