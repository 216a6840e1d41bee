//! Device actions
//!
//! Thin sequences of runner calls that request something of a device
//! (reboot, install, transfer files...) and return a structured result.

mod apps;
mod device;
mod files;

pub use apps::{
    app_details, install_app, launch_app, list_installed_apps, uninstall_app, AppDetails,
};
pub use device::{
    clear_logs, dump_screen, execute_shell, network_details, reboot, screen_record, shutdown,
    take_screenshot, RebootMode,
};
pub use files::{list_files, pull_file, push_file, remove_file};

use crate::config::BridgeConfig;
use crate::runner::CommandRunner;
use adbridge_shared::{BridgeError, Invocation, InvocationResult};
use std::sync::Arc;
use std::time::Duration;

/// Context passed to action handlers
#[derive(Clone)]
pub struct ActionContext {
    pub runner: Arc<dyn CommandRunner>,
    pub config: BridgeConfig,
}

impl ActionContext {
    pub fn new(runner: Arc<dyn CommandRunner>, config: BridgeConfig) -> Self {
        Self { runner, config }
    }

    /// Run with the default timeout, treating a non-zero exit as failure
    pub(crate) async fn run_checked(
        &self,
        serial: &str,
        args: &[&str],
    ) -> Result<InvocationResult, BridgeError> {
        self.run_checked_with(serial, args, self.config.default_timeout)
            .await
    }

    pub(crate) async fn run_checked_with(
        &self,
        serial: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<InvocationResult, BridgeError> {
        let invocation = Invocation::new(serial, args.iter().copied(), timeout);
        let result = self.runner.run(&invocation).await?;
        if !result.success() {
            let detail = if result.stderr.is_empty() { &result.stdout } else { &result.stderr };
            return Err(BridgeError::command_failed(
                invocation.describe(),
                result.exit_code,
                detail,
            ));
        }
        Ok(result)
    }
}

/// Make a serial usable in a file name (`192.168.1.5:5555` has a colon)
pub(crate) fn file_safe(serial: &str) -> String {
    serial
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
