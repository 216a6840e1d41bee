//! Bounded execution of the control tool
//!
//! This module handles:
//! - Spawning one process per invocation, with a mandatory timeout
//! - Killing and reaping the process group on timeout or error
//! - The idempotent background service readiness check

mod process;
mod readiness;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use process::{execute, AdbRunner};
pub(crate) use process::{build_command, kill_tree, signal_group, Signal};
pub use readiness::{AdbServerReadiness, AlwaysReady};
pub use traits::{BackendReadiness, CommandRunner};
