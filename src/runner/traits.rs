//! Trait seams for command execution and backend readiness

use adbridge_shared::{BridgeError, Invocation, InvocationResult};
use async_trait::async_trait;
use std::time::Duration;

/// Runs one bounded invocation of the control tool
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Execute the invocation, returning its output or a classified failure.
    ///
    /// No process spawned by this call may outlive it.
    async fn run(&self, invocation: &Invocation) -> Result<InvocationResult, BridgeError>;

    /// Convenience wrapper building the invocation in place
    async fn run_command(
        &self,
        target: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<InvocationResult, BridgeError> {
        self.run(&Invocation::new(target, args.iter().copied(), timeout))
            .await
    }
}

/// Makes sure the control tool's background service is up
#[async_trait]
pub trait BackendReadiness: Send + Sync {
    /// Idempotent: once it has succeeded, later calls return immediately.
    async fn ensure_ready(&self) -> Result<(), BridgeError>;
}
