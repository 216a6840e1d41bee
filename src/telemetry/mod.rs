//! Device telemetry aggregation
//!
//! Builds a [`DeviceRecord`](adbridge_shared::DeviceRecord) per device from
//! several independent tool queries. A failing query only degrades its own
//! section to the "Unknown" sentinel.

mod aggregator;
pub mod network;

pub use aggregator::{DeviceListing, SkippedDevice, TelemetryAggregator};

use crate::runner::CommandRunner;
use adbridge_shared::Invocation;
use std::time::Duration;
use tracing::debug;

/// Run one fault-tolerant query: `Some(stdout)` only when the tool
/// succeeded and printed something.
pub(crate) async fn probe(
    runner: &dyn CommandRunner,
    serial: &str,
    args: &[&str],
    timeout: Duration,
) -> Option<String> {
    let invocation = Invocation::new(serial, args.iter().copied(), timeout);
    match runner.run(&invocation).await {
        Ok(result) if result.has_output() => Some(result.stdout),
        Ok(result) => {
            debug!(
                serial,
                command = %invocation.describe(),
                exit_code = result.exit_code,
                "Query returned no usable output"
            );
            None
        }
        Err(e) => {
            debug!(serial, command = %invocation.describe(), "Query failed: {}", e);
            None
        }
    }
}
