//! adbridge
//!
//! Command execution and telemetry aggregation for Android devices reached
//! through `adb`: bounded invocations, parsed device records and
//! time-boxed log capture.

pub mod actions;
mod bridge;
pub mod capture;
pub mod config;
pub mod runner;
pub mod telemetry;

pub use adbridge_shared as shared;
pub use adbridge_shared::{BridgeError, DeviceRecord, ErrorKind, Invocation, InvocationResult};
pub use bridge::Bridge;
pub use capture::{CancellationToken, CaptureReport, StreamCapture};
pub use config::BridgeConfig;
pub use runner::{AdbRunner, CommandRunner};
pub use telemetry::{DeviceListing, SkippedDevice, TelemetryAggregator};
