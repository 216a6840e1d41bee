//! Telemetry aggregator - assembles device records from tool queries

use super::{network, probe};
use crate::config::BridgeConfig;
use crate::runner::CommandRunner;
use adbridge_shared::parse::{self, BATTERY_DUMP_HEADER};
use adbridge_shared::{
    BatteryInfo, BridgeError, DeviceInfo, DeviceRecord, ErrorKind, HardwareInfo, Invocation,
    OsInfo, PropertyMap,
};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A device left out of a listing, and why
#[derive(Debug, Clone, Serialize)]
pub struct SkippedDevice {
    pub serial: String,
    pub reason: String,
    #[serde(skip)]
    pub kind: ErrorKind,
}

/// Result of a device listing: healthy records plus the side channel of
/// devices that could not be described
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceListing {
    pub devices: Vec<DeviceRecord>,
    pub skipped: Vec<SkippedDevice>,
}

/// Builds device records; stateless between calls
pub struct TelemetryAggregator {
    runner: Arc<dyn CommandRunner>,
    query_timeout: Duration,
    list_timeout: Duration,
}

impl TelemetryAggregator {
    /// Create an aggregator using the configured timeouts
    pub fn new(runner: Arc<dyn CommandRunner>, config: &BridgeConfig) -> Self {
        Self {
            runner,
            query_timeout: config.default_timeout,
            list_timeout: config.list_timeout,
        }
    }

    /// List attached devices and describe each of them.
    ///
    /// Fails only if the listing itself cannot be obtained. A device whose
    /// record cannot be built is reported in `skipped` instead.
    pub async fn list_devices(&self) -> Result<DeviceListing, BridgeError> {
        let invocation = Invocation::broadcast(["devices", "-l"], self.list_timeout);
        let result = self.runner.run(&invocation).await?;
        if !result.success() {
            return Err(BridgeError::command_failed(
                invocation.describe(),
                result.exit_code,
                &result.stderr,
            ));
        }

        let serials = parse::parse_device_listing(&result.stdout);
        info!("Found {} attached device(s)", serials.len());

        let records = join_all(serials.iter().map(|serial| self.build_device_record(serial))).await;

        let mut listing = DeviceListing::default();
        for (serial, record) in serials.into_iter().zip(records) {
            match record {
                Ok(record) => listing.devices.push(record),
                Err(e) => {
                    warn!(serial = %serial, "Failed to get details for device: {}", e);
                    listing.skipped.push(SkippedDevice {
                        serial,
                        reason: e.to_string(),
                        kind: e.kind(),
                    });
                }
            }
        }
        Ok(listing)
    }

    /// Build the composite record for one device.
    ///
    /// The property dump identifies the device: if it cannot be read the
    /// device is unusable and an error is returned. Every other query only
    /// degrades its own section.
    pub async fn build_device_record(&self, serial: &str) -> Result<DeviceRecord, BridgeError> {
        let runner = self.runner.as_ref();
        let timeout = self.query_timeout;

        let (props, serial_no, state, battery, network) = tokio::join!(
            self.properties(serial),
            probe(runner, serial, &["get-serialno"], timeout),
            probe(runner, serial, &["get-state"], timeout),
            self.battery(serial),
            network::resolve(runner, serial, timeout),
        );
        let props = props?;

        let resolved_serial = resolve_serial(serial, serial_no.as_deref(), &props);
        debug!(serial, "Device record assembled");

        Ok(DeviceRecord {
            os: OsInfo::from_properties(&props),
            device: DeviceInfo::from_properties(
                &props,
                Some(resolved_serial.as_str()),
                state.as_deref(),
            ),
            hardware: HardwareInfo::from_properties(&props),
            battery,
            network,
        })
    }

    /// Battery section alone
    pub async fn battery(&self, serial: &str) -> BatteryInfo {
        match probe(
            self.runner.as_ref(),
            serial,
            &["shell", "dumpsys", "battery"],
            self.query_timeout,
        )
        .await
        {
            Some(dump) => {
                BatteryInfo::from_dump(&parse::parse_colon_dump(&dump, &[BATTERY_DUMP_HEADER]))
            }
            None => BatteryInfo::default(),
        }
    }

    async fn properties(&self, serial: &str) -> Result<PropertyMap, BridgeError> {
        let invocation = Invocation::new(serial, ["shell", "getprop"], self.query_timeout);
        let result = self.runner.run(&invocation).await?;
        if !result.success() {
            return Err(BridgeError::command_failed(
                invocation.describe(),
                result.exit_code,
                &result.stderr,
            ));
        }
        Ok(parse::parse_bracketed_properties(&result.stdout))
    }
}

/// `get-serialno`, then `ro.serialno`, then the listing identifier
fn resolve_serial(listed: &str, reported: Option<&str>, props: &PropertyMap) -> String {
    reported
        .filter(|s| usable_serial(s))
        .or_else(|| props.get("ro.serialno").map(String::as_str).filter(|s| usable_serial(s)))
        .unwrap_or(listed)
        .trim()
        .to_string()
}

fn usable_serial(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.eq_ignore_ascii_case("unknown")
}
