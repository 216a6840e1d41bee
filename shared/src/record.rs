//! Device telemetry record
//!
//! Every field is always present: it holds either a resolved value or
//! [`UNKNOWN`](crate::UNKNOWN).

use serde::Serialize;

use crate::parse;
use crate::{PropertyMap, UNKNOWN};

/// Composite telemetry for one device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub os: OsInfo,
    pub device: DeviceInfo,
    pub hardware: HardwareInfo,
    pub battery: BatteryInfo,
    pub network: NetworkInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsInfo {
    pub android_version: String,
    pub api_level: String,
    pub security_patch: String,
    pub build_number: String,
    pub build_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub model: String,
    pub manufacturer: String,
    pub brand: String,
    pub device_name: String,
    pub serial: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HardwareInfo {
    pub cpu_abi: String,
    pub hardware: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatteryInfo {
    /// Charge level rendered as a percentage, e.g. `"87%"`
    pub level: String,
    pub status: String,
    pub health: String,
    /// Battery temperature, e.g. `"29.5°C"`
    pub temperature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    pub ip_address: String,
    pub wifi_name: String,
    pub connection_type: ConnectionType,
}

/// How the device reaches the network, derived from the resolved fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionType {
    #[serde(rename = "WiFi")]
    Wifi,
    #[serde(rename = "Mobile Data")]
    MobileData,
    Unknown,
}

impl ConnectionType {
    /// WiFi needs both an address and a network name; an address alone
    /// means mobile data; without an address nothing can be said.
    pub fn classify(ip_address: Option<&str>, wifi_name: Option<&str>) -> Self {
        match (ip_address, wifi_name) {
            (Some(_), Some(_)) => ConnectionType::Wifi,
            (Some(_), None) => ConnectionType::MobileData,
            (None, _) => ConnectionType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Wifi => "WiFi",
            ConnectionType::MobileData => "Mobile Data",
            ConnectionType::Unknown => UNKNOWN,
        }
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn prop(props: &PropertyMap, key: &str) -> String {
    match props.get(key) {
        Some(value) if !value.trim().is_empty() => value.clone(),
        _ => UNKNOWN.to_string(),
    }
}

/// Keep a resolved value, or fall back to the sentinel when blank
pub fn or_unknown(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

impl Default for OsInfo {
    fn default() -> Self {
        Self::from_properties(&PropertyMap::new())
    }
}

impl OsInfo {
    pub fn from_properties(props: &PropertyMap) -> Self {
        Self {
            android_version: prop(props, "ro.build.version.release"),
            api_level: prop(props, "ro.build.version.sdk"),
            security_patch: prop(props, "ro.build.version.security_patch"),
            build_number: prop(props, "ro.build.display.id"),
            build_date: prop(props, "ro.build.date"),
        }
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self::from_properties(&PropertyMap::new(), None, None)
    }
}

impl DeviceInfo {
    /// `serial` and `state` come from separate queries and are already
    /// resolved by the caller when available.
    pub fn from_properties(props: &PropertyMap, serial: Option<&str>, state: Option<&str>) -> Self {
        Self {
            model: prop(props, "ro.product.model"),
            manufacturer: prop(props, "ro.product.manufacturer"),
            brand: prop(props, "ro.product.brand"),
            device_name: prop(props, "ro.product.device"),
            serial: or_unknown(serial),
            state: or_unknown(state),
        }
    }
}

impl Default for HardwareInfo {
    fn default() -> Self {
        Self::from_properties(&PropertyMap::new())
    }
}

impl HardwareInfo {
    pub fn from_properties(props: &PropertyMap) -> Self {
        Self {
            cpu_abi: prop(props, "ro.product.cpu.abi"),
            hardware: prop(props, "ro.hardware"),
        }
    }
}

impl Default for BatteryInfo {
    fn default() -> Self {
        Self::from_dump(&PropertyMap::new())
    }
}

impl BatteryInfo {
    /// Build from the colon-dump of the battery service
    pub fn from_dump(dump: &PropertyMap) -> Self {
        let get = |key: &str| dump.get(key).map(String::as_str);

        Self {
            level: parse::percentage(get("level")),
            status: parse::parse_int(get("status"))
                .map(|code| battery_status_to_string(code).to_string())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            health: parse::parse_int(get("health"))
                .map(|code| battery_health_to_string(code).to_string())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            temperature: parse::parse_int(get("temperature"))
                .map(|tenths| format!("{:.1}°C", tenths as f64 / 10.0))
                .unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

impl Default for NetworkInfo {
    fn default() -> Self {
        Self::resolved(None, None)
    }
}

impl NetworkInfo {
    pub fn resolved(ip_address: Option<&str>, wifi_name: Option<&str>) -> Self {
        Self {
            ip_address: or_unknown(ip_address),
            wifi_name: or_unknown(wifi_name),
            connection_type: ConnectionType::classify(ip_address, wifi_name),
        }
    }
}

/// Convert a BatteryManager status code to string
fn battery_status_to_string(code: i64) -> &'static str {
    match code {
        2 => "Charging",
        3 => "Discharging",
        4 => "Not charging",
        5 => "Full",
        _ => UNKNOWN,
    }
}

/// Convert a BatteryManager health code to string
fn battery_health_to_string(code: i64) -> &'static str {
    match code {
        2 => "Good",
        3 => "Overheat",
        4 => "Dead",
        5 => "Over voltage",
        6 => "Unspecified failure",
        7 => "Cold",
        _ => UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record_is_all_unknown() {
        let record = DeviceRecord::default();
        assert_eq!(record.os.android_version, UNKNOWN);
        assert_eq!(record.device.serial, UNKNOWN);
        assert_eq!(record.hardware.cpu_abi, UNKNOWN);
        assert_eq!(record.battery.level, UNKNOWN);
        assert_eq!(record.network.connection_type, ConnectionType::Unknown);
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            ConnectionType::classify(Some("192.168.1.20"), Some("HomeNet")),
            ConnectionType::Wifi
        );
        assert_eq!(
            ConnectionType::classify(Some("10.0.0.4"), None),
            ConnectionType::MobileData
        );
        assert_eq!(ConnectionType::classify(None, Some("HomeNet")), ConnectionType::Unknown);
        assert_eq!(ConnectionType::classify(None, None), ConnectionType::Unknown);
    }

    #[test]
    fn test_battery_from_dump() {
        let dump: PropertyMap = [
            ("level", "87"),
            ("status", "2"),
            ("health", "2"),
            ("temperature", "295"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let battery = BatteryInfo::from_dump(&dump);
        assert_eq!(battery.level, "87%");
        assert_eq!(battery.status, "Charging");
        assert_eq!(battery.health, "Good");
        assert_eq!(battery.temperature, "29.5°C");
    }

    #[test]
    fn test_battery_corrupt_level() {
        let mut dump = PropertyMap::new();
        dump.insert("level".into(), "notanumber".into());
        let battery = BatteryInfo::from_dump(&dump);
        assert_eq!(battery.level, UNKNOWN);
        assert_eq!(battery.status, UNKNOWN);
    }

    #[test]
    fn test_blank_property_becomes_unknown() {
        let mut props = PropertyMap::new();
        props.insert("ro.product.model".into(), "".into());
        props.insert("ro.product.brand".into(), "google".into());
        let device = DeviceInfo::from_properties(&props, Some("  "), Some("device"));
        assert_eq!(device.model, UNKNOWN);
        assert_eq!(device.brand, "google");
        assert_eq!(device.serial, UNKNOWN);
        assert_eq!(device.state, "device");
    }

    #[test]
    fn test_network_serializes_connection_label() {
        let network = NetworkInfo::resolved(Some("10.0.0.4"), None);
        let json = serde_json::to_value(&network).unwrap();
        assert_eq!(json["connection_type"], "Mobile Data");
        assert_eq!(json["wifi_name"], UNKNOWN);
    }
}
