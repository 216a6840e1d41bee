//! Network resolution with ordered fallbacks
//!
//! Address: `ip -f inet addr show`, then the legacy `ifconfig`, until a
//! non-loopback IPv4 address appears. Network name: the wifi service dump,
//! then the connectivity dump.

use super::probe;
use crate::runner::CommandRunner;
use adbridge_shared::parse::{extract_ssid, first_ipv4};
use adbridge_shared::NetworkInfo;
use std::time::Duration;

/// Address queries, in the order they are tried
pub const ADDRESS_QUERIES: [&[&str]; 2] = [
    &["shell", "ip", "-f", "inet", "addr", "show"],
    &["shell", "ifconfig"],
];

/// Wireless status queries and the markers preceding the network name
pub const WIFI_NAME_QUERIES: [(&[&str], &[&str]); 2] = [
    (&["shell", "dumpsys", "wifi"], &["mWifiInfo SSID: "]),
    (&["shell", "dumpsys", "connectivity"], &["SSID: ", "extra: "]),
];

/// Resolve the network section for one device
pub async fn resolve(runner: &dyn CommandRunner, serial: &str, timeout: Duration) -> NetworkInfo {
    let (ip_address, wifi_name) = tokio::join!(
        resolve_ip_address(runner, serial, timeout),
        resolve_wifi_name(runner, serial, timeout),
    );
    NetworkInfo::resolved(ip_address.as_deref(), wifi_name.as_deref())
}

pub async fn resolve_ip_address(
    runner: &dyn CommandRunner,
    serial: &str,
    timeout: Duration,
) -> Option<String> {
    for args in ADDRESS_QUERIES {
        if let Some(ip) = probe(runner, serial, args, timeout)
            .await
            .and_then(|out| first_ipv4(&out))
        {
            return Some(ip);
        }
    }
    None
}

pub async fn resolve_wifi_name(
    runner: &dyn CommandRunner,
    serial: &str,
    timeout: Duration,
) -> Option<String> {
    for (args, markers) in WIFI_NAME_QUERIES {
        if let Some(name) = probe(runner, serial, args, timeout)
            .await
            .and_then(|out| extract_ssid(&out, markers))
        {
            return Some(name);
        }
    }
    None
}
