//! Text record parsers for control-tool output
//!
//! Every parser here is total: lines that do not have the expected shape
//! are skipped, never reported.

use std::net::Ipv4Addr;

use crate::{PropertyMap, UNKNOWN};

/// Header printed by `adb devices` before the identifiers
pub const DEVICE_LISTING_HEADER: &str = "List of devices";

/// Header printed by `dumpsys battery` before the fields
pub const BATTERY_DUMP_HEADER: &str = "Current Battery Service state";

/// Prefix of each line of `pm list packages`
pub const PACKAGE_PREFIX: &str = "package:";

/// Parse `[key]: [value]` lines (the `getprop` format).
pub fn parse_bracketed_properties(text: &str) -> PropertyMap {
    text.lines()
        .filter_map(|line| bracketed_pair(line.trim()))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn bracketed_pair(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('[')?;
    let split = rest.find("]:")?;
    let key = &rest[..split];
    let value = rest[split + 2..]
        .trim_start()
        .strip_prefix('[')?
        .strip_suffix(']')?;
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Parse `key: value` lines, splitting on the first colon only.
///
/// Lines starting with any of `excluded_prefixes` are section headers and
/// are skipped. A repeated key keeps its last value.
pub fn parse_colon_dump(text: &str, excluded_prefixes: &[&str]) -> PropertyMap {
    let mut map = PropertyMap::new();
    for line in text.lines().map(str::trim) {
        if excluded_prefixes.iter().any(|p| line.starts_with(p)) {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        map.insert(key.to_string(), value.trim().to_string());
    }
    map
}

/// Parse one item per non-empty line.
///
/// With a prefix, lines lacking it are dropped and the prefix is stripped
/// from the rest.
pub fn parse_listing(text: &str, prefix: Option<&str>) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match prefix {
            Some(p) => line.strip_prefix(p).map(str::trim),
            None => Some(line),
        })
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extract device identifiers from `adb devices -l` output.
///
/// Skips the header, blank lines and daemon start-up notices (`* daemon ...`).
pub fn parse_device_listing(text: &str) -> Vec<String> {
    parse_listing(text, None)
        .into_iter()
        .filter(|line| !line.starts_with(DEVICE_LISTING_HEADER) && !line.starts_with('*'))
        .filter_map(|line| line.split_whitespace().next().map(str::to_string))
        .collect()
}

/// Extract `key=value` tokens for the requested keys.
///
/// The value ends at the first whitespace; the first occurrence of a key wins.
pub fn parse_key_equals(text: &str, keys: &[&str]) -> PropertyMap {
    let mut map = PropertyMap::new();
    for line in text.lines() {
        for key in keys {
            if map.contains_key(*key) {
                continue;
            }
            let needle = format!("{key}=");
            let Some(pos) = line.find(&needle) else {
                continue;
            };
            // Must be a token start, so `targetSdk=` does not match `minTargetSdk=`.
            if pos > 0 && !line[..pos].ends_with(char::is_whitespace) {
                continue;
            }
            if let Some(value) = line[pos + needle.len()..].split_whitespace().next() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// Parse an integer field, `None` when absent or corrupt
pub fn parse_int(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
}

/// Render an integer field as a percentage, or the sentinel
pub fn percentage(raw: Option<&str>) -> String {
    match parse_int(raw) {
        Some(value) => format!("{value}%"),
        None => UNKNOWN.to_string(),
    }
}

/// First non-loopback IPv4 address in `ip addr` or `ifconfig` output.
///
/// Understands both `inet 192.168.1.5/24` and `inet addr:192.168.1.5`.
pub fn first_ipv4(text: &str) -> Option<String> {
    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        while let Some(token) = tokens.next() {
            let candidate = match token {
                "inet" => match tokens.next() {
                    Some(next) => next.strip_prefix("addr:").unwrap_or(next),
                    None => continue,
                },
                _ => continue,
            };
            let address = candidate.split('/').next().unwrap_or(candidate);
            if let Ok(ip) = address.parse::<Ipv4Addr>() {
                if !ip.is_loopback() && !ip.is_unspecified() {
                    return Some(ip.to_string());
                }
            }
        }
    }
    None
}

/// Wireless network name following any of `markers` (e.g. `SSID: `).
///
/// Quoted values are unquoted; bare values end at a comma or whitespace.
/// `<unknown ssid>` and empty names count as unresolved.
pub fn extract_ssid(text: &str, markers: &[&str]) -> Option<String> {
    for line in text.lines() {
        for marker in markers {
            let mut search = line;
            while let Some(pos) = search.find(marker) {
                let preceded_by_b = search[..pos].ends_with('B');
                let value = &search[pos + marker.len()..];
                search = value;
                if preceded_by_b {
                    continue;
                }
                if let Some(name) = ssid_value(value) {
                    return Some(name);
                }
            }
        }
    }
    None
}

fn ssid_value(raw: &str) -> Option<String> {
    let raw = raw.trim_start();
    let name = if let Some(quoted) = raw.strip_prefix('"') {
        quoted.split('"').next()?
    } else {
        raw.split(|c: char| c == ',' || c.is_whitespace()).next()?
    };
    let name = name.trim();
    if name.is_empty() || name.eq_ignore_ascii_case("<unknown ssid>") || name.starts_with('<') {
        return None;
    }
    Some(name.to_string())
}
