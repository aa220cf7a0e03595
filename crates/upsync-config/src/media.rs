//! Media classification of devices
//!
//! The connectivity class of a device decides which service-manager
//! dependency its instance needs: USB devices wait for hot-plug, networked
//! devices wait for the network, loopback proxies and local serial devices
//! need nothing. Classification is an ordered first-match table over the
//! `driver` value, with the `port` value consulted only for proxy drivers.

use serde::{Deserialize, Serialize};

use crate::catalog::DeviceSection;

/// Coarse connectivity category of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaClass {
    /// Reached over a USB link
    Usb,
    /// Reached over a network interface
    Network,
    /// Reached over loopback only; no network dependency needed
    NetworkLocalhost,
    /// Local serial or otherwise dependency-free
    None,
}

/// Driver-name markers for network-attached protocols.
const NETWORK_MARKERS: &[&str] = &[
    "netxml", "snmp", "ipmi", "powerman", "mib", "avahi", "apcupsd",
];

/// Driver-name markers for proxy drivers whose reach depends on the port.
const PROXY_MARKERS: &[&str] = &["dummy", "clone"];

/// Classify a device. Pure and total: every `(driver, port)` pair maps
/// to exactly one class, first matching rule wins.
pub fn classify(device: &DeviceSection) -> MediaClass {
    let driver = device.driver.to_ascii_lowercase();

    if NETWORK_MARKERS.iter().any(|m| driver.contains(m)) {
        return MediaClass::Network;
    }

    if driver.contains("usb") {
        return MediaClass::Usb;
    }

    if PROXY_MARKERS.iter().any(|m| driver.contains(m)) {
        return classify_proxy_port(&device.port);
    }

    MediaClass::None
}

/// A proxy driver's port may point at another host (`name@host`); only
/// then does the device reach the network.
fn classify_proxy_port(port: &str) -> MediaClass {
    match port.split_once('@') {
        Some((_, host)) => {
            if matches!(host, "" | "localhost" | "127.0.0.1" | "::1") {
                MediaClass::NetworkLocalhost
            } else {
                MediaClass::Network
            }
        }
        None => MediaClass::None,
    }
}
