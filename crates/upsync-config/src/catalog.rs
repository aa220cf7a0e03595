//! Canonical device catalog
//!
//! The catalog validates raw sections from the reader and produces the
//! sorted, immutable device list one reconciliation pass works from.
//! Sorting is lexical-numeric aware (`ups2` before `ups10`) so diffs and
//! command ordering are deterministic across runs.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::media::{self, MediaClass};
use crate::reader::ConfigReader;
use crate::{Error, Result};

/// One device entry from the configuration file.
///
/// Constructed fresh on every pass and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSection {
    /// Unique section name as written in the configuration
    pub name: String,
    /// Driver selecting the device protocol
    pub driver: String,
    /// Connection endpoint; may encode a remote host as `name@host`
    pub port: String,
}

impl DeviceSection {
    pub fn new(
        name: impl Into<String>,
        driver: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            driver: driver.into(),
            port: port.into(),
        }
    }

    /// Connectivity classification of this device.
    pub fn media(&self) -> MediaClass {
        media::classify(self)
    }
}

/// Loads and validates the sorted device list.
pub struct DeviceCatalog {
    reader: ConfigReader,
}

impl DeviceCatalog {
    pub fn new(reader: ConfigReader) -> Self {
        Self { reader }
    }

    /// Load all device sections, sorted by natural name order.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateSection`] if the same header appears twice, plus
    /// the read errors of the underlying [`ConfigReader`].
    pub fn load(&self) -> Result<Vec<DeviceSection>> {
        let raw = self.reader.read_sections()?;

        let mut seen = HashSet::new();
        for section in &raw {
            if !seen.insert(section.name.clone()) {
                return Err(Error::DuplicateSection {
                    name: section.name.clone(),
                });
            }
        }

        let mut devices: Vec<DeviceSection> = raw
            .into_iter()
            .map(|section| DeviceSection {
                driver: section.get("driver").unwrap_or_default().to_string(),
                port: section.get("port").unwrap_or_default().to_string(),
                name: section.name,
            })
            .collect();

        devices.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        tracing::debug!(count = devices.len(), "loaded device catalog");
        Ok(devices)
    }

    /// Find one device by name.
    pub fn find(&self, name: &str) -> Result<DeviceSection> {
        self.load()?
            .into_iter()
            .find(|d| d.name == name)
            .ok_or_else(|| Error::SectionNotFound {
                name: name.to_string(),
            })
    }
}

/// Compare two names treating digit runs as numbers, so `ups2` sorts
/// before `ups10`. Ties between numerically equal runs (`ups01` vs
/// `ups1`) fall back to byte order for a total ordering.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ac), Some(bc)) => {
                if ac.is_ascii_digit() && bc.is_ascii_digit() {
                    let an = take_number(&mut ai);
                    let bn = take_number(&mut bi);
                    match an.cmp(&bn) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                match ac.cmp(&bc) {
                    Ordering::Equal => {
                        ai.next();
                        bi.next();
                    }
                    other => return other,
                }
            }
        }
    }
}

fn take_number(iter: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u64 {
    let mut value: u64 = 0;
    while let Some(c) = iter.peek().copied() {
        let Some(digit) = c.to_digit(10) else { break };
        value = value.saturating_mul(10).saturating_add(u64::from(digit));
        iter.next();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn catalog_for(content: &str) -> (NamedTempFile, DeviceCatalog) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let catalog = DeviceCatalog::new(ConfigReader::new(file.path()));
        (file, catalog)
    }

    #[test]
    fn loads_sorted_devices() {
        let (_file, catalog) = catalog_for(
            "[ups10]\ndriver = usbhid-ups\nport = auto\n\
             [ups2]\ndriver = snmp-ups\nport = 10.0.0.2\n\
             [apc]\ndriver = dummy-ups\nport = x@localhost\n",
        );
        let devices = catalog.load().unwrap();
        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["apc", "ups2", "ups10"]);
    }

    #[test]
    fn missing_driver_or_port_default_to_empty() {
        let (_file, catalog) = catalog_for("[bare]\ndesc = nothing else\n");
        let devices = catalog.load().unwrap();
        assert_eq!(devices[0].driver, "");
        assert_eq!(devices[0].port, "");
        assert_eq!(devices[0].media(), crate::MediaClass::None);
    }

    #[test]
    fn duplicate_sections_are_rejected() {
        let (_file, catalog) = catalog_for("[dup]\ndriver = a\n[dup]\ndriver = b\n");
        assert!(matches!(
            catalog.load(),
            Err(Error::DuplicateSection { name }) if name == "dup"
        ));
    }

    #[test]
    fn find_returns_one_device() {
        let (_file, catalog) = catalog_for("[ups1]\ndriver = usbhid-ups\nport = auto\n");
        let device = catalog.find("ups1").unwrap();
        assert_eq!(device.driver, "usbhid-ups");
        assert!(matches!(
            catalog.find("ups9"),
            Err(Error::SectionNotFound { .. })
        ));
    }

    #[test]
    fn natural_ordering() {
        assert_eq!(natural_cmp("ups2", "ups10"), Ordering::Less);
        assert_eq!(natural_cmp("ups10", "ups2"), Ordering::Greater);
        assert_eq!(natural_cmp("ups1", "ups1"), Ordering::Equal);
        assert_eq!(natural_cmp("a2b10", "a2b9"), Ordering::Greater);
        assert_eq!(natural_cmp("alpha", "beta"), Ordering::Less);
        // Numerically equal but textually distinct stays a total order.
        assert_ne!(natural_cmp("ups01", "ups1"), Ordering::Equal);
    }
}
