//! Device configuration parsing and cataloging for upsync
//!
//! This crate reads the UPS device configuration file (sections of
//! `key=value` lines under a bracketed header) and turns it into a
//! canonical, sorted device catalog:
//!
//! - [`reader`]: lexes the raw file into sections without interpreting them
//! - [`catalog`]: validates sections and derives per-device attributes
//! - [`media`]: classifies each device's connectivity for dependency wiring
//!
//! The crate has no knowledge of service managers; it is the leaf layer
//! consumed by `upsync-core`.

pub mod catalog;
pub mod error;
pub mod media;
pub mod reader;

pub use catalog::{DeviceCatalog, DeviceSection, natural_cmp};
pub use error::{Error, Result};
pub use media::MediaClass;
pub use reader::{ConfigReader, RawSection};
