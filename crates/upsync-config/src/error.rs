//! Error types for upsync-config

use std::path::PathBuf;

/// Result type for upsync-config operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading and validating device configuration
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration file missing or unreadable
    #[error("Configuration not found or unreadable at {path}")]
    ConfigMissing { path: PathBuf },

    /// Configuration file exists but contains no usable bytes
    #[error("Configuration at {path} is empty")]
    ConfigEmpty { path: PathBuf },

    /// A requested device section does not exist
    #[error("Device section not found: [{name}]")]
    SectionNotFound { name: String },

    /// A requested key does not exist within a section
    #[error("Key '{key}' not found in section [{section}]")]
    KeyNotFound { section: String, key: String },

    /// The same section header appears more than once
    #[error("Duplicate device section: [{name}]")]
    DuplicateSection { name: String },

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
