//! Error types for upsync-core

/// Result type for upsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reconciling service instances
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Requested or probed backend is not a supported service manager
    #[error("Unknown or undetectable service-manager backend: {name}")]
    UnknownBackend { name: String },

    /// Registering an instance for a device failed
    #[error("Failed to register instance for device '{device}': {cause}")]
    Register { device: String, cause: String },

    /// Unregistering an instance failed
    #[error("Failed to unregister instance '{identifier}': {cause}")]
    Unregister { identifier: String, cause: String },

    /// Restarting the dependent data server failed
    #[error("Failed to restart dependent server: {cause}")]
    Restart { cause: String },

    /// Two distinct device names normalize to the same instance identifier
    #[error(
        "Devices '{first}' and '{second}' both normalize to '{identity}'; \
         neither will be registered or unregistered"
    )]
    IdentityCollision {
        first: String,
        second: String,
        identity: String,
    },

    /// An external command could not be spawned
    #[error("Failed to run {program}: {cause}")]
    Command { program: String, cause: String },

    /// Configuration error from upsync-config
    #[error(transparent)]
    Config(#[from] upsync_config::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
