//! Error types for car setup and configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while attaching a car or loading its configuration.
///
/// Per-tick control is total: once a car is attached nothing in the
/// control path can fail.
#[derive(Debug, Error)]
pub enum CarError {
    /// The wheel list is empty.
    #[error("car has no wheels configured")]
    NoWheels,

    /// A front (steered) wheel index does not name a configured wheel.
    #[error("front wheel index {index} out of range for {wheels} wheels")]
    FrontWheelOutOfRange {
        /// Offending index.
        index: usize,
        /// Number of wheels the actuator reports.
        wheels: usize,
    },

    /// A configuration value is outside its valid domain.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`crate::config::Config`].
    #[error("failed to parse config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CarError {
    /// Creates an invalid-configuration error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
