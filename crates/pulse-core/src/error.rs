//! Error types for the core monitoring logic.
//!
//! Uses `thiserror` for typed errors that surface through configuration
//! loading and the operator command boundary.

use crate::bpm::{MAX_BPM, MIN_BPM};

/// Errors that can occur in the core crate.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A requested beat rate is outside the accepted range.
    #[error("invalid BPM {requested}: enter a value between {} and {}", MIN_BPM, MAX_BPM)]
    InvalidBpm {
        /// The rejected value.
        requested: i64,
    },
}

impl From<serde_yml::Error> for CoreError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}
