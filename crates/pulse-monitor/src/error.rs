//! Error types for the monitor.
//!
//! Only startup can fail with these. Once the loops are running, every
//! failure is logged and absorbed.

use pulse_broker::BrokerError;
use pulse_core::CoreError;

/// Errors that can occur while starting the monitor.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The HTTP client for incident hand-off could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// The broker could not be reached.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Configuration or BPM setting was rejected.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Reading operator commands failed.
    #[error("console error: {0}")]
    Console(#[from] std::io::Error),
}
