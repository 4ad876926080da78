//! Error types for the producer.

use pulse_broker::BrokerError;
use pulse_core::CoreError;

/// Errors that can occur while starting the producer.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
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
