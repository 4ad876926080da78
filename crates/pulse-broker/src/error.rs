//! Error types for the broker layer.
//!
//! Every transport failure is flattened into a message string so callers
//! can log it without depending on `async-nats` error types.

/// Errors that can occur while talking to the broker.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Failed to connect to the server or set up the stream/consumer.
    #[error("broker connect error: {0}")]
    Connect(String),

    /// A batch receive failed as a whole.
    #[error("broker receive error: {0}")]
    Receive(String),

    /// Acknowledging consumed deliveries failed.
    #[error("broker acknowledge error: {0}")]
    Acknowledge(String),

    /// Publishing a beat failed.
    #[error("broker publish error: {0}")]
    Publish(String),

    /// A payload could not be encoded or decoded.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}
