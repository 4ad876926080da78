//! Broker contracts the monitor and producer depend on.
//!
//! The monitor only needs `receive(batch)` and `acknowledge(tokens)`; the
//! producer only needs `publish(event)`. Delivery guarantees beyond that
//! belong to the broker.
//!
//! Methods return `impl Future + Send` so generic loops built on these
//! traits can be moved onto the tokio runtime.

use std::future::Future;
use std::time::Duration;

use pulse_types::BeatEvent;

use crate::error::BrokerError;

/// One received item: the raw payload plus the token that acknowledges it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery<T> {
    /// Undecoded beat payload.
    pub payload: Vec<u8>,
    /// Opaque acknowledgement token.
    pub ack_token: T,
}

impl<T> Delivery<T> {
    /// Pair a payload with its acknowledgement token.
    pub const fn new(payload: Vec<u8>, ack_token: T) -> Self {
        Self { payload, ack_token }
    }
}

/// Pull side of the broker.
pub trait BeatReceiver: Send + Sync {
    /// Token returned with each delivery and handed back to acknowledge it.
    type AckToken: Send;

    /// Wait up to `max_wait` for at most `max_events` deliveries.
    ///
    /// An empty batch is a normal outcome when nothing arrived in time.
    fn receive(
        &self,
        max_events: usize,
        max_wait: Duration,
    ) -> impl Future<Output = Result<Vec<Delivery<Self::AckToken>>, BrokerError>> + Send;

    /// Acknowledge consumed deliveries in one call.
    fn acknowledge(
        &self,
        tokens: Vec<Self::AckToken>,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;
}

/// Publish side of the broker.
pub trait BeatPublisher: Send + Sync {
    /// Publish one beat and wait for the broker to accept it.
    fn publish(&self, event: &BeatEvent) -> impl Future<Output = Result<(), BrokerError>> + Send;
}

/// Decode a beat payload.
///
/// # Errors
///
/// Returns [`BrokerError::Payload`] if the bytes are not a valid beat.
pub fn decode_beat(payload: &[u8]) -> Result<BeatEvent, BrokerError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Encode a beat payload.
///
/// # Errors
///
/// Returns [`BrokerError::Payload`] if serialization fails.
pub fn encode_beat(event: &BeatEvent) -> Result<Vec<u8>, BrokerError> {
    Ok(serde_json::to_vec(event)?)
}
