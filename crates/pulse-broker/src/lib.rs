//! Broker contracts and NATS `JetStream` transport for Pulse Watch.
//!
//! The monitor and producer are written against the [`BeatReceiver`] and
//! [`BeatPublisher`] traits. [`JetStreamReceiver`] and
//! [`JetStreamPublisher`] implement them over NATS; tests implement them
//! with scripted in-memory fakes.
//!
//! # Architecture
//!
//! ```text
//! BeatProducer --publish--> NATS JetStream --receive/ack--> BeatSource
//! ```

pub mod contract;
pub mod error;
pub mod jetstream;

pub use contract::{decode_beat, encode_beat, BeatPublisher, BeatReceiver, Delivery};
pub use error::BrokerError;
pub use jetstream::{JetStreamPublisher, JetStreamReceiver};
