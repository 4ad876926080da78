//! Synthetic heartbeat producer for Pulse Watch.
//!
//! Emits timestamped beats for one subject at a rate the operator can
//! change while it runs. Beats go to the broker when one is configured and
//! are only logged otherwise.

pub mod console;
pub mod error;
pub mod producer;

pub use error::ProducerError;
pub use producer::{generate_subject_id, BeatProducer, ProducerHandle};
