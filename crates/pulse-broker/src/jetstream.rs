//! NATS `JetStream` implementation of the broker contracts.
//!
//! Beats for a subject are published on `{topic}.{subject_id}` into a
//! stream named after the topic. The monitor reads them through a durable
//! pull consumer with explicit acknowledgement, so unacknowledged beats
//! are redelivered after the server's ack wait.
//!
//! # Subject Convention
//!
//! - **Stream:** `HEARTBEATS` for topic `heartbeats`, capturing `heartbeats.>`
//! - **Beat publish:** `heartbeats.{subject_id}`
//! - **Consumer:** durable, named after the configured subscription

use std::time::Duration;

use async_nats::jetstream::{self, consumer::pull, consumer::AckPolicy, stream};
use futures::StreamExt as _;
use pulse_types::BeatEvent;
use tracing::{debug, info, warn};

use crate::contract::{encode_beat, BeatPublisher, BeatReceiver, Delivery};
use crate::error::BrokerError;

/// Open a `JetStream` context and make sure the beat stream exists.
async fn open_stream(url: &str, topic: &str) -> Result<(jetstream::Context, stream::Stream), BrokerError> {
    info!(url = url, topic = topic, "connecting to NATS server");
    let client = async_nats::connect(url)
        .await
        .map_err(|e| BrokerError::Connect(format!("failed to connect to {url}: {e}")))?;
    let context = jetstream::new(client);

    let name = stream_name(topic);
    let stream = context
        .get_or_create_stream(stream::Config {
            name: name.clone(),
            subjects: vec![format!("{topic}.>")],
            ..Default::default()
        })
        .await
        .map_err(|e| BrokerError::Connect(format!("failed to open stream {name}: {e}")))?;
    info!(stream = name, "NATS JetStream stream ready");
    Ok((context, stream))
}

/// Stream name for a topic. Stream names may not contain `.`, `*`, `>`
/// or whitespace.
pub fn stream_name(topic: &str) -> String {
    topic
        .chars()
        .map(|c| match c {
            '.' | '*' | '>' => '_',
            c if c.is_whitespace() => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Publish subject for a subject id. Characters that would split or
/// wildcard the subject are replaced with `_`.
pub fn beat_subject(topic: &str, subject_id: &str) -> String {
    let token: String = subject_id
        .chars()
        .map(|c| if matches!(c, '.' | '*' | '>') || c.is_whitespace() { '_' } else { c })
        .collect();
    let token = if token.is_empty() { "_".to_owned() } else { token };
    format!("{topic}.{token}")
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// Durable pull consumer over the beat stream.
pub struct JetStreamReceiver {
    consumer: jetstream::consumer::PullConsumer,
}

impl JetStreamReceiver {
    /// Connect and bind the durable consumer `subscription` on `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Connect`] if the server, stream or consumer
    /// cannot be reached or created.
    pub async fn connect(url: &str, topic: &str, subscription: &str) -> Result<Self, BrokerError> {
        let (_, stream) = open_stream(url, topic).await?;
        let consumer = stream
            .get_or_create_consumer(
                subscription,
                pull::Config {
                    durable_name: Some(subscription.to_owned()),
                    ack_policy: AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| {
                BrokerError::Connect(format!("failed to bind consumer {subscription}: {e}"))
            })?;
        info!(subscription = subscription, "durable pull consumer bound");
        Ok(Self { consumer })
    }
}

impl BeatReceiver for JetStreamReceiver {
    type AckToken = jetstream::Message;

    async fn receive(
        &self,
        max_events: usize,
        max_wait: Duration,
    ) -> Result<Vec<Delivery<Self::AckToken>>, BrokerError> {
        let mut batch = self
            .consumer
            .batch()
            .max_messages(max_events)
            .expires(max_wait)
            .messages()
            .await
            .map_err(|e| BrokerError::Receive(format!("batch request failed: {e}")))?;

        let mut deliveries = Vec::new();
        while let Some(message) = batch.next().await {
            match message {
                Ok(message) => {
                    let payload = message.payload.to_vec();
                    deliveries.push(Delivery::new(payload, message));
                }
                // Keep what already arrived; the rest is redelivered.
                Err(e) if !deliveries.is_empty() => {
                    warn!(
                        received = deliveries.len(),
                        error = %e,
                        "batch ended early"
                    );
                    break;
                }
                Err(e) => {
                    return Err(BrokerError::Receive(format!("batch stream failed: {e}")));
                }
            }
        }

        debug!(count = deliveries.len(), "received beat batch");
        Ok(deliveries)
    }

    async fn acknowledge(&self, tokens: Vec<Self::AckToken>) -> Result<(), BrokerError> {
        let total = tokens.len();
        let mut failed = 0_usize;
        let mut last_error = None;

        for message in tokens {
            if let Err(e) = message.ack().await {
                failed = failed.saturating_add(1);
                last_error = Some(e.to_string());
            }
        }

        match last_error {
            None => Ok(()),
            Some(e) => Err(BrokerError::Acknowledge(format!(
                "{failed} of {total} acks failed, last: {e}"
            ))),
        }
    }
}

impl std::fmt::Debug for JetStreamReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JetStreamReceiver")
            .field("connected", &true)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Publishes beats into the beat stream and waits for the server ack.
pub struct JetStreamPublisher {
    context: jetstream::Context,
    topic: String,
}

impl JetStreamPublisher {
    /// Connect and make sure the beat stream for `topic` exists.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Connect`] if the server or stream cannot be
    /// reached or created.
    pub async fn connect(url: &str, topic: &str) -> Result<Self, BrokerError> {
        let (context, _) = open_stream(url, topic).await?;
        Ok(Self {
            context,
            topic: topic.to_owned(),
        })
    }
}

impl BeatPublisher for JetStreamPublisher {
    async fn publish(&self, event: &BeatEvent) -> Result<(), BrokerError> {
        let subject = beat_subject(&self.topic, &event.subject_id);
        let payload = encode_beat(event)?;

        let ack = self
            .context
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| BrokerError::Publish(format!("failed to publish to {subject}: {e}")))?;
        ack.await
            .map_err(|e| BrokerError::Publish(format!("no ack for {subject}: {e}")))?;

        debug!(
            subject = subject,
            sequence = event.sequence_number,
            "published beat"
        );
        Ok(())
    }
}

impl std::fmt::Debug for JetStreamPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JetStreamPublisher")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}
