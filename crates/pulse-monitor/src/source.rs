//! Beat ingestion strategies.
//!
//! [`BeatSource`] is chosen once at startup: either a broker pull consumer
//! or a self-paced synthetic generator for dry runs. Both run until the
//! cancellation token fires and feed the same [`Ingestor`].
//!
//! Uses enum dispatch rather than a trait object, matching how the broker
//! contracts are consumed: the broker variant is generic over its
//! [`BeatReceiver`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use pulse_broker::{decode_beat, BeatReceiver, Delivery};
use pulse_core::config::BrokerConfig;
use pulse_core::BpmSetting;
use pulse_types::BeatEvent;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ingest::Ingestor;

// ---------------------------------------------------------------------------
// Unified source enum
// ---------------------------------------------------------------------------

/// Where beats come from.
#[derive(Debug)]
pub enum BeatSource<R> {
    /// Pull batches from the broker and acknowledge them.
    Broker(BrokerSource<R>),
    /// Generate beats locally at a live-adjustable rate.
    Synthetic(SyntheticSource),
}

impl<R: BeatReceiver> BeatSource<R> {
    /// Run until `cancel` fires, folding every beat into `ingestor`.
    pub async fn run(self, ingestor: &mut Ingestor, cancel: CancellationToken) {
        info!(source = self.name(), "beat source started");
        match self {
            Self::Broker(source) => source.run(ingestor, &cancel).await,
            Self::Synthetic(mut source) => source.run(ingestor, &cancel).await,
        }
        info!("beat source stopped");
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Broker(_) => "broker",
            Self::Synthetic(_) => "synthetic",
        }
    }
}

// ---------------------------------------------------------------------------
// Broker pull consumer
// ---------------------------------------------------------------------------

/// Counts for one processed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Deliveries in the batch.
    pub received: usize,
    /// Deliveries decoded and folded.
    pub folded: usize,
    /// Deliveries skipped because they did not decode.
    pub skipped: usize,
    /// Whether the acknowledge call succeeded.
    pub acknowledged: bool,
}

/// Broker-backed beat source.
#[derive(Debug)]
pub struct BrokerSource<R> {
    receiver: R,
    max_events: usize,
    max_wait: Duration,
    backoff: Duration,
}

impl<R: BeatReceiver> BrokerSource<R> {
    /// Create a source pulling up to `max_events` per receive.
    pub const fn new(receiver: R, max_events: usize, max_wait: Duration, backoff: Duration) -> Self {
        Self {
            receiver,
            max_events,
            max_wait,
            backoff,
        }
    }

    /// Create a source from the `broker` config section.
    pub const fn from_config(receiver: R, config: &BrokerConfig) -> Self {
        Self::new(
            receiver,
            config.max_events,
            config.max_wait(),
            config.receive_backoff(),
        )
    }

    async fn run(&self, ingestor: &mut Ingestor, cancel: &CancellationToken) {
        loop {
            let received = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                received = self.receiver.receive(self.max_events, self.max_wait) => received,
            };

            match received {
                Ok(batch) if batch.is_empty() => {}
                Ok(batch) => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        summary = self.fold_batch(batch, ingestor) => {
                            debug!(
                                received = summary.received,
                                folded = summary.folded,
                                skipped = summary.skipped,
                                "batch processed"
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        backoff_ms = self.backoff.as_millis(),
                        "receive failed, backing off"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(self.backoff) => {}
                    }
                }
            }
        }
    }

    /// Decode and fold every delivery, then acknowledge all of them at once.
    ///
    /// Payloads that fail to decode are skipped but still acknowledged, so
    /// a poison message is not redelivered forever. Folding happens before
    /// the acknowledge call, so a failed acknowledge never loses an update.
    pub async fn fold_batch(
        &self,
        batch: Vec<Delivery<R::AckToken>>,
        ingestor: &mut Ingestor,
    ) -> BatchSummary {
        let mut summary = BatchSummary {
            received: batch.len(),
            ..BatchSummary::default()
        };
        let mut tokens = Vec::with_capacity(batch.len());

        for delivery in batch {
            match decode_beat(&delivery.payload) {
                Ok(event) => {
                    ingestor.fold(&event);
                    summary.folded = summary.folded.saturating_add(1);
                }
                Err(e) => {
                    debug!(error = %e, "skipping undecodable beat payload");
                    summary.skipped = summary.skipped.saturating_add(1);
                }
            }
            tokens.push(delivery.ack_token);
        }

        match self.receiver.acknowledge(tokens).await {
            Ok(()) => summary.acknowledged = true,
            Err(e) => warn!(
                error = %e,
                count = summary.received,
                "acknowledge failed, deliveries may be redelivered"
            ),
        }
        summary
    }
}

// ---------------------------------------------------------------------------
// Synthetic generator
// ---------------------------------------------------------------------------

/// Locally generated beats for dry runs.
///
/// Timestamps are taken from the tokio clock anchored to the wall clock at
/// start, so they are monotonic and follow paused time in tests.
#[derive(Debug)]
pub struct SyntheticSource {
    subject_id: String,
    bpm: Arc<BpmSetting>,
    sequence: u64,
}

impl SyntheticSource {
    /// Create a generator for `subject_id` paced by `bpm`.
    pub fn new(subject_id: impl Into<String>, bpm: Arc<BpmSetting>) -> Self {
        Self {
            subject_id: subject_id.into(),
            bpm,
            sequence: 0,
        }
    }

    async fn run(&mut self, ingestor: &mut Ingestor, cancel: &CancellationToken) {
        let origin = (Utc::now(), Instant::now());

        loop {
            // Re-read every beat so a rate change applies to the next one.
            let interval = self.bpm.interval();
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }

            self.sequence = self.sequence.saturating_add(1);
            let timestamp = anchored_now(origin);
            let event = BeatEvent::new(self.subject_id.clone(), self.sequence, timestamp);
            ingestor.fold_at(&event, timestamp);
        }
    }
}

/// Wall-clock time derived from the tokio clock since `origin`.
fn anchored_now((wall, mono): (DateTime<Utc>, Instant)) -> DateTime<Utc> {
    let elapsed = TimeDelta::from_std(mono.elapsed()).unwrap_or(TimeDelta::zero());
    wall.checked_add_signed(elapsed).unwrap_or(wall)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pulse_types::EpisodePhase;

    use super::*;
    use crate::dispatch::AlertDispatcher;

    fn ingestor() -> Ingestor {
        let dispatcher =
            AlertDispatcher::new(None, Duration::from_secs(1), 1, CancellationToken::new()).unwrap();
        Ingestor::new(10, Duration::from_secs(20), dispatcher)
    }

    /// Receiver that never yields; only used to name the type parameter.
    struct NeverReceiver;

    impl BeatReceiver for NeverReceiver {
        type AckToken = ();

        async fn receive(
            &self,
            _max_events: usize,
            _max_wait: Duration,
        ) -> Result<Vec<Delivery<()>>, pulse_broker::BrokerError> {
            std::future::pending().await
        }

        async fn acknowledge(&self, _tokens: Vec<()>) -> Result<(), pulse_broker::BrokerError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn synthetic_source_paces_beats_by_bpm() {
        let bpm = Arc::new(BpmSetting::new(60).unwrap());
        let source: BeatSource<NeverReceiver> =
            BeatSource::Synthetic(SyntheticSource::new("dry-run", Arc::clone(&bpm)));
        assert_eq!(source.name(), "synthetic");

        let cancel = CancellationToken::new();
        let mut ingestor = ingestor();
        let run_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            source.run(&mut ingestor, run_cancel).await;
            ingestor
        });

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        cancel.cancel();
        let ingestor = task.await.unwrap();

        let snap = ingestor.subject("dry-run").unwrap();
        assert_eq!(snap.beats, 5);
        assert!((snap.bpm.unwrap() - 60.0).abs() < 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_change_applies_to_next_beat() {
        let bpm = Arc::new(BpmSetting::new(60).unwrap());
        let source: BeatSource<NeverReceiver> =
            BeatSource::Synthetic(SyntheticSource::new("dry-run", Arc::clone(&bpm)));

        let cancel = CancellationToken::new();
        let mut ingestor = ingestor();
        let run_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            source.run(&mut ingestor, run_cancel).await;
            ingestor
        });

        // Beats at 1s and 2s; the sleep toward 3s is already in flight when
        // the rate changes, so beats then land at 3.0, 3.5, 4.0, ...
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        bpm.set(120).unwrap();
        tokio::time::sleep(Duration::from_millis(2_250)).await;
        cancel.cancel();
        let ingestor = task.await.unwrap();

        assert_eq!(ingestor.subject("dry-run").unwrap().beats, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_synthetic_tachycardia_escalates_once() {
        let bpm = Arc::new(BpmSetting::new(150).unwrap());
        let source: BeatSource<NeverReceiver> =
            BeatSource::Synthetic(SyntheticSource::new("dry-run", Arc::clone(&bpm)));

        let cancel = CancellationToken::new();
        let mut ingestor = ingestor();
        let rx = ingestor.subscribe();
        let run_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            source.run(&mut ingestor, run_cancel).await;
        });

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(
            rx.borrow().subjects.get("dry-run").unwrap().episode.phase,
            EpisodePhase::Pending
        );
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(
            rx.borrow().subjects.get("dry-run").unwrap().episode.phase,
            EpisodePhase::Fired
        );

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_broker_source_exits_promptly() {
        let source = BeatSource::Broker(BrokerSource::new(
            NeverReceiver,
            100,
            Duration::from_secs(10),
            Duration::from_secs(2),
        ));
        assert_eq!(source.name(), "broker");

        let cancel = CancellationToken::new();
        let mut ingestor = ingestor();
        let run_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            source.run(&mut ingestor, run_cancel).await;
        });

        cancel.cancel();
        let joined = tokio::time::timeout(Duration::from_millis(100), task).await;
        assert!(joined.is_ok());
    }
}
