//! Synthetic beat emission.
//!
//! [`BeatProducer`] publishes one [`BeatEvent`] per interval, where the
//! interval is recomputed from the shared [`BpmSetting`] before each beat.
//! It publishes first and then sleeps, so a rate change applies from the
//! next beat on. Without a publisher it only echoes beats to the log.
//! A publish still in flight when the loop is cancelled is abandoned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pulse_broker::BeatPublisher;
use pulse_core::BpmSetting;
use pulse_types::BeatEvent;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Short random subject id: the first 8 hex digits of a v4 UUID.
pub fn generate_subject_id() -> String {
    Uuid::new_v4().simple().to_string().chars().take(8).collect()
}

/// Emits beats for one subject at a live-adjustable rate.
#[derive(Debug)]
pub struct BeatProducer<P> {
    subject_id: String,
    bpm: Arc<BpmSetting>,
    sequence: AtomicU64,
    publisher: Option<P>,
}

impl<P: BeatPublisher> BeatProducer<P> {
    /// Create a producer. With `publisher` set to `None` beats are only
    /// logged (dry run).
    pub fn new(subject_id: impl Into<String>, bpm: Arc<BpmSetting>, publisher: Option<P>) -> Self {
        Self {
            subject_id: subject_id.into(),
            bpm,
            sequence: AtomicU64::new(0),
            publisher,
        }
    }

    /// Subject id stamped on every beat.
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Shared rate setting.
    pub const fn bpm(&self) -> &Arc<BpmSetting> {
        &self.bpm
    }

    /// Beats emitted so far, including ones whose publish failed.
    pub fn beats_emitted(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Whether beats stay local.
    pub const fn is_dry_run(&self) -> bool {
        self.publisher.is_none()
    }

    /// Build and publish the next beat.
    ///
    /// A publish failure is logged and swallowed; the beat still counts as
    /// emitted and its sequence number is not reused. Returns `None` if
    /// `cancel` fires before the publish completes.
    pub async fn emit_once(&self, cancel: &CancellationToken) -> Option<BeatEvent> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        let event = BeatEvent::new(self.subject_id.clone(), sequence, Utc::now());

        match &self.publisher {
            None => info!(
                subject_id = self.subject_id,
                sequence,
                bpm = self.bpm.get(),
                "beat (dry run)"
            ),
            Some(publisher) => {
                let result = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        debug!(subject_id = self.subject_id, sequence, "publish abandoned");
                        return None;
                    }
                    result = publisher.publish(&event) => result,
                };
                match result {
                    Ok(()) => debug!(subject_id = self.subject_id, sequence, "beat published"),
                    Err(e) => warn!(
                        subject_id = self.subject_id,
                        sequence,
                        error = %e,
                        "failed to publish beat"
                    ),
                }
            }
        }
        Some(event)
    }

    /// Emit beats until `cancel` fires.
    pub async fn run(&self, cancel: &CancellationToken) {
        info!(
            subject_id = self.subject_id,
            bpm = self.bpm.get(),
            dry_run = self.is_dry_run(),
            "producer started"
        );

        while !cancel.is_cancelled() {
            let interval = self.bpm.interval();
            if self.emit_once(cancel).await.is_none() {
                break;
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }

        info!(
            subject_id = self.subject_id,
            beats = self.beats_emitted(),
            "producer stopped"
        );
    }

    /// One-line status: subject, current rate and beats emitted.
    pub fn status(&self) -> String {
        format!(
            "subject {}: {} BPM, {} beats emitted",
            self.subject_id,
            self.bpm.get(),
            self.beats_emitted()
        )
    }
}

/// A producer loop running on the runtime.
#[derive(Debug)]
pub struct ProducerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    grace: Duration,
}

impl ProducerHandle {
    /// Spawn `producer.run` with a child of `cancel`.
    pub fn spawn<P>(producer: Arc<BeatProducer<P>>, grace: Duration, cancel: &CancellationToken) -> Self
    where
        P: BeatPublisher + 'static,
    {
        let cancel = cancel.child_token();
        let run_cancel = cancel.clone();
        let task = tokio::spawn(async move { producer.run(&run_cancel).await });
        Self {
            cancel,
            task,
            grace,
        }
    }

    /// Cancel the loop and wait for it, bounded by the grace period.
    ///
    /// Returns `true` if the loop finished in time.
    pub async fn stop(self) -> bool {
        self.cancel.cancel();
        match tokio::time::timeout(self.grace, self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "producer task ended abnormally");
                true
            }
            Err(_) => {
                warn!(
                    grace_secs = self.grace.as_secs(),
                    "producer did not stop within grace period"
                );
                false
            }
        }
    }
}
