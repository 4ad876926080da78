//! Folding decoded beats into per-subject trackers.
//!
//! The [`Ingestor`] is owned by the single ingestion loop, so estimator and
//! escalation updates for a subject are strictly ordered. After every beat
//! it publishes a fresh [`MonitorSnapshot`] over a watch channel for the
//! reporting loop, and on escalation it hands an [`IncidentReport`] to the
//! [`AlertDispatcher`] without waiting for the outcome.
//!
//! At most `max_subjects` subjects are tracked. A beat from a new subject
//! past that bound evicts the subject whose last beat is oldest, from both
//! the trackers and the published snapshot.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pulse_core::{IncidentReport, SubjectTracker};
use pulse_types::{BeatEvent, Escalation, MonitorSnapshot, SubjectSnapshot};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::dispatch::AlertDispatcher;

/// Subjects tracked at once unless configured otherwise.
pub const DEFAULT_MAX_SUBJECTS: usize = 1024;

/// Per-subject rate and escalation state for the ingestion loop.
#[derive(Debug)]
pub struct Ingestor {
    window_size: usize,
    threshold: Duration,
    max_subjects: usize,
    trackers: BTreeMap<String, SubjectTracker>,
    snapshot: watch::Sender<MonitorSnapshot>,
    dispatcher: AlertDispatcher,
}

impl Ingestor {
    /// Create an ingestor with no subjects yet.
    pub fn new(window_size: usize, threshold: Duration, dispatcher: AlertDispatcher) -> Self {
        let (snapshot, _) = watch::channel(MonitorSnapshot::default());
        Self {
            window_size,
            threshold,
            max_subjects: DEFAULT_MAX_SUBJECTS,
            trackers: BTreeMap::new(),
            snapshot,
            dispatcher,
        }
    }

    /// Cap the number of tracked subjects. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_max_subjects(mut self, max_subjects: usize) -> Self {
        self.max_subjects = max_subjects.max(1);
        self
    }

    /// Receiver for the snapshot published after every folded beat.
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshot.subscribe()
    }

    /// Fold a beat received now.
    pub fn fold(&mut self, event: &BeatEvent) -> Option<Escalation> {
        self.fold_at(event, Utc::now())
    }

    /// Fold a beat, evaluating the escalation timer at `now`.
    ///
    /// Must be called from within a tokio runtime: an escalation spawns the
    /// incident hand-off.
    pub fn fold_at(&mut self, event: &BeatEvent, now: DateTime<Utc>) -> Option<Escalation> {
        if !self.trackers.contains_key(&event.subject_id) {
            self.make_room();
        }
        let tracker = self
            .trackers
            .entry(event.subject_id.clone())
            .or_insert_with(|| {
                info!(subject_id = event.subject_id, "tracking new subject");
                SubjectTracker::new(event.subject_id.clone(), self.window_size, self.threshold)
            });

        let escalation = tracker.record(event.timestamp, now);
        let snap = tracker.snapshot();
        debug!(
            subject_id = event.subject_id,
            sequence = event.sequence_number,
            bpm = snap.bpm,
            "beat folded"
        );

        self.snapshot.send_modify(|all| {
            all.subjects.insert(snap.subject_id.clone(), snap);
        });

        if let Some(escalation) = &escalation {
            drop(self.dispatcher.fire_incident(IncidentReport::from(escalation)));
        }
        escalation
    }

    /// Evict least recently heard subjects until a new one fits.
    fn make_room(&mut self) {
        while self.trackers.len() >= self.max_subjects {
            let Some(oldest) = self
                .trackers
                .iter()
                .min_by_key(|(_, tracker)| tracker.last_beat_at())
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            self.trackers.remove(&oldest);
            self.snapshot.send_modify(|all| {
                all.subjects.remove(&oldest);
            });
            info!(
                subject_id = oldest,
                max_subjects = self.max_subjects,
                "evicted idle subject"
            );
        }
    }

    /// Current state of one subject.
    pub fn subject(&self, subject_id: &str) -> Option<SubjectSnapshot> {
        self.trackers.get(subject_id).map(SubjectTracker::snapshot)
    }

    /// Number of subjects seen so far.
    pub fn subject_count(&self) -> usize {
        self.trackers.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use chrono::TimeDelta;
    use pulse_types::EpisodePhase;
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn ingestor() -> Ingestor {
        let dispatcher =
            AlertDispatcher::new(None, Duration::from_secs(1), 1, CancellationToken::new()).unwrap();
        Ingestor::new(10, Duration::from_secs(20), dispatcher)
    }

    fn beat(subject: &str, seq: u64, ms: i64) -> BeatEvent {
        BeatEvent::new(subject, seq, DateTime::<Utc>::UNIX_EPOCH + TimeDelta::milliseconds(ms))
    }

    #[tokio::test]
    async fn subjects_are_tracked_independently() {
        let mut ingestor = ingestor();
        for i in 0..5_u64 {
            let ms = i64::try_from(i).unwrap();
            let fast = beat("fast", i, ms * 500);
            let slow = beat("slow", i, ms * 1_000);
            ingestor.fold_at(&fast, fast.timestamp);
            ingestor.fold_at(&slow, slow.timestamp);
        }

        assert_eq!(ingestor.subject_count(), 2);
        let fast = ingestor.subject("fast").unwrap();
        let slow = ingestor.subject("slow").unwrap();
        assert!((fast.bpm.unwrap() - 120.0).abs() < 1e-9);
        assert!((slow.bpm.unwrap() - 60.0).abs() < 1e-9);
        assert_eq!(fast.episode.phase, EpisodePhase::Pending);
        assert_eq!(slow.episode.phase, EpisodePhase::Clear);
    }

    #[tokio::test]
    async fn snapshot_is_published_after_each_beat() {
        let mut ingestor = ingestor();
        let rx = ingestor.subscribe();
        assert!(rx.borrow().subjects.is_empty());

        let first = beat("p-1", 1, 0);
        ingestor.fold_at(&first, first.timestamp);
        assert_eq!(rx.borrow().subjects.get("p-1").unwrap().beats, 1);

        let second = beat("p-1", 2, 1_000);
        ingestor.fold_at(&second, second.timestamp);
        let snap = rx.borrow().clone();
        let subject = snap.subjects.get("p-1").unwrap();
        assert_eq!(subject.beats, 2);
        assert!((subject.bpm.unwrap() - 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn escalation_is_returned_once() {
        let mut ingestor = ingestor();
        let fired = (0..80_i64)
            .filter_map(|i| {
                let event = beat("p-2", u64::try_from(i).unwrap(), i * 400);
                ingestor.fold_at(&event, event.timestamp)
            })
            .count();
        assert_eq!(fired, 1);
        assert_eq!(ingestor.subject("p-2").unwrap().episode.phase, EpisodePhase::Fired);
    }

    #[tokio::test]
    async fn new_subject_past_bound_evicts_least_recent() {
        let mut ingestor = ingestor().with_max_subjects(2);
        let rx = ingestor.subscribe();

        for (subject, ms) in [("a", 0), ("b", 1_000), ("a", 2_000), ("c", 3_000)] {
            let event = beat(subject, 1, ms);
            ingestor.fold_at(&event, event.timestamp);
        }

        assert_eq!(ingestor.subject_count(), 2);
        assert!(ingestor.subject("b").is_none());
        assert_eq!(ingestor.subject("a").unwrap().beats, 2);
        assert_eq!(ingestor.subject("c").unwrap().beats, 1);
        let snap = rx.borrow().clone();
        assert_eq!(snap.subjects.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn known_subject_at_bound_is_not_evicted() {
        let mut ingestor = ingestor().with_max_subjects(1);
        for i in 0..3_i64 {
            let event = beat("solo", u64::try_from(i).unwrap(), i * 1_000);
            ingestor.fold_at(&event, event.timestamp);
        }
        assert_eq!(ingestor.subject("solo").unwrap().beats, 3);
    }

    #[tokio::test]
    async fn unknown_subject_has_no_snapshot() {
        assert!(ingestor().subject("nobody").is_none());
    }
}
