//! Per-subject estimator and escalation state owned by the ingestion loop.

use std::time::Duration;

use chrono::{DateTime, Utc};
use pulse_types::{Escalation, SubjectSnapshot};

use crate::monitor::IrregularityMonitor;
use crate::rate::RateEstimator;

/// Rate window and escalation timer for one subject.
///
/// Only the ingestion loop mutates a tracker. Readers get a
/// [`SubjectSnapshot`] copy.
#[derive(Debug, Clone)]
pub struct SubjectTracker {
    estimator: RateEstimator,
    monitor: IrregularityMonitor,
    beats: u64,
    last_beat_at: Option<DateTime<Utc>>,
}

impl SubjectTracker {
    /// Create a tracker with the given window size and escalation threshold.
    pub fn new(subject_id: impl Into<String>, window_size: usize, threshold: Duration) -> Self {
        Self {
            estimator: RateEstimator::new(window_size),
            monitor: IrregularityMonitor::new(subject_id, threshold),
            beats: 0,
            last_beat_at: None,
        }
    }

    /// Fold one beat and re-evaluate the escalation timer at `now`.
    pub fn record(&mut self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> Option<Escalation> {
        self.estimator.record_beat(timestamp);
        self.beats = self.beats.saturating_add(1);
        self.last_beat_at = Some(timestamp);
        self.monitor.observe(self.estimator.current_rate(), now)
    }

    /// Timestamp of the most recent beat, if any.
    pub const fn last_beat_at(&self) -> Option<DateTime<Utc>> {
        self.last_beat_at
    }

    /// Copy of the current state for the reporting loop.
    pub fn snapshot(&self) -> SubjectSnapshot {
        let bpm = self.estimator.current_rate();
        SubjectSnapshot {
            subject_id: self.monitor.subject_id().to_owned(),
            bpm,
            rhythm: IrregularityMonitor::rhythm_for(bpm),
            episode: self.monitor.episode(),
            beats: self.beats,
            last_beat_at: self.last_beat_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use chrono::TimeDelta;
    use pulse_types::{EpisodePhase, RhythmState};

    use super::*;

    #[test]
    fn snapshot_reflects_folded_beats() {
        let mut tracker = SubjectTracker::new("p-7", 10, Duration::from_secs(20));
        let start = DateTime::<Utc>::UNIX_EPOCH;
        assert_eq!(tracker.snapshot().bpm, None);

        for i in 0..5 {
            let ts = start + TimeDelta::milliseconds(i * 500);
            assert!(tracker.record(ts, ts).is_none());
        }

        let snap = tracker.snapshot();
        assert_eq!(snap.subject_id, "p-7");
        assert_eq!(snap.beats, 5);
        assert_eq!(snap.rhythm, Some(RhythmState::High));
        assert!((snap.bpm.unwrap() - 120.0).abs() < 1e-9);
        assert_eq!(snap.episode.phase, EpisodePhase::Pending);
        assert_eq!(snap.last_beat_at, Some(start + TimeDelta::milliseconds(2_000)));
        assert_eq!(tracker.last_beat_at(), snap.last_beat_at);
    }

    #[test]
    fn escalates_through_the_tracker() {
        let mut tracker = SubjectTracker::new("p-8", 10, Duration::from_secs(20));
        let start = DateTime::<Utc>::UNIX_EPOCH;
        let fired = (0..60)
            .filter_map(|i| {
                let ts = start + TimeDelta::milliseconds(i * 500);
                tracker.record(ts, ts)
            })
            .count();
        assert_eq!(fired, 1);
        assert_eq!(tracker.snapshot().episode.phase, EpisodePhase::Fired);
    }
}
