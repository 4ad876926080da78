//! Per-subject escalation state machine.
//!
//! [`IrregularityMonitor`] turns a stream of rate readings into at most one
//! [`Escalation`] per contiguous abnormal run:
//!
//! ```text
//!            abnormal              abnormal, elapsed >= threshold
//!   Clear ------------> Pending ---------------------------------> Fired
//!     ^                    |                                         |
//!     +------- normal -----+------------------ normal ---------------+
//! ```
//!
//! An absent or non-finite rate is not a reading and changes nothing.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use pulse_types::{EpisodePhase, Escalation, EscalationEpisode, RhythmState};
use tracing::{debug, info, warn};

use crate::rhythm::classify;

/// Escalation timer for a single subject.
#[derive(Debug, Clone)]
pub struct IrregularityMonitor {
    subject_id: String,
    threshold: TimeDelta,
    episode: EscalationEpisode,
}

impl IrregularityMonitor {
    /// Create a monitor in the `Clear` phase.
    pub fn new(subject_id: impl Into<String>, threshold: Duration) -> Self {
        Self {
            subject_id: subject_id.into(),
            threshold: TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX),
            episode: EscalationEpisode::default(),
        }
    }

    /// Feed the latest rate observed at `now`.
    ///
    /// Returns the escalation on the single reading that moves the episode
    /// from `Pending` to `Fired`, and `None` otherwise.
    pub fn observe(&mut self, bpm: Option<f64>, now: DateTime<Utc>) -> Option<Escalation> {
        let bpm = bpm?;
        let state = classify(bpm)?;

        if !state.is_abnormal() {
            if self.episode.phase != EpisodePhase::Clear {
                info!(
                    subject_id = self.subject_id,
                    bpm,
                    previous = %self.episode.phase,
                    "rhythm back to normal, episode cleared"
                );
            }
            self.episode = EscalationEpisode::default();
            return None;
        }

        match (self.episode.phase, self.episode.since) {
            (EpisodePhase::Clear, _) | (EpisodePhase::Pending, None) => {
                self.episode = EscalationEpisode {
                    phase: EpisodePhase::Pending,
                    since: Some(now),
                };
                debug!(
                    subject_id = self.subject_id,
                    bpm,
                    state = %state,
                    "abnormal rhythm, escalation timer started"
                );
                None
            }
            (EpisodePhase::Pending, Some(since)) => {
                let elapsed = now.signed_duration_since(since);
                if elapsed < self.threshold {
                    return None;
                }
                self.episode.phase = EpisodePhase::Fired;
                let escalation = Escalation {
                    subject_id: self.subject_id.clone(),
                    state,
                    bpm,
                    duration: elapsed.to_std().unwrap_or_default(),
                    at: now,
                };
                warn!(
                    subject_id = self.subject_id,
                    bpm,
                    state = %state,
                    duration_secs = escalation.duration.as_secs(),
                    "sustained irregular rhythm, escalating"
                );
                Some(escalation)
            }
            (EpisodePhase::Fired, _) => None,
        }
    }

    /// Current episode state.
    pub const fn episode(&self) -> EscalationEpisode {
        self.episode
    }

    /// Subject this monitor tracks.
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Rhythm band that would be recorded for `bpm`.
    pub fn rhythm_for(bpm: Option<f64>) -> Option<RhythmState> {
        bpm.and_then(classify)
    }
}
