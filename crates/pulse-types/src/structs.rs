//! Core structs shared across the Pulse Watch workspace.
//!
//! [`BeatEvent`] is the only type that travels over the broker. The rest
//! are produced by the ingestion loop and read by the reporting loop and
//! the alert path.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{EpisodePhase, RhythmState};

// ---------------------------------------------------------------------------
// Wire payload
// ---------------------------------------------------------------------------

/// A single beat as emitted by a sensor or the synthetic producer.
///
/// Carries identity, sequence and arrival time only. No rate is ever
/// transmitted; consumers derive it from the spacing of timestamps.
///
/// Serialized as camelCase JSON. The `personId` and `beatNumber` field
/// names, and their PascalCase forms, are accepted on input for
/// compatibility with older producers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeatEvent {
    /// Identifier of the monitored subject.
    #[serde(alias = "personId", alias = "PersonId", alias = "SubjectId")]
    pub subject_id: String,
    /// Monotonically increasing per-subject sequence number.
    #[serde(alias = "beatNumber", alias = "BeatNumber", alias = "SequenceNumber")]
    pub sequence_number: u64,
    /// Instant at which the beat occurred.
    #[serde(alias = "Timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl BeatEvent {
    /// Build a beat for `subject_id` with the given sequence and timestamp.
    pub fn new(subject_id: impl Into<String>, sequence_number: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            subject_id: subject_id.into(),
            sequence_number,
            timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Escalation
// ---------------------------------------------------------------------------

/// Live escalation state for one subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationEpisode {
    /// Current phase of the state machine.
    pub phase: EpisodePhase,
    /// When the current abnormal run began. `None` while clear.
    pub since: Option<DateTime<Utc>>,
}

/// Emitted exactly once when an abnormal run outlasts the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Escalation {
    /// Subject whose rhythm escalated.
    pub subject_id: String,
    /// Rhythm band at the moment of escalation.
    pub state: RhythmState,
    /// Derived rate in beats per minute at the moment of escalation.
    pub bpm: f64,
    /// How long the abnormal run had lasted.
    pub duration: Duration,
    /// Instant at which the escalation fired.
    pub at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Read-only view of one subject, published after every folded beat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectSnapshot {
    /// Subject identifier.
    pub subject_id: String,
    /// Most recent derived rate, absent until two beats are known.
    pub bpm: Option<f64>,
    /// Rhythm band for [`Self::bpm`].
    pub rhythm: Option<RhythmState>,
    /// Escalation episode state.
    pub episode: EscalationEpisode,
    /// Total beats folded for this subject.
    pub beats: u64,
    /// Timestamp of the most recent beat.
    pub last_beat_at: Option<DateTime<Utc>>,
}

/// Snapshot of every tracked subject, keyed by subject id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// Per-subject state.
    pub subjects: BTreeMap<String, SubjectSnapshot>,
}
