//! Enumeration types for the Pulse Watch monitor.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rhythm bands
// ---------------------------------------------------------------------------

/// Classification of a derived beat rate into one of three bands.
///
/// The band boundaries are inclusive to [`RhythmState::Normal`]: a rate of
/// exactly 60 or exactly 100 beats per minute is normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RhythmState {
    /// Below 60 beats per minute (bradycardia).
    Low,
    /// Between 60 and 100 beats per minute inclusive.
    Normal,
    /// Above 100 beats per minute (tachycardia).
    High,
}

impl RhythmState {
    /// Clinical label used in incident reports and status lines.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Bradycardia",
            Self::Normal => "Normal",
            Self::High => "Tachycardia",
        }
    }

    /// Whether this band counts toward an abnormal episode.
    pub const fn is_abnormal(self) -> bool {
        !matches!(self, Self::Normal)
    }
}

impl fmt::Display for RhythmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Escalation phases
// ---------------------------------------------------------------------------

/// Phase of the per-subject escalation state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EpisodePhase {
    /// No abnormal run is in progress.
    #[default]
    Clear,
    /// An abnormal run started but has not yet lasted the threshold.
    Pending,
    /// The escalation for the current run has been emitted.
    Fired,
}

impl fmt::Display for EpisodePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Clear => "clear",
            Self::Pending => "pending",
            Self::Fired => "fired",
        };
        f.write_str(name)
    }
}
