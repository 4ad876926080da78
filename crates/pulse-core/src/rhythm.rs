//! Rate to rhythm band classification.

use pulse_types::RhythmState;

/// Lowest rate, inclusive, classified as [`RhythmState::Normal`].
pub const NORMAL_LOW_BPM: f64 = 60.0;

/// Highest rate, inclusive, classified as [`RhythmState::Normal`].
pub const NORMAL_HIGH_BPM: f64 = 100.0;

/// Classify a rate in beats per minute.
///
/// Returns `None` for a non-finite rate, which the escalation monitor
/// treats the same as an absent rate.
pub fn classify(bpm: f64) -> Option<RhythmState> {
    if !bpm.is_finite() {
        return None;
    }
    if bpm < NORMAL_LOW_BPM {
        Some(RhythmState::Low)
    } else if bpm <= NORMAL_HIGH_BPM {
        Some(RhythmState::Normal)
    } else {
        Some(RhythmState::High)
    }
}
