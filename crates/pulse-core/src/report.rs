//! Plain-text incident report handed to the triage consumer.

use std::fmt;

use chrono::SecondsFormat;
use pulse_types::Escalation;

/// Immutable incident text built at the moment of escalation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentReport {
    subject_id: String,
    text: String,
}

impl IncidentReport {
    /// Render the report for an escalation.
    pub fn from_escalation(escalation: &Escalation) -> Self {
        let label = escalation.state.label();
        let secs = escalation.duration.as_secs();
        let bpm = escalation.bpm;
        let text = format!(
            "INCIDENT REPORT - Irregular Heartbeat Detected\n\
             Subject  : {subject}\n\
             Status   : {label}\n\
             BPM      : {bpm:.1}\n\
             Duration : {secs} seconds of consecutive {label}\n\
             Timestamp: {at}\n\
             \n\
             The patient has been experiencing {lower} ({bpm:.1} BPM) for {secs} seconds. \
             Please assess the situation and advise on next steps.",
            subject = escalation.subject_id,
            at = escalation.at.to_rfc3339_opts(SecondsFormat::Millis, true),
            lower = label.to_lowercase(),
        );
        Self {
            subject_id: escalation.subject_id.clone(),
            text,
        }
    }

    /// Subject the report is about.
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Report body.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl From<&Escalation> for IncidentReport {
    fn from(escalation: &Escalation) -> Self {
        Self::from_escalation(escalation)
    }
}

impl fmt::Display for IncidentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use pulse_types::RhythmState;

    use super::*;

    #[test]
    fn report_carries_state_rate_duration_and_time() {
        let escalation = Escalation {
            subject_id: "a1b2c3d4".to_owned(),
            state: RhythmState::High,
            bpm: 131.24,
            duration: Duration::from_millis(21_400),
            at: DateTime::<Utc>::UNIX_EPOCH,
        };
        let report = IncidentReport::from(&escalation);
        let text = report.as_str();

        assert!(text.starts_with("INCIDENT REPORT"));
        assert!(text.contains("Status   : Tachycardia"));
        assert!(text.contains("BPM      : 131.2"));
        assert!(text.contains("21 seconds of consecutive Tachycardia"));
        assert!(text.contains("1970-01-01T00:00:00.000Z"));
        assert!(text.contains("experiencing tachycardia"));
        assert_eq!(report.subject_id(), "a1b2c3d4");
        assert_eq!(report.to_string(), text);
    }
}
