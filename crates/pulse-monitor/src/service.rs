//! Monitor lifecycle: the ingestion and reporting loops and their shutdown.
//!
//! Both loops are spawned onto the runtime by [`MonitorService::start`]
//! and share one cancellation token. [`MonitorService::stop`] cancels it
//! and waits, up to the configured grace period, for both to finish.

use std::time::Duration;

use pulse_broker::BeatReceiver;
use pulse_types::{MonitorSnapshot, SubjectSnapshot};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ingest::Ingestor;
use crate::source::BeatSource;

/// Running monitor loops.
#[derive(Debug)]
pub struct MonitorService {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    snapshot: watch::Receiver<MonitorSnapshot>,
    grace: Duration,
}

impl MonitorService {
    /// Spawn the ingestion loop over `source` and a reporting loop that
    /// logs every subject's status each `report_interval`.
    pub fn start<R>(
        source: BeatSource<R>,
        mut ingestor: Ingestor,
        report_interval: Duration,
        grace: Duration,
        cancel: CancellationToken,
    ) -> Self
    where
        R: BeatReceiver + 'static,
    {
        let snapshot = ingestor.subscribe();

        let ingest_cancel = cancel.clone();
        let ingest = tokio::spawn(async move {
            source.run(&mut ingestor, ingest_cancel).await;
        });

        let report = tokio::spawn(report_loop(
            snapshot.clone(),
            report_interval,
            cancel.clone(),
        ));

        info!(
            report_interval_secs = report_interval.as_secs(),
            "monitor loops started"
        );
        Self {
            cancel,
            tasks: vec![ingest, report],
            snapshot,
            grace,
        }
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> MonitorSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Cancel both loops and wait for them, bounded by the grace period.
    ///
    /// Returns `true` if every loop finished within the grace period.
    pub async fn stop(self) -> bool {
        info!("stopping monitor");
        self.cancel.cancel();

        match tokio::time::timeout(self.grace, futures::future::join_all(self.tasks)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!(error = %e, "monitor task ended abnormally");
                    }
                }
                info!("monitor stopped");
                true
            }
            Err(_) => {
                warn!(
                    grace_secs = self.grace.as_secs(),
                    "monitor loops did not stop within grace period"
                );
                false
            }
        }
    }
}

async fn report_loop(
    snapshot: watch::Receiver<MonitorSnapshot>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately; skip it so the first report
    // comes one period after start.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let current = snapshot.borrow().clone();
        if current.subjects.is_empty() {
            info!("waiting for beats");
            continue;
        }
        for subject in current.subjects.values() {
            info!(
                subject_id = subject.subject_id,
                beats = subject.beats,
                episode = %subject.episode.phase,
                "{}",
                status_line(subject)
            );
        }
    }
}

/// One-line status for a subject, e.g. `72.0 BPM  [Normal]`.
pub fn status_line(subject: &SubjectSnapshot) -> String {
    match (subject.bpm, subject.rhythm) {
        (Some(bpm), Some(rhythm)) => format!("{bpm:.1} BPM  [{}]", rhythm.label()),
        _ => "-- BPM  [calculating...]".to_owned(),
    }
}

/// Status lines for every subject, sorted by subject id.
pub fn status_lines(snapshot: &MonitorSnapshot) -> Vec<String> {
    snapshot
        .subjects
        .values()
        .map(|s| format!("{}: {}", s.subject_id, status_line(s)))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pulse_types::{EscalationEpisode, RhythmState};

    use super::*;

    fn subject(bpm: Option<f64>, rhythm: Option<RhythmState>) -> SubjectSnapshot {
        SubjectSnapshot {
            subject_id: "p-1".to_owned(),
            bpm,
            rhythm,
            episode: EscalationEpisode::default(),
            beats: 0,
            last_beat_at: None,
        }
    }

    #[test]
    fn status_line_formats_known_rate() {
        let line = status_line(&subject(Some(131.24), Some(RhythmState::High)));
        assert_eq!(line, "131.2 BPM  [Tachycardia]");
    }

    #[test]
    fn status_line_without_rate_is_calculating() {
        assert_eq!(status_line(&subject(None, None)), "-- BPM  [calculating...]");
    }

    #[test]
    fn status_lines_prefix_subject_id() {
        let mut snapshot = MonitorSnapshot::default();
        snapshot
            .subjects
            .insert("p-1".to_owned(), subject(Some(72.0), Some(RhythmState::Normal)));
        assert_eq!(status_lines(&snapshot), vec!["p-1: 72.0 BPM  [Normal]".to_owned()]);
    }
}
