//! Integration tests for the monitor pipeline.
//!
//! The broker is replaced by a scripted in-memory receiver. Incident
//! hand-off is exercised against a live `pulse-triage` router bound to an
//! ephemeral local port, and against an endpoint nothing listens on.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use pulse_broker::{encode_beat, BeatReceiver, BrokerError, Delivery};
use pulse_core::IncidentReport;
use pulse_monitor::{
    AlertDispatcher, BeatSource, BrokerSource, DispatchOutcome, Ingestor, MonitorService,
};
use pulse_triage::{build_router, TriageState};
use pulse_types::{BeatEvent, EpisodePhase, Escalation, RhythmState};
use tokio_util::sync::CancellationToken;

// =========================================================================
// Scripted broker
// =========================================================================

type Batch = Result<Vec<Delivery<u32>>, BrokerError>;

/// Receiver that replays queued batches, then waits out `max_wait` empty.
///
/// Clones share the script, so a test keeps one to inspect acks.
#[derive(Clone, Default)]
struct ScriptedReceiver {
    batches: Arc<Mutex<VecDeque<Batch>>>,
    acked: Arc<Mutex<Vec<Vec<u32>>>>,
    receives: Arc<Mutex<usize>>,
    fail_ack: bool,
}

impl ScriptedReceiver {
    fn with_batches(batches: Vec<Batch>) -> Self {
        Self {
            batches: Arc::new(Mutex::new(batches.into())),
            ..Self::default()
        }
    }

    fn acked(&self) -> Vec<Vec<u32>> {
        self.acked.lock().unwrap().clone()
    }

    fn receives(&self) -> usize {
        *self.receives.lock().unwrap()
    }
}

impl BeatReceiver for ScriptedReceiver {
    type AckToken = u32;

    async fn receive(
        &self,
        _max_events: usize,
        max_wait: Duration,
    ) -> Result<Vec<Delivery<u32>>, BrokerError> {
        *self.receives.lock().unwrap() += 1;
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => {
                tokio::time::sleep(max_wait).await;
                Ok(Vec::new())
            }
        }
    }

    async fn acknowledge(&self, tokens: Vec<u32>) -> Result<(), BrokerError> {
        self.acked.lock().unwrap().push(tokens);
        if self.fail_ack {
            return Err(BrokerError::Acknowledge("scripted failure".to_owned()));
        }
        Ok(())
    }
}

fn at_ms(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::milliseconds(ms)
}

fn delivery(subject: &str, seq: u64, ms: i64) -> Delivery<u32> {
    let event = BeatEvent::new(subject, seq, at_ms(ms));
    Delivery::new(encode_beat(&event).unwrap(), u32::try_from(seq).unwrap())
}

fn dry_dispatcher() -> AlertDispatcher {
    AlertDispatcher::new(None, Duration::from_secs(1), 1, CancellationToken::new()).unwrap()
}

fn ingestor(dispatcher: AlertDispatcher) -> Ingestor {
    Ingestor::new(10, Duration::from_secs(20), dispatcher)
}

fn broker_source(receiver: &ScriptedReceiver) -> BrokerSource<ScriptedReceiver> {
    BrokerSource::new(
        receiver.clone(),
        100,
        Duration::from_secs(10),
        Duration::from_secs(2),
    )
}

// =========================================================================
// Batch folding and acknowledgement
// =========================================================================

#[tokio::test]
async fn test_bad_item_is_skipped_and_whole_batch_acknowledged() {
    let receiver = ScriptedReceiver::default();
    let source = broker_source(&receiver);
    let mut ingestor = ingestor(dry_dispatcher());

    let batch = vec![
        delivery("p-1", 1, 0),
        delivery("p-1", 2, 1_000),
        Delivery::new(b"{not json".to_vec(), 99),
        delivery("p-1", 3, 2_000),
        delivery("p-1", 4, 3_000),
    ];
    let summary = source.fold_batch(batch, &mut ingestor).await;

    assert_eq!(summary.received, 5);
    assert_eq!(summary.folded, 4);
    assert_eq!(summary.skipped, 1);
    assert!(summary.acknowledged);
    assert_eq!(receiver.acked(), vec![vec![1, 2, 99, 3, 4]]);

    let subject = ingestor.subject("p-1").unwrap();
    assert_eq!(subject.beats, 4);
    assert!((subject.bpm.unwrap() - 60.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_failed_acknowledge_keeps_folded_beats() {
    let receiver = ScriptedReceiver {
        fail_ack: true,
        ..ScriptedReceiver::default()
    };
    let source = broker_source(&receiver);
    let mut ingestor = ingestor(dry_dispatcher());

    let summary = source
        .fold_batch(vec![delivery("p-1", 1, 0), delivery("p-1", 2, 500)], &mut ingestor)
        .await;

    assert!(!summary.acknowledged);
    assert_eq!(summary.folded, 2);
    assert_eq!(ingestor.subject("p-1").unwrap().beats, 2);
}

#[tokio::test(start_paused = true)]
async fn test_receive_error_backs_off_then_continues() {
    let receiver = ScriptedReceiver::with_batches(vec![
        Err(BrokerError::Receive("connection reset".to_owned())),
        Ok(vec![delivery("p-1", 1, 0), delivery("p-1", 2, 1_000)]),
    ]);
    let source = BeatSource::Broker(broker_source(&receiver));
    let mut ingestor = ingestor(dry_dispatcher());
    let snapshot = ingestor.subscribe();

    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        source.run(&mut ingestor, run_cancel).await;
    });

    // Inside the 2s backoff only the failing receive has happened.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(receiver.receives(), 1);
    assert!(snapshot.borrow().subjects.is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(receiver.receives() >= 2);
    assert_eq!(snapshot.borrow().subjects.get("p-1").unwrap().beats, 2);
    assert_eq!(receiver.acked(), vec![vec![1, 2]]);

    cancel.cancel();
    tokio::time::timeout(Duration::from_millis(100), task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_exits_promptly() {
    let receiver = ScriptedReceiver::with_batches(vec![Err(BrokerError::Receive(
        "down".to_owned(),
    ))]);
    let source = BeatSource::Broker(broker_source(&receiver));
    let mut ingestor = ingestor(dry_dispatcher());

    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        source.run(&mut ingestor, run_cancel).await;
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    cancel.cancel();
    let joined = tokio::time::timeout(Duration::from_millis(100), task).await;
    assert!(joined.is_ok());
    assert_eq!(receiver.receives(), 1);
}

// =========================================================================
// Incident hand-off
// =========================================================================

async fn spawn_triage() -> (String, Arc<TriageState>) {
    let state = Arc::new(TriageState::new());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(Arc::clone(&state));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{addr}/triage/incident"), state)
}

fn escalation() -> Escalation {
    Escalation {
        subject_id: "p-7".to_owned(),
        state: RhythmState::High,
        bpm: 142.5,
        duration: Duration::from_secs(21),
        at: at_ms(0),
    }
}

#[tokio::test]
async fn test_incident_is_delivered_to_triage() {
    let (url, state) = spawn_triage().await;
    let dispatcher =
        AlertDispatcher::new(Some(url), Duration::from_secs(5), 2, CancellationToken::new())
            .unwrap();
    assert!(!dispatcher.is_dry_run());

    let report = IncidentReport::from(&escalation());
    let outcome = dispatcher.fire_incident(report.clone()).await.unwrap();

    assert_eq!(outcome, DispatchOutcome::Delivered { status: 202 });
    let stored = state.recent(1).await;
    assert_eq!(stored.first().unwrap().report, report.as_str());
}

#[tokio::test]
async fn test_escalation_from_ingestion_reaches_triage() {
    let (url, state) = spawn_triage().await;
    let dispatcher =
        AlertDispatcher::new(Some(url), Duration::from_secs(5), 2, CancellationToken::new())
            .unwrap();
    let mut ingestor = ingestor(dispatcher);

    // 150 BPM for 30 seconds: one escalation.
    let fired = (0..75_i64)
        .filter_map(|i| {
            let event = BeatEvent::new("p-8", u64::try_from(i).unwrap(), at_ms(i * 400));
            ingestor.fold_at(&event, event.timestamp)
        })
        .count();
    assert_eq!(fired, 1);

    let mut stored = 0;
    for _ in 0..50 {
        stored = state.len().await;
        if stored > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(stored, 1);
    let report = state.recent(1).await.pop().unwrap().report;
    assert!(report.contains("Tachycardia"));
    assert!(report.contains("p-8"));
}

#[tokio::test]
async fn test_unreachable_triage_does_not_stall_ingestion() {
    let dispatcher = AlertDispatcher::new(
        Some("http://127.0.0.1:9/triage/incident".to_owned()),
        Duration::from_secs(1),
        1,
        CancellationToken::new(),
    )
    .unwrap();
    let mut ingestor = ingestor(dispatcher);

    let mut fold = |seq: i64, ms: i64| {
        let event = BeatEvent::new("p-9", u64::try_from(seq).unwrap(), at_ms(ms));
        ingestor.fold_at(&event, event.timestamp).is_some()
    };

    // First episode at 40 BPM escalates.
    let first = (0..20).filter(|&i| fold(i, i * 1_500)).count();
    assert_eq!(first, 1);

    // Back to normal, then a second abnormal run escalates again.
    let base = 20 * 1_500;
    let normal = (0..20).filter(|&i| fold(20 + i, base + i * 800)).count();
    assert_eq!(normal, 0);
    let base = base + 20 * 800;
    let second = (0..80).filter(|&i| fold(40 + i, base + i * 400)).count();
    assert_eq!(second, 1);

    assert_eq!(ingestor.subject("p-9").unwrap().beats, 120);
    assert_eq!(ingestor.subject("p-9").unwrap().episode.phase, EpisodePhase::Fired);
}

// =========================================================================
// Service lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_service_stops_within_grace_period() {
    let receiver = ScriptedReceiver::with_batches(vec![Ok(vec![
        delivery("p-1", 1, 0),
        delivery("p-1", 2, 750),
    ])]);
    let source = BeatSource::Broker(broker_source(&receiver));

    let service = MonitorService::start(
        source,
        ingestor(dry_dispatcher()),
        Duration::from_secs(5),
        Duration::from_secs(3),
        CancellationToken::new(),
    );

    tokio::time::sleep(Duration::from_secs(6)).await;
    let snapshot = service.snapshot();
    let subject = snapshot.subjects.get("p-1").unwrap();
    assert!((subject.bpm.unwrap() - 80.0).abs() < 1e-9);

    assert!(service.stop().await);
}
