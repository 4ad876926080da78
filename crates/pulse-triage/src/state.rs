//! In-memory incident log shared by the intake handlers.
//!
//! Newest incidents come first. The log is capped at
//! [`MAX_INCIDENTS`]; older entries fall off the end.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Most incidents kept in memory.
pub const MAX_INCIDENTS: usize = 500;

/// An incident report as received by the intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedIncident {
    /// Id assigned on receipt.
    pub id: Uuid,
    /// Report text, unchanged.
    pub report: String,
    /// When the intake accepted it.
    pub received_at: DateTime<Utc>,
}

/// Shared state for the triage router.
#[derive(Debug, Default)]
pub struct TriageState {
    incidents: RwLock<VecDeque<ReceivedIncident>>,
}

impl TriageState {
    /// Create an empty incident log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a report and return the stored record.
    pub async fn record(&self, report: String) -> ReceivedIncident {
        let incident = ReceivedIncident {
            id: Uuid::new_v4(),
            report,
            received_at: Utc::now(),
        };

        let mut incidents = self.incidents.write().await;
        incidents.push_front(incident.clone());
        incidents.truncate(MAX_INCIDENTS);
        incident
    }

    /// Up to `limit` most recent incidents, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<ReceivedIncident> {
        self.incidents.read().await.iter().take(limit).cloned().collect()
    }

    /// Number of incidents held.
    pub async fn len(&self) -> usize {
        self.incidents.read().await.len()
    }

    /// Whether no incident has been received.
    pub async fn is_empty(&self) -> bool {
        self.incidents.read().await.is_empty()
    }
}
