//! Fire-and-forget incident hand-off to the triage consumer.
//!
//! [`AlertDispatcher::fire_incident`] spawns a detached task and returns
//! immediately, so a slow or unreachable triage endpoint never stalls
//! beat ingestion. Each incident gets exactly one POST with a bounded
//! timeout. Success and failure are both final: there is no retry, and
//! failures are only logged.

use std::sync::Arc;
use std::time::Duration;

use pulse_core::config::AlertConfig;
use pulse_core::IncidentReport;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::MonitorError;

/// How a single incident hand-off ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The triage endpoint answered with a 2xx status.
    Delivered {
        /// HTTP status code returned.
        status: u16,
    },
    /// No triage URL is configured; the incident was only logged.
    Skipped,
    /// Network error, timeout or non-2xx status.
    Failed(String),
    /// Shutdown started before the call completed.
    Cancelled,
}

/// Sends incident reports to the triage intake without blocking the caller.
///
/// Cheap to clone; clones share the HTTP client and the in-flight limit.
#[derive(Debug, Clone)]
pub struct AlertDispatcher {
    client: reqwest::Client,
    url: Option<Arc<str>>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl AlertDispatcher {
    /// Create a dispatcher posting to `url`, or logging only when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::HttpClient`] if the HTTP client cannot be
    /// built.
    pub fn new(
        url: Option<String>,
        timeout: Duration,
        max_in_flight: usize,
        cancel: CancellationToken,
    ) -> Result<Self, MonitorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            url: url.filter(|u| !u.trim().is_empty()).map(Arc::from),
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            cancel,
        })
    }

    /// Create a dispatcher from the `alert` config section.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::HttpClient`] if the HTTP client cannot be
    /// built.
    pub fn from_config(config: &AlertConfig, cancel: CancellationToken) -> Result<Self, MonitorError> {
        Self::new(
            config.triage_url.clone(),
            config.timeout(),
            config.max_in_flight,
            cancel,
        )
    }

    /// Whether incidents are actually sent anywhere.
    pub const fn is_dry_run(&self) -> bool {
        self.url.is_none()
    }

    /// Hand the report off on a detached task.
    ///
    /// The returned handle may be dropped; callers on the ingestion path
    /// never await it.
    pub fn fire_incident(&self, report: IncidentReport) -> JoinHandle<DispatchOutcome> {
        let this = self.clone();
        tokio::spawn(async move { this.deliver(report).await })
    }

    async fn deliver(&self, report: IncidentReport) -> DispatchOutcome {
        warn!(
            subject_id = report.subject_id(),
            "health triage alert: irregular heartbeat\n{report}"
        );

        let Some(url) = self.url.as_deref() else {
            info!(
                subject_id = report.subject_id(),
                "triage endpoint not configured, skipping hand-off (dry run)"
            );
            return DispatchOutcome::Skipped;
        };

        let _permit = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return DispatchOutcome::Cancelled,
            permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return DispatchOutcome::Cancelled,
            },
        };

        let body = serde_json::json!({ "report": report.as_str() });
        let send = self.client.post(url).json(&body).send();

        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return DispatchOutcome::Cancelled,
            response = send => response,
        };

        match response {
            Ok(response) if response.status().is_success() => {
                let status = response.status().as_u16();
                info!(
                    subject_id = report.subject_id(),
                    status,
                    "incident handed off to triage"
                );
                DispatchOutcome::Delivered { status }
            }
            Ok(response) => {
                let status = response.status();
                error!(
                    subject_id = report.subject_id(),
                    url = url,
                    status = status.as_u16(),
                    "triage endpoint rejected incident"
                );
                DispatchOutcome::Failed(format!("triage endpoint returned {status}"))
            }
            Err(e) => {
                error!(
                    subject_id = report.subject_id(),
                    url = url,
                    error = %e,
                    "incident hand-off failed"
                );
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }
}
