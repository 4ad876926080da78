//! Configuration loading and typed config structures for Pulse Watch.
//!
//! Configuration lives in an optional `pulse-config.yaml` (or the file
//! named by `PULSE_CONFIG`). Every field has a default, so a missing file
//! or a partial file is valid. A handful of environment variables override
//! the connection settings after the YAML is parsed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::bpm::{MAX_BPM, MIN_BPM};
use crate::error::CoreError;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "pulse-config.yaml";

/// Top-level configuration shared by every Pulse Watch binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PulseConfig {
    /// Ingestion, estimation and escalation settings.
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Broker connection and pull settings.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Incident hand-off settings.
    #[serde(default)]
    pub alert: AlertConfig,

    /// Synthetic producer settings.
    #[serde(default)]
    pub producer: ProducerConfig,

    /// Triage intake server settings.
    #[serde(default)]
    pub triage: TriageConfig,
}

impl PulseConfig {
    /// Load configuration from `PULSE_CONFIG` or [`DEFAULT_CONFIG_FILE`].
    ///
    /// Falls back to defaults when the file does not exist. Environment
    /// overrides are applied and the result is validated.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Io`] or [`CoreError::Yaml`] if an existing
    /// file cannot be read or parsed, and [`CoreError::InvalidConfig`]
    /// if validation fails.
    pub fn load() -> Result<Self, CoreError> {
        let path = std::env::var("PULSE_CONFIG")
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);

        let config = if path.exists() {
            info!(path = %path.display(), "loading config file");
            Self::from_file(&path)?
        } else {
            info!(path = %path.display(), "config file not found, using defaults");
            let mut config = Self::default();
            config.apply_env_overrides();
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Io`] if the file cannot be read, or
    /// [`CoreError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string and apply env overrides.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, CoreError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply overrides from the process environment.
    ///
    /// - `NATS_URL` overrides `broker.url`
    /// - `PULSE_TOPIC` overrides `broker.topic`
    /// - `PULSE_SUBSCRIPTION` overrides `broker.subscription`
    /// - `PULSE_TRIAGE_URL` overrides `alert.triage_url`
    /// - `PULSE_SUBJECT_ID` overrides `producer.subject_id`
    /// - `PULSE_TRIAGE_PORT` overrides `triage.port` (ignored if not a port)
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary lookup. Blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(val) = get("NATS_URL") {
            self.broker.url = Some(val);
        }
        if let Some(val) = get("PULSE_TOPIC") {
            self.broker.topic = val;
        }
        if let Some(val) = get("PULSE_SUBSCRIPTION") {
            self.broker.subscription = val;
        }
        if let Some(val) = get("PULSE_TRIAGE_URL") {
            self.alert.triage_url = Some(val);
        }
        if let Some(val) = get("PULSE_SUBJECT_ID") {
            self.producer.subject_id = Some(val);
        }
        if let Some(port) = get("PULSE_TRIAGE_PORT").and_then(|v| v.parse().ok()) {
            self.triage.port = port;
        }
    }

    /// Reject values the loops cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), CoreError> {
        let bad = |msg: &str| Err(CoreError::InvalidConfig(msg.to_owned()));

        if self.monitor.window_size < 2 {
            return bad("monitor.window_size must be at least 2");
        }
        if self.monitor.report_interval_secs == 0 {
            return bad("monitor.report_interval_secs must be positive");
        }
        if self.monitor.shutdown_grace_secs == 0 {
            return bad("monitor.shutdown_grace_secs must be positive");
        }
        if self.monitor.max_subjects == 0 {
            return bad("monitor.max_subjects must be positive");
        }
        if !(MIN_BPM..=MAX_BPM).contains(&self.monitor.initial_bpm) {
            return bad("monitor.initial_bpm must be between 1 and 300");
        }
        if !(MIN_BPM..=MAX_BPM).contains(&self.producer.initial_bpm) {
            return bad("producer.initial_bpm must be between 1 and 300");
        }
        if self.broker.max_events == 0 {
            return bad("broker.max_events must be positive");
        }
        if self.broker.max_wait_secs == 0 {
            return bad("broker.max_wait_secs must be positive");
        }
        if self.broker.receive_backoff_secs == 0 {
            return bad("broker.receive_backoff_secs must be positive");
        }
        if self.alert.timeout_secs == 0 {
            return bad("alert.timeout_secs must be positive");
        }
        if self.alert.max_in_flight == 0 {
            return bad("alert.max_in_flight must be positive");
        }
        Ok(())
    }

    /// Whether no broker is configured, so beats stay local.
    pub fn is_dry_run(&self) -> bool {
        self.broker.url.as_deref().is_none_or(|url| url.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Settings for the ingestion and reporting loops.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MonitorConfig {
    /// Number of beat timestamps kept per subject.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Seconds an abnormal run must last before escalating.
    #[serde(default = "default_escalation_threshold_secs")]
    pub escalation_threshold_secs: u64,

    /// Seconds between status lines from the reporting loop.
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,

    /// Seconds shutdown waits for loops to exit.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Subject id used by the synthetic source in dry run.
    #[serde(default = "default_dry_run_subject")]
    pub subject_id: String,

    /// Starting rate for the synthetic source.
    #[serde(default = "default_bpm")]
    pub initial_bpm: u32,

    /// Subjects tracked at once. A new subject past this bound evicts the
    /// one whose last beat is oldest.
    #[serde(default = "default_max_subjects")]
    pub max_subjects: usize,
}

impl MonitorConfig {
    /// Escalation threshold as a [`Duration`].
    pub const fn escalation_threshold(&self) -> Duration {
        Duration::from_secs(self.escalation_threshold_secs)
    }

    /// Reporting period as a [`Duration`].
    pub const fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    /// Shutdown grace period as a [`Duration`].
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            escalation_threshold_secs: default_escalation_threshold_secs(),
            report_interval_secs: default_report_interval_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            subject_id: default_dry_run_subject(),
            initial_bpm: default_bpm(),
            max_subjects: default_max_subjects(),
        }
    }
}

// ---------------------------------------------------------------------------
// Broker
// ---------------------------------------------------------------------------

/// NATS `JetStream` connection and pull settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrokerConfig {
    /// Server URL. `None` selects dry run.
    #[serde(default)]
    pub url: Option<String>,

    /// Stream name; beats are published on `{topic}.{subject_id}`.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Durable consumer name used by the monitor.
    #[serde(default = "default_subscription")]
    pub subscription: String,

    /// Upper bound on deliveries returned by one receive.
    #[serde(default = "default_max_events")]
    pub max_events: usize,

    /// Seconds a receive may wait for the batch to fill.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Seconds to back off after a failed receive.
    #[serde(default = "default_receive_backoff_secs")]
    pub receive_backoff_secs: u64,
}

impl BrokerConfig {
    /// Receive wait bound as a [`Duration`].
    pub const fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    /// Backoff after a receive failure as a [`Duration`].
    pub const fn receive_backoff(&self) -> Duration {
        Duration::from_secs(self.receive_backoff_secs)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: None,
            topic: default_topic(),
            subscription: default_subscription(),
            max_events: default_max_events(),
            max_wait_secs: default_max_wait_secs(),
            receive_backoff_secs: default_receive_backoff_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Alert
// ---------------------------------------------------------------------------

/// Incident hand-off settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AlertConfig {
    /// Triage intake URL. `None` logs incidents without sending them.
    #[serde(default)]
    pub triage_url: Option<String>,

    /// Seconds before an incident POST is abandoned.
    #[serde(default = "default_alert_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum incident POSTs in flight at once.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl AlertConfig {
    /// Network timeout as a [`Duration`].
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            triage_url: None,
            timeout_secs: default_alert_timeout_secs(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

/// Synthetic producer settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProducerConfig {
    /// Subject id stamped on every beat. Generated when absent.
    #[serde(default)]
    pub subject_id: Option<String>,

    /// Starting rate.
    #[serde(default = "default_bpm")]
    pub initial_bpm: u32,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            subject_id: None,
            initial_bpm: default_bpm(),
        }
    }
}

// ---------------------------------------------------------------------------
// Triage
// ---------------------------------------------------------------------------

/// Triage intake server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TriageConfig {
    /// Bind address.
    #[serde(default = "default_triage_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_triage_port")]
    pub port: u16,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            host: default_triage_host(),
            port: default_triage_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_window_size() -> usize {
    10
}

const fn default_escalation_threshold_secs() -> u64 {
    20
}

const fn default_report_interval_secs() -> u64 {
    5
}

const fn default_shutdown_grace_secs() -> u64 {
    3
}

fn default_dry_run_subject() -> String {
    "dry-run".to_owned()
}

const fn default_bpm() -> u32 {
    72
}

const fn default_max_subjects() -> usize {
    1024
}

fn default_topic() -> String {
    "heartbeats".to_owned()
}

fn default_subscription() -> String {
    "heartbeat-monitor".to_owned()
}

const fn default_max_events() -> usize {
    100
}

const fn default_max_wait_secs() -> u64 {
    10
}

const fn default_receive_backoff_secs() -> u64 {
    2
}

const fn default_alert_timeout_secs() -> u64 {
    10
}

const fn default_max_in_flight() -> usize {
    4
}

fn default_triage_host() -> String {
    "127.0.0.1".to_owned()
}

const fn default_triage_port() -> u16 {
    5100
}
