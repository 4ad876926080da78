//! Core monitoring logic for Pulse Watch.
//!
//! Everything here is synchronous and free of I/O apart from config file
//! loading, so the timing rules can be tested with fixed timestamps.
//!
//! # Pipeline
//!
//! ```text
//! beat timestamp --> RateEstimator --> classify --> IrregularityMonitor --> Escalation
//! ```
//!
//! # Modules
//!
//! - [`rate`] -- Sliding-window rate estimation
//! - [`rhythm`] -- Rate to rhythm band classification
//! - [`monitor`] -- Single-fire escalation state machine
//! - [`tracker`] -- Per-subject estimator and monitor pair
//! - [`report`] -- Incident report text
//! - [`bpm`] -- Live-adjustable beat rate for the synthetic loops
//! - [`command`] -- Operator command parsing
//! - [`config`] -- YAML configuration with env overrides
//! - [`error`] -- Error types

pub mod bpm;
pub mod command;
pub mod config;
pub mod error;
pub mod monitor;
pub mod rate;
pub mod report;
pub mod rhythm;
pub mod tracker;

pub use bpm::{BpmSetting, MAX_BPM, MIN_BPM};
pub use command::Command;
pub use config::PulseConfig;
pub use error::CoreError;
pub use monitor::IrregularityMonitor;
pub use rate::RateEstimator;
pub use report::IncidentReport;
pub use rhythm::classify;
pub use tracker::SubjectTracker;
