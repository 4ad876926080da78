//! Heartbeat monitor for Pulse Watch.
//!
//! Consumes beats from the broker (or generates them locally in dry run),
//! keeps a per-subject rate estimate and escalation timer, and hands an
//! incident report to the triage intake when an abnormal rhythm persists.
//!
//! # Architecture
//!
//! ```text
//! BeatSource --> Ingestor --> SubjectTracker --> Escalation --> AlertDispatcher --> triage
//!                   |
//!                   +--> watch<MonitorSnapshot> --> reporting loop / console
//! ```
//!
//! The ingestion loop never waits on incident delivery. Dispatch runs on
//! detached tasks bounded by a semaphore.

pub mod console;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod service;
pub mod source;

pub use console::{ConsoleExit, MonitorConsole, Reply};
pub use dispatch::{AlertDispatcher, DispatchOutcome};
pub use error::MonitorError;
pub use ingest::Ingestor;
pub use service::{status_line, status_lines, MonitorService};
pub use source::{BatchSummary, BeatSource, BrokerSource, SyntheticSource};
