//! Triage intake for Pulse Watch incident reports.
//!
//! The monitor posts a plain-text incident report here when an abnormal
//! rhythm persists. The intake stores it in a capped in-memory log and
//! answers `202 Accepted` with an incident id. What happens to a report
//! afterwards is up to whoever reads the log.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use error::TriageError;
pub use router::build_router;
pub use server::{start_server, ServerConfig, ServerError};
pub use state::{ReceivedIncident, TriageState, MAX_INCIDENTS};
