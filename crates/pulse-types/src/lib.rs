//! Shared type definitions for the Pulse Watch heartbeat monitor.
//!
//! This crate is the single source of truth for the values that cross
//! crate boundaries: the beat payload on the wire, the rhythm bands, the
//! escalation episode and the read-only snapshot handed to the reporting
//! loop.
//!
//! # Modules
//!
//! - [`enums`] -- Rhythm bands and escalation phases
//! - [`structs`] -- Beat payload, escalation event, snapshots

pub mod enums;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{EpisodePhase, RhythmState};
pub use structs::{BeatEvent, Escalation, EscalationEpisode, MonitorSnapshot, SubjectSnapshot};
