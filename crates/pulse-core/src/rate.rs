//! Sliding-window rate estimation from beat timestamps.
//!
//! No rate is ever transmitted with a beat. [`RateEstimator`] keeps the
//! last `W` arrival timestamps and derives beats per minute from the
//! average spacing across the window. The window is the only memory; there
//! is no further smoothing.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::debug;

/// Milliseconds in one minute.
const MS_PER_MINUTE: f64 = 60_000.0;

/// Fixed-capacity FIFO of beat timestamps for one subject.
#[derive(Debug, Clone)]
pub struct RateEstimator {
    capacity: usize,
    window: VecDeque<DateTime<Utc>>,
}

impl RateEstimator {
    /// Create an estimator holding at most `capacity` timestamps.
    ///
    /// A capacity below 2 could never yield a rate, so it is raised to 2.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            capacity,
            window: VecDeque::with_capacity(capacity.saturating_add(1)),
        }
    }

    /// Append a beat, evicting the oldest timestamp once the window is full.
    ///
    /// Timestamps are kept in arrival order. A timestamp older than the
    /// newest one already held is accepted as-is and only logged.
    pub fn record_beat(&mut self, timestamp: DateTime<Utc>) {
        if let Some(newest) = self.window.back() {
            if timestamp < *newest {
                debug!(
                    %timestamp,
                    newest = %newest,
                    "beat timestamp is older than the newest in the window"
                );
            }
        }

        self.window.push_back(timestamp);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
    }

    /// Beats per minute across the window.
    ///
    /// `None` while fewer than two timestamps are held, or when the window
    /// spans no positive time (no finite rate exists).
    #[allow(clippy::cast_precision_loss)]
    pub fn current_rate(&self) -> Option<f64> {
        if self.window.len() < 2 {
            return None;
        }
        let oldest = self.window.front()?;
        let newest = self.window.back()?;

        let span_us = newest.signed_duration_since(*oldest).num_microseconds()?;
        if span_us <= 0 {
            return None;
        }

        let intervals = u32::try_from(self.window.len().saturating_sub(1)).ok()?;
        let average_ms = span_us as f64 / 1_000.0 / f64::from(intervals);
        Some(MS_PER_MINUTE / average_ms)
    }

    /// Number of timestamps currently held.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Whether no beat has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Maximum number of timestamps held.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
