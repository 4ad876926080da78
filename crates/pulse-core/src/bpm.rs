//! Live-adjustable beat rate shared between the command boundary and the
//! synthetic loops.
//!
//! The value is an [`AtomicU32`] so the loop reading it once per beat
//! never contends with the stdin reader writing it, and no lock is held
//! across a sleep.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::error::CoreError;

/// Lowest accepted rate, inclusive.
pub const MIN_BPM: u32 = 1;

/// Highest accepted rate, inclusive.
pub const MAX_BPM: u32 = 300;

/// Shared beat rate setting.
#[derive(Debug)]
pub struct BpmSetting {
    bpm: AtomicU32,
}

impl BpmSetting {
    /// Create a setting starting at `initial`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidBpm`] if `initial` is outside
    /// [`MIN_BPM`]..=[`MAX_BPM`].
    pub fn new(initial: u32) -> Result<Self, CoreError> {
        validate(i64::from(initial))?;
        Ok(Self {
            bpm: AtomicU32::new(initial),
        })
    }

    /// Current rate.
    pub fn get(&self) -> u32 {
        self.bpm.load(Ordering::Acquire)
    }

    /// Replace the rate.
    ///
    /// Takes a signed value so that input such as `-5` or `0` from the
    /// command boundary is rejected here rather than wrapped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidBpm`] and leaves the current rate
    /// untouched if `requested` is out of range.
    pub fn set(&self, requested: i64) -> Result<u32, CoreError> {
        let bpm = validate(requested)?;
        self.bpm.store(bpm, Ordering::Release);
        Ok(bpm)
    }

    /// Time between beats at the current rate.
    pub fn interval(&self) -> Duration {
        interval_for(self.get())
    }
}

/// Time between beats at `bpm` beats per minute.
pub fn interval_for(bpm: u32) -> Duration {
    Duration::from_secs_f64(60.0 / f64::from(bpm.max(MIN_BPM)))
}

fn validate(requested: i64) -> Result<u32, CoreError> {
    u32::try_from(requested)
        .ok()
        .filter(|bpm| (MIN_BPM..=MAX_BPM).contains(bpm))
        .ok_or(CoreError::InvalidBpm { requested })
}
