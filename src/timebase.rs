//! Tick-based time base shared by capture and decode
//!
//! Every sample log timestamp is an elapsed tick count since the start of its
//! stream. A tick is a fixed fraction of a second; the number of ticks between
//! two samples of a stream (the sample period) is derived once per session from
//! the stream's sample rate.
//!
//! The period is computed with integer division, so rates that do not divide
//! the tick resolution evenly (44.1 kHz, for instance) drift slightly over long
//! streams. That drift is accepted: logs are written with the truncated period
//! and readers use the same arithmetic.

use serde::{Deserialize, Serialize};

/// Ticks per second used when no other resolution is configured (100 ns ticks).
pub const DEFAULT_TICKS_PER_SECOND: u64 = 10_000_000;

/// Sample rate the microphone is always opened at.
pub const MICROPHONE_SAMPLE_RATE: u32 = 16_000;

/// Tick resolution of all sample logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBase {
    ticks_per_second: u64,
}

impl TimeBase {
    pub fn new(ticks_per_second: u64) -> Self {
        Self { ticks_per_second }
    }

    pub fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second
    }

    /// Number of ticks between two consecutive samples at `sample_rate_hz`.
    ///
    /// `sample_rate_hz` must be non-zero; callers pass rates taken from a
    /// validated format descriptor.
    pub fn sample_period(&self, sample_rate_hz: u32) -> u64 {
        self.ticks_per_second / u64::from(sample_rate_hz)
    }

    /// Sample period of the fixed-rate microphone stream.
    pub fn microphone_sample_period(&self) -> u64 {
        self.sample_period(MICROPHONE_SAMPLE_RATE)
    }

    /// Inverse of [`sample_period`](Self::sample_period), used to recover a
    /// stream's rate from the spacing of its records.
    pub fn sample_rate_for_period(&self, period_ticks: u64) -> Option<u32> {
        if period_ticks == 0 {
            return None;
        }
        u32::try_from(self.ticks_per_second / period_ticks).ok()
    }

    /// Converts a tick count to seconds, for display only.
    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        ticks as f64 / self.ticks_per_second as f64
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::new(DEFAULT_TICKS_PER_SECOND)
    }
}

/// Running timestamp of one stream
///
/// Owned by a single capture session or decode job and advanced by exactly
/// one sample period per sample (or per frame, for interleaved streams).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamClock {
    period: u64,
    elapsed: u64,
}

impl StreamClock {
    pub fn new(period: u64) -> Self {
        Self { period, elapsed: 0 }
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    /// Ticks elapsed so far.
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    /// Advance by one period and return the new position.
    pub fn advance(&mut self) -> u64 {
        self.elapsed += self.period;
        self.elapsed
    }

    /// Return the current position, then advance by one period.
    pub fn tick(&mut self) -> u64 {
        let now = self.elapsed;
        self.elapsed += self.period;
        now
    }
}
