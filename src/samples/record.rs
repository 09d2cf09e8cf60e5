//! Sample record and its on-disk line format
//!
//! A sample log stores one record per line as `<ticks>|<amplitude>`, where
//! `ticks` is the elapsed tick count since the start of the stream and
//! `amplitude` is a signed 16-bit PCM value. Older logs stored fractional
//! milliseconds in the first field; those are rejected as malformed rather
//! than guessed at.

use std::fmt;

use thiserror::Error;

/// Field separator of a sample log line.
pub const SEPARATOR: char = '|';

/// One time-stamped amplitude of a single channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleRecord {
    pub timestamp: u64,
    pub amplitude: i16,
}

impl SampleRecord {
    pub fn new(timestamp: u64, amplitude: i16) -> Self {
        Self {
            timestamp,
            amplitude,
        }
    }
}

impl fmt::Display for SampleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.timestamp, SEPARATOR, self.amplitude)
    }
}

/// Reasons a line is not a valid sample record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("missing '|' separator in {0:?}")]
    MissingSeparator(String),

    #[error("invalid timestamp {0:?}")]
    BadTimestamp(String),

    #[error("invalid amplitude {0:?}")]
    BadAmplitude(String),

    #[error("amplitude {0} is outside the 16-bit range")]
    AmplitudeOutOfRange(i64),

    /// The line's bytes, decoded lossily.
    #[error("line is not valid UTF-8: {0:?}")]
    InvalidUtf8(String),
}

/// Formats a record as a log line (without the line terminator).
pub fn encode(timestamp: u64, amplitude: i16) -> String {
    SampleRecord::new(timestamp, amplitude).to_string()
}

/// Parses a single log line.
pub fn decode(line: &str) -> Result<SampleRecord, MalformedRecord> {
    let (ticks, amplitude) = line
        .split_once(SEPARATOR)
        .ok_or_else(|| MalformedRecord::MissingSeparator(line.to_string()))?;

    let timestamp = ticks
        .parse::<u64>()
        .map_err(|_| MalformedRecord::BadTimestamp(ticks.to_string()))?;

    let amplitude = match amplitude.parse::<i16>() {
        Ok(a) => a,
        Err(_) => {
            return Err(match amplitude.parse::<i64>() {
                Ok(wide) => MalformedRecord::AmplitudeOutOfRange(wide),
                Err(_) => MalformedRecord::BadAmplitude(amplitude.to_string()),
            })
        }
    };

    Ok(SampleRecord::new(timestamp, amplitude))
}
