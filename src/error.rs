//! Pipeline error type

use thiserror::Error;

use crate::samples::MalformedRecord;

/// Errors surfaced by the capture engine, the decode engine and the log reader
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Malformed sample record on line {line}: {source}")]
    MalformedRecord {
        line: usize,
        #[source]
        source: MalformedRecord,
    },

    #[error("Unsupported channel layout: {channels} channels (at most 2 are supported)")]
    UnsupportedChannelLayout { channels: usize },

    #[error("Sample rate {rate} Hz is finer than the time base ({ticks_per_second} ticks per second)")]
    UnsupportedSampleRate { rate: u32, ticks_per_second: u64 },

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Container write failed: {0}")]
    Container(#[from] hound::Error),

    #[error("Failed to probe audio format: {0}")]
    Probe(String),

    #[error("No audio tracks found")]
    NoTracks,

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl PipelineError {
    /// True for write/flush failures on a log or container.
    pub fn is_io_failure(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Container(_))
    }
}
