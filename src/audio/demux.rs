//! Interleaved PCM demultiplexing
//!
//! Splits little-endian 16-bit PCM into per-channel sample streams. Mono
//! frames are 2 bytes; stereo frames are 4 bytes laid out as
//! `[left_lo, left_hi, right_lo, right_hi]`. Both channels of a frame share
//! one timestamp.
//!
//! A short frame at the end of the buffer is tolerated: whatever complete
//! samples it holds are kept, the rest is skipped and demultiplexing carries
//! on. Only write errors abort.

use crate::error::PipelineError;
use crate::samples::{SampleLogWriter, SampleRecord};
use crate::timebase::StreamClock;

/// Channel arrangement of a decoded source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    pub fn from_count(channels: usize) -> Result<Self, PipelineError> {
        match channels {
            1 => Ok(Self::Mono),
            2 => Ok(Self::Stereo),
            _ => Err(PipelineError::UnsupportedChannelLayout { channels }),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }

    /// Bytes per interleaved frame of 16-bit samples.
    pub fn frame_size(&self) -> usize {
        self.channels() * 2
    }
}

/// Destination for one channel's records
pub trait ChannelSink {
    fn append(&mut self, record: SampleRecord) -> std::io::Result<()>;
}

impl ChannelSink for SampleLogWriter {
    fn append(&mut self, record: SampleRecord) -> std::io::Result<()> {
        SampleLogWriter::append(self, record)
    }
}

impl ChannelSink for Vec<SampleRecord> {
    fn append(&mut self, record: SampleRecord) -> std::io::Result<()> {
        self.push(record);
        Ok(())
    }
}

/// Counts from one demultiplexing pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DemuxStats {
    pub frames: usize,
    pub left_samples: u64,
    pub right_samples: u64,
    /// Samples dropped from a truncated trailing frame.
    pub skipped_samples: usize,
}

/// Demultiplex `bytes` into `left` and, for stereo sources, `right`.
///
/// Each frame is stamped with the clock's current position, then the clock
/// advances by one period. `right` is ignored for mono sources.
pub fn demultiplex(
    bytes: &[u8],
    layout: ChannelLayout,
    clock: &mut StreamClock,
    left: &mut dyn ChannelSink,
    mut right: Option<&mut dyn ChannelSink>,
) -> std::io::Result<DemuxStats> {
    let mut stats = DemuxStats::default();

    for frame in bytes.chunks(layout.frame_size()) {
        let timestamp = clock.tick();
        stats.frames += 1;

        let Some(left_sample) = sample_at(frame, 0) else {
            stats.skipped_samples += layout.channels();
            log::debug!("Skipping truncated frame at {} ({} bytes)", timestamp, frame.len());
            continue;
        };
        left.append(SampleRecord::new(timestamp, left_sample))?;
        stats.left_samples += 1;

        if layout == ChannelLayout::Stereo {
            match (right.as_deref_mut(), sample_at(frame, 2)) {
                (Some(sink), Some(right_sample)) => {
                    sink.append(SampleRecord::new(timestamp, right_sample))?;
                    stats.right_samples += 1;
                }
                (Some(_), None) => {
                    stats.skipped_samples += 1;
                    log::debug!("Skipping truncated right sample at {}", timestamp);
                }
                (None, _) => {}
            }
        }
    }

    Ok(stats)
}

/// Little-endian sample starting at `offset`, if both bytes are present.
#[inline]
fn sample_at(frame: &[u8], offset: usize) -> Option<i16> {
    let lo = *frame.get(offset)?;
    let hi = *frame.get(offset + 1)?;
    Some(i16::from_le_bytes([lo, hi]))
}
