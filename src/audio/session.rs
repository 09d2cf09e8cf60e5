//! Per-recording capture state
//!
//! A `CaptureSession` owns everything one microphone recording writes to:
//! the WAV container, the sample log and the running timestamp. Buffers are
//! fed to it in arrival order by the capture worker; it never sees the device.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};

use super::buffer::LevelProducer;
use crate::error::PipelineError;
use crate::samples::{SampleLogWriter, SampleRecord};
use crate::timebase::{StreamClock, TimeBase, MICROPHONE_SAMPLE_RATE};

/// Extension of the lossless container.
pub const CONTAINER_EXTENSION: &str = "wav";

/// Extension of sample logs.
pub const LOG_EXTENSION: &str = "txt";

/// PCM format the microphone is opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self {
            sample_rate: MICROPHONE_SAMPLE_RATE,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

impl CaptureFormat {
    pub fn wav_spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: SampleFormat::Int,
        }
    }
}

/// Where a recording's two outputs land
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePaths {
    pub log: PathBuf,
    pub container: PathBuf,
}

impl CapturePaths {
    /// The log is written at `output`; the container next to it with a `.wav`
    /// extension. A `.wav` output moves the log to `.txt` instead.
    pub fn from_output(output: &Path) -> Self {
        let is_container = output
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(CONTAINER_EXTENSION));

        let log = if is_container {
            output.with_extension(LOG_EXTENSION)
        } else {
            output.to_path_buf()
        };

        Self {
            log,
            container: output.with_extension(CONTAINER_EXTENSION),
        }
    }
}

/// Outcome of one delivered buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStats {
    pub samples: usize,
    /// Largest absolute amplitude in the buffer.
    pub peak: i16,
}

/// What a finished recording produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub paths: CapturePaths,
    pub samples: u64,
    /// Timestamp of the last logged sample.
    pub duration_ticks: u64,
}

/// State of one open recording
pub struct CaptureSession {
    paths: CapturePaths,
    container: WavWriter<BufWriter<File>>,
    log: SampleLogWriter,
    clock: StreamClock,
}

impl CaptureSession {
    /// Creates both output files and resets the clock to zero.
    pub fn open(
        output: &Path,
        format: &CaptureFormat,
        time_base: &TimeBase,
    ) -> Result<Self, PipelineError> {
        Self::create(CapturePaths::from_output(output), format, time_base)
    }

    /// Like [`CaptureSession::open`] with both paths chosen by the caller.
    pub fn create(
        paths: CapturePaths,
        format: &CaptureFormat,
        time_base: &TimeBase,
    ) -> Result<Self, PipelineError> {
        let period = time_base.sample_period(format.sample_rate);
        if period == 0 {
            return Err(PipelineError::UnsupportedSampleRate {
                rate: format.sample_rate,
                ticks_per_second: time_base.ticks_per_second(),
            });
        }
        let container = WavWriter::create(&paths.container, format.wav_spec())?;
        let log = SampleLogWriter::create(&paths.log)?;

        log::info!(
            "Recording to {} and {}",
            paths.container.display(),
            paths.log.display()
        );

        Ok(Self {
            paths,
            container,
            log,
            clock: StreamClock::new(period),
        })
    }

    pub fn paths(&self) -> &CapturePaths {
        &self.paths
    }

    /// Ticks elapsed since the recording started.
    pub fn elapsed(&self) -> u64 {
        self.clock.elapsed()
    }

    /// Processes one buffer of little-endian 16-bit mono samples.
    ///
    /// Each sample advances the clock by one period, is appended to the log
    /// and to the container, and is offered to the live display. A trailing
    /// odd byte is ignored. On error the records already written for this
    /// buffer stay in place.
    pub fn on_buffer_available(
        &mut self,
        buffer: &[u8],
        mut display: Option<&mut LevelProducer>,
    ) -> Result<BufferStats, PipelineError> {
        let mut stats = BufferStats::default();

        for pair in buffer.chunks_exact(2) {
            let amplitude = i16::from_le_bytes([pair[0], pair[1]]);
            let record = SampleRecord::new(self.clock.advance(), amplitude);

            self.log.append(record)?;
            self.container.write_sample(amplitude)?;

            if let Some(display) = display.as_deref_mut() {
                display.push(record);
            }

            stats.samples += 1;
            stats.peak = stats.peak.max(amplitude.saturating_abs());
        }

        Ok(stats)
    }

    /// Finalizes the container and flushes the log.
    pub fn finish(self) -> Result<CaptureSummary, PipelineError> {
        let samples = self.log.records_written();
        let duration_ticks = self.clock.elapsed();

        self.container.finalize()?;
        self.log.finish()?;

        log::info!(
            "Recording finished: {} samples in {}",
            samples,
            self.paths.log.display()
        );

        Ok(CaptureSummary {
            paths: self.paths,
            samples,
            duration_ticks,
        })
    }

    /// Closes both files after a failure, ignoring further errors.
    pub fn abort(self) {
        if let Err(e) = self.container.finalize() {
            log::warn!("Failed to finalize {}: {}", self.paths.container.display(), e);
        }
        if let Err(e) = self.log.finish() {
            log::warn!("Failed to close {}: {}", self.paths.log.display(), e);
        }
    }
}
