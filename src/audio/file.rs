//! Audio file decoding and channel demultiplexing
//!
//! Files are decoded with symphonia into interleaved 16-bit PCM held in
//! memory, then split into one sample log per channel. A WAV copy of the
//! decoded stream can be written alongside the logs.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase as CodecTimeBase;

use super::demux::{demultiplex, ChannelLayout, ChannelSink};
use super::session::{CONTAINER_EXTENSION, LOG_EXTENSION};
use crate::delegate::PipelineDelegate;
use crate::error::PipelineError;
use crate::samples::SampleLogWriter;
use crate::timebase::{StreamClock, TimeBase};

/// Audio file metadata
#[derive(Debug, Clone)]
pub struct AudioFileInfo {
    pub path: PathBuf,
    pub filename: String,
    pub duration: Duration,
    pub sample_rate: u32,
    pub channels: usize,
    pub format: String,
    /// Ticks between two samples of this file.
    pub sample_period: u64,
}

impl AudioFileInfo {
    /// One-line description, e.g. `44100 Hz, 2 channel(s), PCM_S16LE, 00:03`.
    pub fn describe(&self) -> String {
        let secs = self.duration.as_secs();
        format!(
            "{} Hz, {} channel(s), {}, {:02}:{:02}",
            self.sample_rate,
            self.channels,
            self.format,
            secs / 60,
            secs % 60
        )
    }
}

/// Fully decoded source: interleaved little-endian 16-bit PCM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: usize,
    pub pcm: Vec<u8>,
}

impl DecodedAudio {
    /// Interleaved samples, for re-encoding.
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.pcm
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }
}

/// Shared flag asking a running decode to give up
///
/// Only honoured while the source is being decoded; once output files are
/// open the job runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

struct OpenTrack {
    format: Box<dyn FormatReader>,
    track_id: u32,
    codec_params: CodecParameters,
}

fn open_track(path: &Path) -> Result<OpenTrack, PipelineError> {
    let file = File::open(path)?;

    // Create media source stream
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create hint from file extension
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| PipelineError::Probe(e.to_string()))?;

    let format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(PipelineError::NoTracks)?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    Ok(OpenTrack {
        format,
        track_id,
        codec_params,
    })
}

/// Read an audio file's parameters without decoding it.
pub fn probe(path: impl AsRef<Path>, time_base: &TimeBase) -> Result<AudioFileInfo, PipelineError> {
    let path = path.as_ref();
    let OpenTrack { codec_params, .. } = open_track(path)?;

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| PipelineError::Probe("unknown sample rate".into()))?;
    let channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let duration = if let Some(n_frames) = codec_params.n_frames {
        let tb = codec_params
            .time_base
            .unwrap_or(CodecTimeBase::new(1, sample_rate));
        let time = tb.calc_time(n_frames);
        Duration::from_secs_f64(time.seconds as f64 + time.frac)
    } else {
        Duration::ZERO
    };

    // Get format name from codec
    let format = symphonia::default::get_codecs()
        .get_codec(codec_params.codec)
        .map(|d| d.short_name.to_uppercase())
        .unwrap_or_else(|| format!("{:?}", codec_params.codec));

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("Unknown")
        .to_string();

    let info = AudioFileInfo {
        path: path.to_path_buf(),
        filename,
        duration,
        sample_rate,
        channels,
        format,
        sample_period: time_base.sample_period(sample_rate),
    };
    log::info!("Probed {:?}: {}", path, info.describe());
    Ok(info)
}

/// Decode the whole file into memory.
///
/// Sources with more than two channels are rejected as soon as the track
/// header is known. Corrupt packets are skipped.
pub fn decode_to_pcm(path: &Path, cancel: &CancelToken) -> Result<DecodedAudio, PipelineError> {
    let OpenTrack {
        mut format,
        track_id,
        codec_params,
    } = open_track(path)?;

    if let Some(channels) = codec_params.channels.map(|c| c.count()) {
        ChannelLayout::from_count(channels)?;
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| PipelineError::Decoder(e.to_string()))?;

    let mut sample_rate = codec_params.sample_rate;
    let mut channels = codec_params.channels.map(|c| c.count());
    let mut pcm = Vec::new();

    loop {
        if cancel.is_cancelled() {
            log::info!("Decoding of {:?} cancelled", path);
            return Err(PipelineError::Cancelled);
        }

        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(PipelineError::Decoder(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => return Err(PipelineError::Decoder(e.to_string())),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count());

        let mut buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        pcm.extend(buf.samples().iter().flat_map(|s| s.to_le_bytes()));
    }

    let sample_rate = sample_rate
        .filter(|&rate| rate > 0)
        .ok_or_else(|| PipelineError::Decoder("unknown sample rate".into()))?;
    let channels = channels.ok_or_else(|| PipelineError::Decoder("unknown channel count".into()))?;

    log::info!(
        "Decoded {:?}: {} Hz, {} channel(s), {} bytes",
        path,
        sample_rate,
        channels,
        pcm.len()
    );

    Ok(DecodedAudio {
        sample_rate,
        channels,
        pcm,
    })
}

/// Output files of one decode job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodePaths {
    pub left: PathBuf,
    pub right: Option<PathBuf>,
    pub container: Option<PathBuf>,
}

impl DecodePaths {
    /// Names outputs after `output`'s stem, in `output`'s directory.
    ///
    /// The primary log is `<stem>.txt`, or `<stem>-left.txt` when a right
    /// log `<stem>-right.txt` is written too. The WAV copy `<stem>.wav` is
    /// skipped when `output` is itself a WAV path.
    pub fn derive(
        output: &Path,
        layout: ChannelLayout,
        write_second_channel: bool,
        write_container: bool,
    ) -> Self {
        let dir = output.parent().unwrap_or_else(|| Path::new(""));
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "samples".to_string());

        let split = layout == ChannelLayout::Stereo && write_second_channel;
        let log_name = |suffix: &str| dir.join(format!("{}{}.{}", stem, suffix, LOG_EXTENSION));

        let output_is_container = output
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(CONTAINER_EXTENSION));

        Self {
            left: log_name(if split { "-left" } else { "" }),
            right: split.then(|| log_name("-right")),
            container: (write_container && !output_is_container)
                .then(|| dir.join(format!("{}.{}", stem, CONTAINER_EXTENSION))),
        }
    }

    /// Produced logs, primary channel first.
    pub fn logs(&self) -> Vec<PathBuf> {
        std::iter::once(self.left.clone())
            .chain(self.right.clone())
            .collect()
    }
}

/// File-to-sample-log converter
///
/// Runs synchronously on the calling thread; one job at a time.
pub struct DecodeEngine {
    time_base: TimeBase,
    write_container: bool,
    delegate: Arc<dyn PipelineDelegate>,
    cancel: CancelToken,
}

impl DecodeEngine {
    pub fn new(
        time_base: TimeBase,
        write_container: bool,
        delegate: Arc<dyn PipelineDelegate>,
    ) -> Self {
        Self {
            time_base,
            write_container,
            delegate,
            cancel: CancelToken::default(),
        }
    }

    /// Token another thread can use to cancel the decoding phase.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Decode `input` and write its per-channel sample logs next to `output`.
    ///
    /// Returns the produced logs, primary channel first.
    pub fn process(
        &mut self,
        input: &Path,
        write_second_channel: bool,
        output: &Path,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        self.cancel.reset();
        self.delegate
            .on_status(&format!("Reading {}", input.display()));

        let result = decode_to_pcm(input, &self.cancel).and_then(|decoded| {
            self.write_outputs(&decoded, Some(input), write_second_channel, output)
        });

        match &result {
            Ok(paths) => {
                self.delegate.on_status(&format!(
                    "Converted {} into {} sample log(s)",
                    input.display(),
                    paths.len()
                ));
                self.delegate.on_file_ready(paths);
            }
            Err(e) => {
                log::error!("Failed to convert {}: {}", input.display(), e);
                self.delegate.on_error(e);
            }
        }
        result
    }

    /// Write the logs (and optional WAV copy) for an already decoded stream.
    ///
    /// The channel layout is validated before any file is created.
    pub fn write_outputs(
        &self,
        decoded: &DecodedAudio,
        input: Option<&Path>,
        write_second_channel: bool,
        output: &Path,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let layout = ChannelLayout::from_count(decoded.channels)?;
        if decoded.sample_rate == 0 {
            return Err(PipelineError::Decoder("unknown sample rate".into()));
        }
        let period = self.time_base.sample_period(decoded.sample_rate);
        if period == 0 {
            return Err(PipelineError::UnsupportedSampleRate {
                rate: decoded.sample_rate,
                ticks_per_second: self.time_base.ticks_per_second(),
            });
        }
        let mut clock = StreamClock::new(period);

        let mut paths = DecodePaths::derive(output, layout, write_second_channel, self.write_container);
        if let (Some(container), Some(input)) = (&paths.container, input) {
            if same_file(container, input) {
                log::warn!("Not overwriting source {} with its WAV copy", input.display());
                paths.container = None;
            }
        }

        if let Some(container) = &paths.container {
            write_container(container, decoded)?;
        }

        let mut left = SampleLogWriter::create(&paths.left)?;
        let mut right = paths
            .right
            .as_ref()
            .map(SampleLogWriter::create)
            .transpose()?;

        let stats = demultiplex(
            &decoded.pcm,
            layout,
            &mut clock,
            &mut left,
            right.as_mut().map(|w| w as &mut dyn ChannelSink),
        )?;

        if stats.skipped_samples > 0 {
            log::warn!(
                "Dropped {} sample(s) of a truncated trailing frame",
                stats.skipped_samples
            );
        }

        left.finish()?;
        if let Some(right) = right {
            right.finish()?;
        }

        log::info!(
            "Wrote {} frame(s) to {:?}",
            stats.frames,
            paths.logs()
        );
        Ok(paths.logs())
    }
}

/// Re-encode the decoded stream as 16-bit PCM WAV.
fn write_container(path: &Path, decoded: &DecodedAudio) -> Result<(), PipelineError> {
    let spec = WavSpec {
        channels: decoded.channels as u16,
        sample_rate: decoded.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for sample in decoded.samples() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    log::info!("Wrote WAV copy {}", path.display());
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
