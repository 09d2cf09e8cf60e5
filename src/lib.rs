//! audio-recorder - microphone capture and audio file demultiplexing
//!
//! Turns raw interleaved PCM into per-channel, time-stamped sample logs:
//!
//! - [`audio::CaptureEngine`] records the microphone at 16 kHz / 16 bit /
//!   mono into a WAV container and a sample log at the same time.
//! - [`audio::DecodeEngine`] decodes any file symphonia understands and
//!   writes one sample log per channel (mono or stereo).
//! - [`samples::reader`] loads a sample log back for display.
//!
//! A sample log holds one `<ticks>|<amplitude>` record per line, with ticks
//! measured in the [`timebase::TimeBase`] resolution.

pub mod audio;
pub mod delegate;
pub mod error;
pub mod samples;
pub mod settings;
pub mod timebase;

pub use delegate::{NullDelegate, PipelineDelegate};
pub use error::PipelineError;
pub use samples::{SampleRecord, SampleSeries};
pub use settings::Settings;
pub use timebase::{StreamClock, TimeBase};
