//! Audio module - microphone capture and file conversion
//!
//! This module provides:
//! - Input device enumeration
//! - Microphone capture into a WAV container and a sample log
//! - Lock-free ring buffer feeding the live display
//! - Audio file decoding and per-channel demultiplexing

mod buffer;
pub mod demux;
mod device;
pub mod file;
mod input;
mod session;

pub use buffer::{LevelBuffer, LevelMonitor, LevelProducer};
pub use demux::{ChannelLayout, DemuxStats};
pub use device::{list_input_devices, AudioDeviceDescriptor, DEFAULT_DEVICE_ID};
pub use file::{probe, AudioFileInfo, CancelToken, DecodeEngine, DecodePaths, DecodedAudio};
pub use input::{CaptureEngine, CaptureEvent, CaptureState, CaptureWorker, DeviceRelease};
pub use session::{
    BufferStats, CaptureFormat, CapturePaths, CaptureSession, CaptureSummary, CONTAINER_EXTENSION,
    LOG_EXTENSION,
};
