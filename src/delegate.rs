//! Notifications sent from the pipeline to the hosting shell
//!
//! Capture notifications are delivered from the capture worker thread, not
//! from the thread that called `start`/`stop`. Implementations must return
//! quickly and marshal to their own thread if they need to.

use std::path::PathBuf;

use crate::error::PipelineError;

/// Status text shown while the microphone is idle.
pub const CAPTURE_IDLE_STATUS: &str = "Waiting to start. Sample rate: 16 kHz, 16 bit, mono";

/// Status text shown while no audio file has been chosen.
pub const AWAITING_AUDIO_FILE_STATUS: &str = "Open an audio file (wav, mp3, ...)";

/// Status text shown while no sample log has been chosen.
pub const AWAITING_SAMPLE_LOG_STATUS: &str = "Open a sample log (.txt)";

/// Event sink for capture and decode progress
pub trait PipelineDelegate: Send + Sync {
    /// Free-form progress or error text.
    fn on_status(&self, text: &str);

    /// Peak absolute amplitude of the most recently captured buffer.
    fn on_signal_level(&self, amplitude: i16);

    /// Called when capture enters or leaves the recording state.
    fn on_recording_state_changed(&self, recording: bool);

    /// Called with the produced sample logs, primary channel first.
    fn on_file_ready(&self, paths: &[PathBuf]);

    /// Called when a session ends because of an error.
    fn on_error(&self, error: &PipelineError) {
        self.on_status(&format!("Error: {}", error));
    }
}

/// Delegate that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDelegate;

impl PipelineDelegate for NullDelegate {
    fn on_status(&self, _text: &str) {}
    fn on_signal_level(&self, _amplitude: i16) {}
    fn on_recording_state_changed(&self, _recording: bool) {}
    fn on_file_ready(&self, _paths: &[PathBuf]) {}
}
