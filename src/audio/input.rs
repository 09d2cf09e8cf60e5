//! Microphone capture engine
//!
//! The cpal input callback only converts each device buffer to little-endian
//! 16-bit bytes and sends it down an unbounded channel. A dedicated worker
//! thread owns the `CaptureSession` and handles the buffers one at a time in
//! arrival order, so writes never overlap.
//!
//! The cpal stream lives on its own device thread, which builds it, plays it
//! and drops it when asked through a `DeviceRelease`. The engine asks on
//! `stop`; the worker asks as soon as a write failure or device error ends the
//! session, so the device is never held by a session that is already idle.
//!
//! Stopping releases the device first. Once the stream is gone no callback
//! can run, and only then is `CaptureEvent::Stopped` queued behind the last
//! buffer. The worker closes the files when it reaches that event.

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use super::buffer::{LevelBuffer, LevelMonitor};
use super::device::find_input_device;
use super::session::{CaptureFormat, CaptureSession, CaptureSummary};
use crate::delegate::PipelineDelegate;
use crate::error::PipelineError;
use crate::samples::reader;
use crate::timebase::TimeBase;

/// Messages from the audio callback to the capture worker
#[derive(Debug)]
pub enum CaptureEvent {
    /// Little-endian 16-bit mono PCM as delivered by the device.
    Buffer(Vec<u8>),
    /// The backend reported a stream error.
    DeviceError(String),
    /// No more buffers will arrive.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Recording,
}

/// Request handle for dropping the stream held by a device thread
///
/// Cloneable. The first request wins; later ones are ignored.
#[derive(Debug, Clone)]
pub struct DeviceRelease(Sender<()>);

impl DeviceRelease {
    /// A release handle and the receiver the device thread waits on.
    pub fn channel() -> (Self, Receiver<()>) {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        (Self(sender), receiver)
    }

    pub fn request(&self) {
        let _ = self.0.try_send(());
    }
}

/// Thread that owns an open input stream until it is released
struct DeviceHandle {
    release: DeviceRelease,
    thread: thread::JoinHandle<()>,
}

impl DeviceHandle {
    /// Runs `open` on a new thread and keeps what it returns alive there.
    ///
    /// The stream never leaves that thread: cpal streams are not `Send` on
    /// every backend. Returns once `open` has finished, with the device name.
    fn spawn<S, F>(open: F) -> Result<(Self, String), PipelineError>
    where
        S: 'static,
        F: FnOnce() -> Result<(S, String), PipelineError> + Send + 'static,
    {
        let (release, released) = DeviceRelease::channel();
        let (ready, opened) = crossbeam_channel::bounded(1);

        let thread = thread::spawn(move || {
            let stream = match open() {
                Ok((stream, name)) => {
                    let _ = ready.send(Ok(name));
                    stream
                }
                Err(e) => {
                    let _ = ready.send(Err(e));
                    return;
                }
            };
            // Also returns once every release handle is gone.
            let _ = released.recv();
            drop(stream);
            log::info!("Capture device released");
        });

        match opened.recv() {
            Ok(Ok(name)) => Ok((Self { release, thread }, name)),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(PipelineError::DeviceUnavailable(
                    "capture device thread exited".to_string(),
                ))
            }
        }
    }

    /// Drop the stream and wait until it is gone.
    fn close(self) {
        self.release.request();
        if self.thread.join().is_err() {
            log::error!("Capture device thread panicked");
        }
    }
}

/// Handle to a running capture worker thread
pub struct CaptureWorker {
    events: Sender<CaptureEvent>,
    handle: thread::JoinHandle<Result<CaptureSummary, PipelineError>>,
}

impl CaptureWorker {
    /// Start a worker that writes `session` until it receives `Stopped`.
    ///
    /// `device` is released as soon as the session fails.
    pub fn spawn(
        session: CaptureSession,
        delegate: Arc<dyn PipelineDelegate>,
        display: LevelBuffer,
        is_recording: Arc<AtomicBool>,
        device: DeviceRelease,
    ) -> Self {
        let (events, receiver) = crossbeam_channel::unbounded();
        Self::spawn_with_channel(
            session,
            events,
            receiver,
            delegate,
            display,
            is_recording,
            device,
        )
    }

    fn spawn_with_channel(
        session: CaptureSession,
        events: Sender<CaptureEvent>,
        receiver: Receiver<CaptureEvent>,
        delegate: Arc<dyn PipelineDelegate>,
        display: LevelBuffer,
        is_recording: Arc<AtomicBool>,
        device: DeviceRelease,
    ) -> Self {
        let handle = thread::spawn(move || {
            run_worker(
                session,
                receiver,
                delegate.as_ref(),
                &display,
                &is_recording,
                &device,
            )
        });
        Self { events, handle }
    }

    /// Sender the audio callback uses to deliver buffers.
    pub fn sender(&self) -> Sender<CaptureEvent> {
        self.events.clone()
    }

    /// Queue `Stopped` and wait for the worker to close the session.
    pub fn finish(self) -> Result<CaptureSummary, PipelineError> {
        // The worker may already be gone after a write failure.
        let _ = self.events.send(CaptureEvent::Stopped);
        self.handle
            .join()
            .map_err(|_| PipelineError::Io(std::io::Error::other("capture worker panicked")))?
    }
}

/// Worker body: consume events until stopped, then close and reload the log.
fn run_worker(
    mut session: CaptureSession,
    events: Receiver<CaptureEvent>,
    delegate: &dyn PipelineDelegate,
    display: &LevelBuffer,
    is_recording: &AtomicBool,
    device: &DeviceRelease,
) -> Result<CaptureSummary, PipelineError> {
    let mut producer = display.take_producer();

    for event in events.iter() {
        let failure = match event {
            CaptureEvent::Buffer(bytes) => {
                match session.on_buffer_available(&bytes, producer.as_mut()) {
                    Ok(stats) => {
                        if stats.samples > 0 {
                            delegate.on_signal_level(stats.peak);
                        }
                        None
                    }
                    Err(e) => Some(e),
                }
            }
            CaptureEvent::DeviceError(reason) => Some(PipelineError::DeviceUnavailable(reason)),
            CaptureEvent::Stopped => break,
        };

        if let Some(error) = failure {
            log::error!("Recording aborted: {}", error);
            is_recording.store(false, Ordering::Relaxed);
            device.request();
            session.abort();
            if let Some(producer) = producer {
                display.return_producer(producer);
            }
            delegate.on_recording_state_changed(false);
            delegate.on_error(&error);
            return Err(error);
        }
    }

    is_recording.store(false, Ordering::Relaxed);
    if let Some(producer) = producer {
        display.return_producer(producer);
    }

    let summary = session.finish();
    delegate.on_recording_state_changed(false);
    let summary = match summary {
        Ok(summary) => summary,
        Err(e) => {
            log::error!("Failed to close recording: {}", e);
            delegate.on_error(&e);
            return Err(e);
        }
    };

    match reader::read(&summary.paths.log) {
        Ok(series) => {
            delegate.on_status(&format!(
                "Recorded {} samples to {}",
                series.len(),
                summary.paths.log.display()
            ));
            delegate.on_file_ready(std::slice::from_ref(&summary.paths.log));
        }
        Err(e) => {
            log::error!("Failed to reload {}: {}", summary.paths.log.display(), e);
            delegate.on_error(&e);
        }
    }

    Ok(summary)
}

/// Microphone recorder
///
/// `Idle -> Recording -> Idle`. Only one recording runs per engine; the
/// engine releases the device and closes both files when it is stopped or
/// dropped, or when the session fails on its own.
pub struct CaptureEngine {
    time_base: TimeBase,
    format: CaptureFormat,
    delegate: Arc<dyn PipelineDelegate>,
    display: LevelBuffer,

    /// Cleared by the worker when the session ends on its own
    is_recording: Arc<AtomicBool>,

    /// Thread holding the audio input stream
    device: Option<DeviceHandle>,

    worker: Option<CaptureWorker>,
}

impl CaptureEngine {
    pub fn new(
        time_base: TimeBase,
        format: CaptureFormat,
        display_capacity: usize,
        delegate: Arc<dyn PipelineDelegate>,
    ) -> Self {
        Self {
            time_base,
            format,
            delegate,
            display: LevelBuffer::new(display_capacity),
            is_recording: Arc::new(AtomicBool::new(false)),
            device: None,
            worker: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        if self.is_recording.load(Ordering::Relaxed) {
            CaptureState::Recording
        } else {
            CaptureState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state() == CaptureState::Recording
    }

    /// Consumer side of the live display ring. Can be taken once.
    pub fn take_monitor(&mut self) -> Option<LevelMonitor> {
        self.display.take_monitor()
    }

    /// Open `device_id` and start recording to `output`.
    ///
    /// On failure nothing is left running and the engine stays idle.
    pub fn start(&mut self, output: &Path, device_id: i32) -> Result<(), PipelineError> {
        if self.is_recording() {
            log::warn!("Capture already running, ignoring start");
            return Ok(());
        }
        // Join whatever a failed session left behind.
        self.release();

        log::info!("Starting audio capture...");

        let result = self.open(output, device_id);
        if let Err(e) = &result {
            log::error!("Failed to start capture: {}", e);
            self.delegate.on_error(e);
        }
        result
    }

    fn open(&mut self, output: &Path, device_id: i32) -> Result<(), PipelineError> {
        let (events, receiver) = crossbeam_channel::unbounded();

        // The callback discards buffers until the session below is open.
        let format = self.format;
        let callback_events = events.clone();
        let gate = Arc::clone(&self.is_recording);
        let (device, device_name) = DeviceHandle::spawn(move || {
            open_input_stream(device_id, &format, callback_events, gate)
        })?;

        let session = match CaptureSession::open(output, &self.format, &self.time_base) {
            Ok(session) => session,
            Err(e) => {
                device.close();
                return Err(e);
            }
        };

        self.is_recording.store(true, Ordering::Relaxed);
        self.worker = Some(CaptureWorker::spawn_with_channel(
            session,
            events,
            receiver,
            Arc::clone(&self.delegate),
            self.display.clone(),
            Arc::clone(&self.is_recording),
            device.release.clone(),
        ));
        self.device = Some(device);

        self.delegate.on_recording_state_changed(true);
        self.delegate
            .on_status(&format!("Recording from {}", device_name));
        log::info!("Capture started");
        Ok(())
    }

    /// Stop recording. Returns the finished recording, or `None` when the
    /// engine was already idle.
    ///
    /// A session that already failed was reported through `on_error` when it
    /// failed; stopping it only joins its threads and returns `None`.
    pub fn stop(&mut self) -> Result<Option<CaptureSummary>, PipelineError> {
        let ended_on_its_own = !self.is_recording();

        // Releasing the device halts the stream; no callback runs after this.
        if let Some(device) = self.device.take() {
            device.close();
        }
        self.is_recording.store(false, Ordering::Relaxed);

        let Some(worker) = self.worker.take() else {
            return Ok(None);
        };

        match worker.finish() {
            Ok(summary) => {
                log::info!("Capture stopped");
                Ok(Some(summary))
            }
            Err(e) if ended_on_its_own => {
                log::debug!("Capture had already ended: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Tear down whatever a previous session left behind.
    fn release(&mut self) {
        if let Err(e) = self.stop() {
            log::debug!("Previous session ended with: {}", e);
        }
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        self.release();
    }
}

/// Resolve, configure and start the input stream. Runs on the device thread.
fn open_input_stream(
    device_id: i32,
    format: &CaptureFormat,
    events: Sender<CaptureEvent>,
    is_recording: Arc<AtomicBool>,
) -> Result<(cpal::Stream, String), PipelineError> {
    let device = find_input_device(device_id)?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using input device: {}", device_name);

    let sample_format = negotiate_sample_format(&device, format)?;
    let config = cpal::StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    log::info!("Audio config: {:?} ({:?})", config, sample_format);

    let stream = build_capture_stream(&device, &config, sample_format, events, is_recording)?;
    stream
        .play()
        .map_err(|e| PipelineError::DeviceUnavailable(e.to_string()))?;

    Ok((stream, device_name))
}

/// Pick a sample format the device supports at the capture rate and channel
/// count. Native 16-bit is preferred; float input is converted.
fn negotiate_sample_format(
    device: &cpal::Device,
    format: &CaptureFormat,
) -> Result<cpal::SampleFormat, PipelineError> {
    let rate = cpal::SampleRate(format.sample_rate);
    let supported: Vec<cpal::SampleFormat> = device
        .supported_input_configs()
        .map_err(|e| PipelineError::DeviceUnavailable(e.to_string()))?
        .filter(|c| {
            c.channels() == format.channels
                && c.min_sample_rate() <= rate
                && rate <= c.max_sample_rate()
        })
        .map(|c| c.sample_format())
        .collect();

    [cpal::SampleFormat::I16, cpal::SampleFormat::F32]
        .into_iter()
        .find(|f| supported.contains(f))
        .ok_or_else(|| {
            PipelineError::DeviceUnavailable(format!(
                "device does not support {} Hz with {} channel(s)",
                format.sample_rate, format.channels
            ))
        })
}

fn build_capture_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    events: Sender<CaptureEvent>,
    is_recording: Arc<AtomicBool>,
) -> Result<cpal::Stream, PipelineError> {
    let error_events = events.clone();
    let on_error = move |err: cpal::StreamError| forward_stream_error(&error_events, err);

    let stream = match sample_format {
        cpal::SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                if !is_recording.load(Ordering::Relaxed) {
                    return;
                }
                let bytes = data.iter().flat_map(|s| s.to_le_bytes()).collect();
                let _ = events.send(CaptureEvent::Buffer(bytes));
            },
            on_error,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if !is_recording.load(Ordering::Relaxed) {
                    return;
                }
                let bytes = data
                    .iter()
                    .flat_map(|&s| f32_to_i16(s).to_le_bytes())
                    .collect();
                let _ = events.send(CaptureEvent::Buffer(bytes));
            },
            on_error,
            None,
        ),
        format => {
            return Err(PipelineError::DeviceUnavailable(format!(
                "unsupported sample format: {:?}",
                format
            )))
        }
    };

    stream.map_err(|e| PipelineError::DeviceUnavailable(e.to_string()))
}

/// Every backend stream error ends the session.
fn forward_stream_error(events: &Sender<CaptureEvent>, err: cpal::StreamError) {
    log::error!("Audio error: {}", err);
    let _ = events.send(CaptureEvent::DeviceError(err.to_string()));
}

#[inline]
fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::session::CapturePaths;
    use crate::delegate::testing::{Event, RecordingDelegate};
    use std::path::PathBuf;
    use std::time::Duration;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    struct Harness {
        worker: CaptureWorker,
        delegate: Arc<RecordingDelegate>,
        display: LevelBuffer,
        is_recording: Arc<AtomicBool>,
        released: Receiver<()>,
    }

    fn start_worker(output: &Path) -> Harness {
        let session =
            CaptureSession::open(output, &CaptureFormat::default(), &TimeBase::default()).unwrap();
        start_session(session)
    }

    fn start_session(session: CaptureSession) -> Harness {
        let delegate = Arc::new(RecordingDelegate::default());
        let display = LevelBuffer::new(64);
        let is_recording = Arc::new(AtomicBool::new(true));
        let (release, released) = DeviceRelease::channel();
        let worker = CaptureWorker::spawn(
            session,
            delegate.clone(),
            display.clone(),
            Arc::clone(&is_recording),
            release,
        );
        Harness {
            worker,
            delegate,
            display,
            is_recording,
            released,
        }
    }

    /// Stands in for a cpal stream; reports when it is dropped.
    struct FakeStream(Sender<()>);

    impl Drop for FakeStream {
        fn drop(&mut self) {
            let _ = self.0.send(());
        }
    }

    /// An engine recording to `output` from a fake device.
    fn recording_engine(
        output: &Path,
    ) -> (CaptureEngine, Arc<RecordingDelegate>, Sender<CaptureEvent>, Receiver<()>) {
        let delegate = Arc::new(RecordingDelegate::default());
        let mut engine = CaptureEngine::new(
            TimeBase::default(),
            CaptureFormat::default(),
            16,
            delegate.clone(),
        );

        let (dropped_tx, dropped) = crossbeam_channel::unbounded();
        let (device, name) =
            DeviceHandle::spawn(move || Ok((FakeStream(dropped_tx), "fake mic".to_string())))
                .unwrap();
        assert_eq!(name, "fake mic");

        let session =
            CaptureSession::open(output, &CaptureFormat::default(), &TimeBase::default()).unwrap();
        engine.is_recording.store(true, Ordering::Relaxed);
        let worker = CaptureWorker::spawn(
            session,
            delegate.clone(),
            engine.display.clone(),
            Arc::clone(&engine.is_recording),
            device.release.clone(),
        );
        let sender = worker.sender();
        engine.device = Some(device);
        engine.worker = Some(worker);

        (engine, delegate, sender, dropped)
    }

    #[test]
    fn buffers_are_logged_in_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("mic.txt");
        let h = start_worker(&output);

        let sender = h.worker.sender();
        sender.send(CaptureEvent::Buffer(pcm(&[1, 2]))).unwrap();
        sender.send(CaptureEvent::Buffer(pcm(&[-300, 4]))).unwrap();
        let summary = h.worker.finish().unwrap();

        assert_eq!(summary.samples, 4);
        assert!(!h.is_recording.load(Ordering::Relaxed));
        assert!(h.released.try_recv().is_err());

        let series = reader::read(&output).unwrap();
        let records: Vec<(u64, i16)> = series
            .records
            .iter()
            .map(|r| (r.timestamp, r.amplitude))
            .collect();
        assert_eq!(records, vec![(625, 1), (1250, 2), (1875, -300), (2500, 4)]);

        let events = h.delegate.events();
        assert_eq!(&events[..2], &[Event::Level(2), Event::Level(300)]);
        assert_eq!(events[2], Event::Recording(false));
        assert_eq!(events.last(), Some(&Event::FileReady(vec![output.clone()])));

        let mut monitor = h.display.take_monitor().unwrap();
        monitor.update();
        assert_eq!(monitor.samples().len(), 4);
        assert!(h.display.take_producer().is_some());
    }

    #[test]
    fn device_error_ends_session() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("mic.txt");
        let h = start_worker(&output);

        let sender = h.worker.sender();
        sender.send(CaptureEvent::Buffer(pcm(&[7]))).unwrap();
        sender
            .send(CaptureEvent::DeviceError("unplugged".into()))
            .unwrap();
        // May be refused once the worker has already exited.
        let _ = sender.send(CaptureEvent::Buffer(pcm(&[8])));

        let err = h.worker.finish().unwrap_err();
        assert!(matches!(err, PipelineError::DeviceUnavailable(_)));
        assert!(!h.is_recording.load(Ordering::Relaxed));
        assert!(h.released.try_recv().is_ok());

        // Files are closed and keep what was written before the failure.
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "625|7\n");
        let wav = hound::WavReader::open(output.with_extension("wav")).unwrap();
        assert_eq!(wav.len(), 1);

        let events = h.delegate.events();
        assert!(events.contains(&Event::Recording(false)));
        assert!(events.iter().any(|e| matches!(e, Event::Error(_))));
        assert!(!events.iter().any(|e| matches!(e, Event::FileReady(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn write_failure_closes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = CapturePaths {
            log: PathBuf::from("/dev/full"),
            container: dir.path().join("mic.wav"),
        };
        let session =
            CaptureSession::create(paths.clone(), &CaptureFormat::default(), &TimeBase::default())
                .unwrap();
        let h = start_session(session);

        // More log text than the writer buffers, so a flush hits the device.
        let samples: Vec<i16> = (0..4000).map(|i| (i % 100) as i16).collect();
        h.worker.sender().send(CaptureEvent::Buffer(pcm(&samples))).unwrap();

        let err = h.worker.finish().unwrap_err();
        assert!(err.is_io_failure());
        assert!(!h.is_recording.load(Ordering::Relaxed));
        assert!(h.released.try_recv().is_ok());

        // The container was finalized with the samples written before the failure.
        let wav = hound::WavReader::open(&paths.container).unwrap();
        assert!(wav.len() > 0);
        assert!(wav.len() < 4000);

        let events = h.delegate.events();
        assert!(events.contains(&Event::Recording(false)));
        assert!(events.iter().any(|e| matches!(e, Event::Error(_))));
        assert!(!events.iter().any(|e| matches!(e, Event::FileReady(_))));
    }

    #[test]
    fn failed_session_releases_device_without_stop() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("mic.txt");
        let (mut engine, delegate, sender, dropped) = recording_engine(&output);
        assert_eq!(engine.state(), CaptureState::Recording);

        sender
            .send(CaptureEvent::DeviceError("stream broke".into()))
            .unwrap();

        // The stream goes away before anyone calls stop.
        dropped.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(engine.state(), CaptureState::Idle);

        assert!(engine.stop().unwrap().is_none());
        assert!(engine.stop().unwrap().is_none());

        let errors = delegate
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Error(_)))
            .count();
        assert_eq!(errors, 1);
    }

    #[test]
    fn stop_releases_device_then_closes_files() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("mic.txt");
        let (mut engine, delegate, sender, dropped) = recording_engine(&output);

        sender.send(CaptureEvent::Buffer(pcm(&[5, -5]))).unwrap();
        let summary = engine.stop().unwrap().unwrap();

        assert!(dropped.try_recv().is_ok());
        assert_eq!(summary.samples, 2);
        assert_eq!(engine.state(), CaptureState::Idle);
        assert!(engine.stop().unwrap().is_none());
        assert_eq!(
            delegate.events().last(),
            Some(&Event::FileReady(vec![output.clone()]))
        );
    }

    #[test]
    fn failed_device_open_leaves_no_thread_behind() {
        let result = DeviceHandle::spawn(|| -> Result<((), String), PipelineError> {
            Err(PipelineError::DeviceUnavailable("no such device".into()))
        });
        assert!(matches!(result, Err(PipelineError::DeviceUnavailable(_))));
    }

    #[test]
    fn empty_recording_still_produces_files() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("silence.txt");
        let h = start_worker(&output);

        let summary = h.worker.finish().unwrap();
        assert_eq!(summary.samples, 0);
        assert!(output.exists());
        assert!(output.with_extension("wav").exists());
        assert_eq!(
            h.delegate.events().last(),
            Some(&Event::FileReady(vec![PathBuf::from(&output)]))
        );
    }

    #[test]
    fn every_stream_error_is_forwarded() {
        let (events, received) = crossbeam_channel::unbounded();
        forward_stream_error(&events, cpal::StreamError::DeviceNotAvailable);
        forward_stream_error(
            &events,
            cpal::StreamError::BackendSpecific {
                err: cpal::BackendSpecificError {
                    description: "xrun".to_string(),
                },
            },
        );

        let reasons: Vec<String> = received
            .try_iter()
            .map(|event| match event {
                CaptureEvent::DeviceError(reason) => reason,
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        assert_eq!(reasons.len(), 2);
        assert!(reasons[1].contains("xrun"));
    }

    #[test]
    fn float_conversion_saturates() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.5), i16::MAX);
        assert_eq!(f32_to_i16(-1.5), -i16::MAX);
    }

    #[test]
    fn idle_engine_stop_is_a_no_op() {
        let mut engine = CaptureEngine::new(
            TimeBase::default(),
            CaptureFormat::default(),
            16,
            Arc::new(crate::delegate::NullDelegate),
        );
        assert_eq!(engine.state(), CaptureState::Idle);
        assert!(engine.stop().unwrap().is_none());
        assert!(engine.stop().unwrap().is_none());
        assert!(engine.take_monitor().is_some());
    }
}
