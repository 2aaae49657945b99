//! In-memory devices, muxers and delegates for unit tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::config::ContainerFormat;
use crate::models::error::CaptureError;
use crate::models::format::{AudioFormat, AudioSampleFormat, DeviceKind, MediaFormat, PixelFormat, StreamTag, VideoFormat};
use crate::models::recording_result::RecordingResult;
use crate::models::sample::Sample;
use crate::models::state::SessionState;
use crate::processing::negotiate::PREFERRED_AUDIO;
use crate::reader::{Continuation, ReadCallback, ReadCompletion, ReadEvent};
use crate::traits::device_source::{DeviceDescriptor, DeviceProvider, DeviceSource};
use crate::traits::media_muxer::{MediaMuxer, MuxerProvider, OutputStream};
use crate::traits::session_delegate::SessionDelegate;
use crate::traits::sinks::{AudioMonitor, PreviewSink};
use crate::writer::BuiltinMuxers;

/// Format the fake camera negotiates to when no format is requested.
pub(crate) fn default_video_format() -> VideoFormat {
    VideoFormat::new(1280, 720, 30.0, PixelFormat::Nv12)
}

fn default_formats(kind: DeviceKind) -> Vec<MediaFormat> {
    match kind {
        DeviceKind::Camera => vec![
            MediaFormat::Video(VideoFormat::new(640, 480, 30.0, PixelFormat::Nv12)),
            MediaFormat::Video(default_video_format()),
        ],
        DeviceKind::Microphone => vec![
            MediaFormat::Audio(AudioFormat::new(1, 16000, AudioSampleFormat::I16)),
            MediaFormat::Audio(PREFERRED_AUDIO),
        ],
    }
}

#[derive(Default)]
struct FeedState {
    queue: VecDeque<ReadEvent>,
    pending: Option<ReadCompletion>,
    reads: u64,
    closed: bool,
    fail: Option<CaptureError>,
}

/// Test-controlled event source behind a [`FakeDevice`].
///
/// Events pushed while a read is pending complete it on the pushing thread;
/// otherwise they queue up and are returned synchronously by later reads.
pub(crate) struct FakeFeed {
    formats: Vec<MediaFormat>,
    state: Mutex<FeedState>,
}

impl FakeFeed {
    pub(crate) fn new() -> Arc<Self> {
        Self::with_formats(Vec::new())
    }

    pub(crate) fn with_formats(formats: Vec<MediaFormat>) -> Arc<Self> {
        Arc::new(Self {
            formats,
            state: Mutex::new(FeedState::default()),
        })
    }

    pub(crate) fn push(&self, event: ReadEvent) {
        let completion = {
            let mut state = self.state.lock();
            match state.pending.take() {
                Some(completion) => completion,
                None => {
                    state.queue.push_back(event);
                    return;
                }
            }
        };
        completion.complete(event);
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    pub(crate) fn reads(&self) -> u64 {
        self.state.lock().reads
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Reject every following read request with `error`.
    pub(crate) fn fail_reads(&self, error: CaptureError) {
        self.state.lock().fail = Some(error);
    }
}

pub(crate) struct FakeDevice {
    descriptor: DeviceDescriptor,
    feed: Arc<FakeFeed>,
    format: Option<MediaFormat>,
    open: bool,
}

impl DeviceSource for FakeDevice {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn native_formats(&self) -> Vec<MediaFormat> {
        if self.feed.formats.is_empty() {
            default_formats(self.descriptor.kind)
        } else {
            self.feed.formats.clone()
        }
    }

    fn set_format(&mut self, format: &MediaFormat) -> Result<(), CaptureError> {
        if !self.native_formats().contains(format) {
            return Err(CaptureError::FormatNotSupported(format!("{:?}", format)));
        }
        self.format = Some(*format);
        Ok(())
    }

    fn format(&self) -> Option<MediaFormat> {
        self.format
    }

    fn read_sample(&mut self, completion: ReadCompletion) -> Result<(), CaptureError> {
        let event = {
            let mut state = self.feed.state.lock();
            state.reads += 1;
            if let Some(error) = &state.fail {
                return Err(error.clone());
            }
            if state.closed {
                return Err(CaptureError::DeviceNotAvailable(self.descriptor.id.clone()));
            }
            match state.queue.pop_front() {
                Some(event) => event,
                None => {
                    state.pending = Some(completion);
                    return Ok(());
                }
            }
        };
        completion.complete(event);
        Ok(())
    }

    fn close(&mut self) {
        let pending = {
            let mut state = self.feed.state.lock();
            state.closed = true;
            state.pending.take()
        };
        self.open = false;
        drop(pending);
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Opens [`FakeDevice`]s registered by id.
#[derive(Default)]
pub(crate) struct FakeProvider {
    cameras: Vec<(String, Arc<FakeFeed>)>,
    microphones: Vec<(String, Arc<FakeFeed>)>,
    deny_microphone: bool,
    open_delay: Option<Duration>,
}

impl FakeProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_camera(mut self, id: &str, feed: Arc<FakeFeed>) -> Self {
        self.cameras.push((id.to_string(), feed));
        self
    }

    pub(crate) fn with_microphone(mut self, id: &str, feed: Arc<FakeFeed>) -> Self {
        self.microphones.push((id.to_string(), feed));
        self
    }

    pub(crate) fn deny_microphone(mut self) -> Self {
        self.deny_microphone = true;
        self
    }

    /// Every `open` sleeps for `delay` first.
    pub(crate) fn slow_open(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }
}

impl DeviceProvider for FakeProvider {
    fn open(&self, kind: DeviceKind, id: &str) -> Result<Box<dyn DeviceSource>, CaptureError> {
        if let Some(delay) = self.open_delay {
            thread::sleep(delay);
        }
        if kind == DeviceKind::Microphone && self.deny_microphone {
            return Err(CaptureError::PermissionDenied);
        }
        let devices = match kind {
            DeviceKind::Camera => &self.cameras,
            DeviceKind::Microphone => &self.microphones,
        };
        let feed = devices
            .iter()
            .find(|(device_id, _)| device_id == id)
            .map(|(_, feed)| Arc::clone(feed))
            .ok_or_else(|| CaptureError::DeviceNotAvailable(id.to_string()))?;
        feed.state.lock().closed = false;

        Ok(Box::new(FakeDevice {
            descriptor: DeviceDescriptor::new(id, format!("Fake {}", id), kind),
            feed,
            format: None,
            open: true,
        }))
    }
}

/// Records reader completions. Stops the loop on anything but a sample, or
/// once `stop_after` completions were seen.
pub(crate) struct CallbackLog {
    events: Mutex<Vec<(StreamTag, ReadEvent)>>,
    stop_after: Option<usize>,
}

impl CallbackLog {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            stop_after: None,
        })
    }

    pub(crate) fn stopping_after(count: usize) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            stop_after: Some(count),
        })
    }

    pub(crate) fn events(&self) -> Vec<(StreamTag, ReadEvent)> {
        self.events.lock().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub(crate) fn timestamps(&self, stream: StreamTag) -> Vec<i64> {
        self.events
            .lock()
            .iter()
            .filter_map(|(tag, event)| match event {
                ReadEvent::Sample(sample) if *tag == stream => Some(sample.timestamp()),
                _ => None,
            })
            .collect()
    }
}

impl ReadCallback for CallbackLog {
    fn on_read_complete(&self, stream: StreamTag, event: ReadEvent) -> Continuation {
        let is_sample = event.is_sample();
        let mut events = self.events.lock();
        events.push((stream, event));
        let limit_reached = self.stop_after.is_some_and(|n| events.len() >= n);
        if !is_sample || limit_reached {
            Continuation::Stop
        } else {
            Continuation::Continue
        }
    }
}

/// Built-in muxers with injected failures.
#[derive(Debug, Clone, Default)]
pub(crate) struct FlakyMuxers {
    failing: Vec<usize>,
    unwritable_after: Option<usize>,
    finalize_delay: Option<Duration>,
    write_delay: Option<Duration>,
}

impl FlakyMuxers {
    /// The listed writes (0-based) fail with `EncodingFailed`; the muxer stays
    /// writable.
    pub(crate) fn failing_writes(writes: &[usize]) -> Self {
        Self {
            failing: writes.to_vec(),
            ..Default::default()
        }
    }

    /// Every write after the first `writes` fails and leaves the muxer
    /// unwritable, as on a full disk.
    pub(crate) fn unwritable_after(writes: usize) -> Self {
        Self {
            unwritable_after: Some(writes),
            ..Default::default()
        }
    }

    pub(crate) fn slow_finalize(delay: Duration) -> Self {
        Self {
            finalize_delay: Some(delay),
            ..Default::default()
        }
    }

    pub(crate) fn slow_writes(delay: Duration) -> Self {
        Self {
            write_delay: Some(delay),
            ..Default::default()
        }
    }
}

impl MuxerProvider for FlakyMuxers {
    fn create_muxer(&self, path: &Path, container: &ContainerFormat) -> Result<Box<dyn MediaMuxer>, CaptureError> {
        Ok(Box::new(FlakyMuxer {
            inner: BuiltinMuxers.create_muxer(path, container)?,
            plan: self.clone(),
            writes: 0,
            writable: true,
        }))
    }
}

struct FlakyMuxer {
    inner: Box<dyn MediaMuxer>,
    plan: FlakyMuxers,
    writes: usize,
    writable: bool,
}

impl MediaMuxer for FlakyMuxer {
    fn add_stream(&mut self, stream: &OutputStream) -> Result<usize, CaptureError> {
        self.inner.add_stream(stream)
    }

    fn begin_writing(&mut self) -> Result<(), CaptureError> {
        self.inner.begin_writing()
    }

    fn write_sample(
        &mut self,
        stream_index: usize,
        timestamp: i64,
        duration: Option<i64>,
        payload: &[u8],
    ) -> Result<(), CaptureError> {
        let n = self.writes;
        self.writes += 1;
        if let Some(delay) = self.plan.write_delay {
            thread::sleep(delay);
        }
        if self.plan.unwritable_after.is_some_and(|limit| n >= limit) {
            self.writable = false;
            return Err(CaptureError::StorageError("no space left on device".into()));
        }
        if self.plan.failing.contains(&n) {
            return Err(CaptureError::EncodingFailed(format!("injected failure on write {}", n)));
        }
        self.inner.write_sample(stream_index, timestamp, duration, payload)
    }

    fn is_writable(&self) -> bool {
        self.writable && self.inner.is_writable()
    }

    fn finalize(&mut self) -> Result<(), CaptureError> {
        if let Some(delay) = self.plan.finalize_delay {
            thread::sleep(delay);
        }
        self.inner.finalize()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SessionEvent {
    State(SessionState),
    StreamingStarted,
    StreamingStopped,
    StreamingError(CaptureError),
    RecordingStarted,
    RecordingStopped(Option<RecordingResult>),
    RecordingError(CaptureError),
    Duration(i64),
}

/// Session delegate recording every notification in order.
#[derive(Default)]
pub(crate) struct EventLog {
    events: Mutex<Vec<SessionEvent>>,
    changed: Condvar,
}

impl EventLog {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, event: SessionEvent) {
        self.events.lock().push(event);
        self.changed.notify_all();
    }

    pub(crate) fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }

    pub(crate) fn count(&self, matches: impl Fn(&SessionEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| matches(e)).count()
    }

    pub(crate) fn durations(&self) -> Vec<i64> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Duration(ms) => Some(*ms),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn recordings_stopped(&self) -> Vec<Option<RecordingResult>> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SessionEvent::RecordingStopped(result) => Some(result.clone()),
                _ => None,
            })
            .collect()
    }

    /// Block until `done` holds for the recorded events or `timeout` passes.
    pub(crate) fn wait_until(&self, timeout: Duration, done: impl Fn(&[SessionEvent]) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut events = self.events.lock();
        while !done(&events) {
            if self.changed.wait_until(&mut events, deadline).timed_out() {
                return done(&events);
            }
        }
        true
    }
}

impl SessionDelegate for EventLog {
    fn on_state_changed(&self, state: SessionState) {
        self.record(SessionEvent::State(state));
    }

    fn on_streaming_started(&self) {
        self.record(SessionEvent::StreamingStarted);
    }

    fn on_streaming_stopped(&self) {
        self.record(SessionEvent::StreamingStopped);
    }

    fn on_streaming_error(&self, error: &CaptureError) {
        self.record(SessionEvent::StreamingError(error.clone()));
    }

    fn on_recording_started(&self) {
        self.record(SessionEvent::RecordingStarted);
    }

    fn on_recording_stopped(&self, result: Option<&RecordingResult>) {
        self.record(SessionEvent::RecordingStopped(result.cloned()));
    }

    fn on_recording_error(&self, error: &CaptureError) {
        self.record(SessionEvent::RecordingError(error.clone()));
    }

    fn on_duration_changed(&self, duration_ms: i64) {
        self.record(SessionEvent::Duration(duration_ms));
    }
}

/// Preview sink and audio monitor keeping what they were handed.
#[derive(Default)]
pub(crate) struct FrameLog {
    video: Mutex<Vec<i64>>,
    audio: Mutex<Vec<Sample>>,
}

impl FrameLog {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn video_timestamps(&self) -> Vec<i64> {
        self.video.lock().clone()
    }

    pub(crate) fn audio_samples(&self) -> Vec<Sample> {
        self.audio.lock().clone()
    }
}

impl PreviewSink for FrameLog {
    fn on_video_sample(&self, sample: &Sample, _format: &VideoFormat) {
        self.video.lock().push(sample.timestamp());
    }
}

impl AudioMonitor for FrameLog {
    fn on_audio_sample(&self, sample: &Sample, _format: &AudioFormat) {
        self.audio.lock().push(sample.clone());
    }
}
