use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use super::duration_timer::DurationTimer;
use crate::models::config::{ActivationRequest, RecordingSettings, SessionConfig};
use crate::models::diagnostics::{AudioLevels, SessionDiagnostics};
use crate::models::error::CaptureError;
use crate::models::format::{StreamFormats, StreamTag};
use crate::models::recording_result::RecordingResult;
use crate::models::sample::{Sample, TICKS_PER_MILLISECOND};
use crate::models::state::SessionState;
use crate::processing::pcm;
use crate::reader::{AggregateReader, Continuation, ReadCallback, ReadEvent};
use crate::traits::device_source::DeviceProvider;
use crate::traits::media_muxer::MuxerProvider;
use crate::traits::session_delegate::SessionDelegate;
use crate::traits::sinks::{AudioMonitor, PreviewSink};
use crate::writer::{BuiltinMuxers, EncodeSinkWriter, FinalizeSignal};

/// Delegate notification, collected under the state lock and delivered after
/// it is released.
enum Notice {
    State(SessionState),
    StreamingStarted,
    StreamingStopped,
    StreamingError(CaptureError),
    RecordingStarted,
    RecordingStopped(Option<RecordingResult>),
    RecordingError(CaptureError),
    Duration(i64),
}

/// The writer of the current recording, tagged with the recording it belongs to.
struct WriterSlot {
    epoch: u64,
    writer: EncodeSinkWriter,
}

/// Decided under the state lock for a sample that is going to be written.
struct WritePlan {
    epoch: u64,
    timestamp: i64,
    gain: f32,
    first: bool,
}

fn stream_slot(stream: StreamTag) -> usize {
    match stream {
        StreamTag::Video => 0,
        StreamTag::Audio => 1,
    }
}

struct SessionInner {
    state: SessionState,
    formats: StreamFormats,
    streaming_started: bool,
    /// Capture timestamp of the first sample of the recording, shifted by
    /// every pause.
    time_offset: Option<i64>,
    pause_timestamp: Option<i64>,
    last_timestamp: Option<i64>,
    last_output: [i64; 2],
    muted: bool,
    volume: f32,
    current_duration: i64,
    last_reported_ms: i64,
    epoch: u64,
    recording_starting: bool,
    /// Set by a deactivate that arrives while devices are being opened.
    deactivate_requested: bool,
    pending_finalize: Option<Arc<FinalizeSignal>>,
    last_result: Option<RecordingResult>,
    diagnostics: SessionDiagnostics,
    levels: AudioLevels,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            state: SessionState::Inactive,
            formats: StreamFormats::default(),
            streaming_started: false,
            time_offset: None,
            pause_timestamp: None,
            last_timestamp: None,
            last_output: [0; 2],
            muted: false,
            volume: 1.0,
            current_duration: 0,
            last_reported_ms: -1,
            epoch: 0,
            recording_starting: false,
            deactivate_requested: false,
            pending_finalize: None,
            last_result: None,
            diagnostics: SessionDiagnostics::default(),
            levels: AudioLevels::default(),
        }
    }

    fn transition(&mut self, state: SessionState, notices: &mut Vec<Notice>) {
        if self.state != state {
            log::info!("Session {} -> {}", self.state, state);
            self.state = state;
            notices.push(Notice::State(state));
        }
    }

    fn reset_recording_clock(&mut self) {
        self.time_offset = None;
        self.pause_timestamp = None;
        self.last_output = [0; 2];
        self.current_duration = 0;
        self.last_reported_ms = -1;
    }

    /// Stamp position of `sample` in the current recording.
    fn plan_write(&mut self, sample: &Sample) -> WritePlan {
        let first = self.time_offset.is_none();
        let offset = *self.time_offset.get_or_insert(sample.timestamp());
        let slot = stream_slot(sample.stream());
        let timestamp = (sample.timestamp() - offset).max(self.last_output[slot]);
        self.last_output[slot] = timestamp;
        WritePlan {
            epoch: self.epoch,
            timestamp,
            gain: if self.muted { 0.0 } else { self.volume },
            first,
        }
    }

    fn finalize_pending(&self) -> bool {
        self.pending_finalize.as_ref().is_some_and(|s| !s.is_done())
    }
}

struct SessionShared {
    config: SessionConfig,
    devices: Arc<dyn DeviceProvider>,
    muxers: Arc<dyn MuxerProvider>,
    inner: Mutex<SessionInner>,
    /// Lock order: `inner` before `writer` when both are held.
    writer: Mutex<Option<WriterSlot>>,
    reader: Mutex<Option<Arc<AggregateReader>>>,
    delegate: Mutex<Option<Arc<dyn SessionDelegate>>>,
    preview: Mutex<Option<Arc<dyn PreviewSink>>>,
    monitor: Mutex<Option<Arc<dyn AudioMonitor>>>,
    timer: Mutex<Option<DurationTimer>>,
}

/// Read callback handed to the reader. Holds the session weakly so the reader
/// never keeps it alive.
struct SessionCallback(Weak<SessionShared>);

impl ReadCallback for SessionCallback {
    fn on_read_complete(&self, stream: StreamTag, event: ReadEvent) -> Continuation {
        match self.0.upgrade() {
            Some(shared) => shared.on_read_complete(stream, event),
            None => Continuation::Stop,
        }
    }
}

impl SessionShared {
    fn emit(&self, notices: Vec<Notice>) {
        if notices.is_empty() {
            return;
        }
        let delegate = self.delegate.lock().clone();
        let Some(delegate) = delegate else {
            return;
        };
        for notice in notices {
            match notice {
                Notice::State(state) => delegate.on_state_changed(state),
                Notice::StreamingStarted => delegate.on_streaming_started(),
                Notice::StreamingStopped => delegate.on_streaming_stopped(),
                Notice::StreamingError(e) => delegate.on_streaming_error(&e),
                Notice::RecordingStarted => delegate.on_recording_started(),
                Notice::RecordingStopped(result) => delegate.on_recording_stopped(result.as_ref()),
                Notice::RecordingError(e) => delegate.on_recording_error(&e),
                Notice::Duration(ms) => delegate.on_duration_changed(ms),
            }
        }
    }

    fn on_read_complete(self: &Arc<Self>, stream: StreamTag, event: ReadEvent) -> Continuation {
        match event {
            ReadEvent::Sample(sample) => self.dispatch_sample(sample),
            ReadEvent::EndOfStream => {
                self.streaming_ended(stream, None);
                Continuation::Stop
            }
            ReadEvent::Error(e) => {
                self.streaming_ended(stream, Some(e));
                Continuation::Stop
            }
        }
    }

    fn dispatch_sample(self: &Arc<Self>, sample: Sample) -> Continuation {
        let stream = sample.stream();
        let mut notices = Vec::new();
        let (formats, plan) = {
            let mut inner = self.inner.lock();
            if !inner.state.is_active() {
                return Continuation::Stop;
            }
            inner.last_timestamp = Some(sample.timestamp());
            match stream {
                StreamTag::Video => inner.diagnostics.video_samples += 1,
                StreamTag::Audio => inner.diagnostics.audio_samples += 1,
            }
            if !inner.streaming_started {
                inner.streaming_started = true;
                notices.push(Notice::StreamingStarted);
            }
            let plan = if inner.state.is_recording() {
                Some(inner.plan_write(&sample))
            } else {
                None
            };
            (inner.formats, plan)
        };
        self.emit(notices);

        match stream {
            StreamTag::Video => {
                let preview = self.preview.lock().clone();
                if let (Some(preview), Some(format)) = (preview, formats.video) {
                    preview.on_video_sample(&sample, &format);
                    self.inner.lock().diagnostics.preview_frames += 1;
                }
            }
            StreamTag::Audio => {
                let monitor = self.monitor.lock().clone();
                if let (Some(monitor), Some(format)) = (monitor, formats.audio) {
                    monitor.on_audio_sample(&sample, &format);
                }
            }
        }

        if let Some(plan) = plan {
            self.record_sample(sample, &formats, plan);
        }
        Continuation::Continue
    }

    fn record_sample(self: &Arc<Self>, mut sample: Sample, formats: &StreamFormats, plan: WritePlan) {
        sample.set_output_timestamp(plan.timestamp);

        let mut levels = None;
        if let (StreamTag::Audio, Some(format)) = (sample.stream(), formats.audio) {
            if plan.gain != 1.0 {
                pcm::apply_gain(sample.payload_mut(), format.sample_format, plan.gain);
            }
            levels = Some(pcm::measure(sample.payload(), format.sample_format));
        }

        let outcome = {
            let mut slot = self.writer.lock();
            match slot.as_mut() {
                Some(slot) if slot.epoch == plan.epoch => slot.writer.write_sample(&sample),
                _ => return,
            }
        };

        let mut notices = Vec::new();
        let mut unwritable = false;
        {
            let mut inner = self.inner.lock();
            if inner.epoch != plan.epoch || !inner.state.has_recording() {
                return;
            }
            if let Some(levels) = levels {
                inner.levels = levels;
            }
            match outcome {
                Ok(true) => {
                    inner.diagnostics.samples_written += 1;
                    inner.diagnostics.bytes_written += sample.payload().len() as u64;
                    inner.current_duration = inner.current_duration.max(plan.timestamp);
                }
                Ok(false) => {}
                Err(CaptureError::NotWritable) => {
                    inner.diagnostics.samples_dropped += 1;
                    unwritable = true;
                }
                Err(e) => {
                    log::warn!(
                        "Dropped {:?} sample at {}: {}",
                        sample.stream(),
                        plan.timestamp,
                        e
                    );
                    inner.diagnostics.samples_dropped += 1;
                    inner.current_duration = inner.current_duration.max(plan.timestamp);
                }
            }
            if plan.first {
                notices.push(Notice::RecordingStarted);
            }
        }
        self.emit(notices);

        if unwritable {
            log::error!("Recording output is no longer writable, stopping recording");
            self.stop_recording(Some(CaptureError::NotWritable));
        }
    }

    fn streaming_ended(self: &Arc<Self>, stream: StreamTag, error: Option<CaptureError>) {
        if !self.inner.lock().state.is_active() {
            return;
        }
        match &error {
            Some(e) => log::error!("Capture {:?} stream failed: {}", stream, e),
            None => log::info!("Capture {:?} stream ended", stream),
        }

        self.stop_recording(None);

        let reader = self.reader.lock().take();
        if let Some(reader) = reader {
            reader.shutdown();
        }

        let mut notices = Vec::new();
        {
            let mut inner = self.inner.lock();
            if !inner.state.is_active() {
                return;
            }
            inner.transition(SessionState::Inactive, &mut notices);
            inner.streaming_started = false;
        }
        notices.push(match error {
            Some(e) => Notice::StreamingError(e),
            None => Notice::StreamingStopped,
        });
        self.emit(notices);
    }

    fn activate(self: &Arc<Self>, request: &ActivationRequest) -> Result<(), CaptureError> {
        request.validate().map_err(CaptureError::InvalidArgument)?;
        {
            let mut inner = self.inner.lock();
            if !inner.state.is_inactive() {
                return Err(CaptureError::InvalidState(format!("cannot activate while {}", inner.state)));
            }
            inner.state = SessionState::Activating;
            inner.deactivate_requested = false;
        }

        let callback = Arc::new(SessionCallback(Arc::downgrade(self)));
        let reader = match AggregateReader::open(self.devices.as_ref(), request, callback) {
            Ok(reader) => Arc::new(reader),
            Err(e) => {
                log::warn!("Activation failed: {}", e);
                self.inner.lock().state = SessionState::Inactive;
                return Err(e);
            }
        };

        let mut notices = Vec::new();
        {
            let mut inner = self.inner.lock();
            if std::mem::take(&mut inner.deactivate_requested) {
                inner.state = SessionState::Inactive;
                drop(inner);
                log::info!("Activation cancelled by deactivate");
                reader.shutdown();
                return Err(CaptureError::InvalidState("deactivated while activating".into()));
            }
            let formats = reader.formats();
            inner.formats = formats;
            inner.streaming_started = false;
            inner.last_timestamp = None;
            inner.levels = AudioLevels::default();
            inner.diagnostics = SessionDiagnostics {
                video_format: formats.video.map(|f| format!("{:?}", f)).unwrap_or_default(),
                audio_format: formats.audio.map(|f| format!("{:?}", f)).unwrap_or_default(),
                ..Default::default()
            };
            inner.transition(SessionState::Streaming, &mut notices);
        }
        let stale = self.reader.lock().replace(Arc::clone(&reader));
        if let Some(stale) = stale {
            stale.shutdown();
        }
        self.emit(notices);

        reader.start();
        Ok(())
    }

    fn deactivate(self: &Arc<Self>) {
        let state = {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Activating {
                inner.deactivate_requested = true;
            }
            inner.state
        };
        match state {
            SessionState::Inactive => {
                // A streaming error may have left a recording finalizing.
                let signal = self.inner.lock().pending_finalize.clone();
                if let Some(signal) = signal {
                    signal.wait();
                }
                let reader = self.reader.lock().take();
                if let Some(reader) = reader {
                    reader.shutdown();
                }
                return;
            }
            SessionState::Activating => {
                log::info!("Deactivate requested while activating");
                return;
            }
            SessionState::Deactivating => {
                log::warn!("Ignoring deactivate while {}", state);
                return;
            }
            _ => {}
        }

        self.stop_recording(None);

        let mut notices = Vec::new();
        let signal = {
            let mut inner = self.inner.lock();
            if inner.state.is_active() {
                inner.transition(SessionState::Deactivating, &mut notices);
            }
            inner.pending_finalize.clone()
        };
        self.emit(std::mem::take(&mut notices));

        if let Some(signal) = signal {
            signal.wait();
        }

        let reader = self.reader.lock().take();
        if let Some(reader) = reader {
            reader.shutdown();
        }

        {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Deactivating {
                return;
            }
            inner.transition(SessionState::Inactive, &mut notices);
            inner.streaming_started = false;
            inner.formats = StreamFormats::default();
        }
        notices.push(Notice::StreamingStopped);
        self.emit(notices);
    }

    fn start_recording(self: &Arc<Self>, path: &Path, settings: &RecordingSettings) -> Result<(), CaptureError> {
        let (formats, epoch) = {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Streaming {
                return Err(CaptureError::InvalidState(format!(
                    "can only start recording while streaming (state: {})",
                    inner.state
                )));
            }
            if inner.recording_starting {
                return Err(CaptureError::InvalidState("recording start already in progress".into()));
            }
            if inner.finalize_pending() {
                return Err(CaptureError::InvalidState(
                    "previous recording is still being finalized".into(),
                ));
            }
            inner.recording_starting = true;
            (inner.formats, inner.epoch + 1)
        };

        let writer = match EncodeSinkWriter::start(self.muxers.as_ref(), path, settings, &formats) {
            Ok(writer) => writer,
            Err(e) => {
                log::warn!("Failed to start recording to {}: {}", path.display(), e);
                self.inner.lock().recording_starting = false;
                return Err(e);
            }
        };

        let mut notices = Vec::new();
        {
            let mut inner = self.inner.lock();
            inner.recording_starting = false;
            if inner.state != SessionState::Streaming {
                drop(inner);
                writer.finalize(Box::new(|result| {
                    if let Err(e) = result {
                        log::error!("Failed to finalize abandoned recording: {}", e);
                    }
                }));
                return Err(CaptureError::InvalidState(
                    "streaming stopped while the recording was starting".into(),
                ));
            }
            inner.epoch = epoch;
            inner.reset_recording_clock();
            inner.last_reported_ms = 0;
            inner.pending_finalize = None;
            inner.levels = AudioLevels::default();
            *self.writer.lock() = Some(WriterSlot { epoch, writer });
            inner.transition(SessionState::Recording, &mut notices);
        }
        notices.push(Notice::Duration(0));
        self.start_timer();
        self.emit(notices);
        Ok(())
    }

    /// Leave Recording/Paused and finalize the writer in the background.
    ///
    /// `error` is reported as a recording error before the finalize result.
    /// Returns whether a recording was stopped.
    fn stop_recording(self: &Arc<Self>, error: Option<CaptureError>) -> bool {
        let mut notices = Vec::new();
        let signal = {
            let mut inner = self.inner.lock();
            if !inner.state.has_recording() {
                return false;
            }
            inner.transition(SessionState::Streaming, &mut notices);
            inner.reset_recording_clock();
            let signal = Arc::new(FinalizeSignal::new());
            inner.pending_finalize = Some(Arc::clone(&signal));
            signal
        };
        // Taken after `inner` is released. No new writer can be installed
        // while `signal` is pending.
        let slot = self.writer.lock().take();
        self.stop_timer();

        if let Some(e) = error {
            notices.push(Notice::RecordingError(e));
        }
        self.emit(notices);

        match slot {
            Some(slot) => {
                let shared = Arc::clone(self);
                let finished = Arc::clone(&signal);
                slot.writer.finalize(Box::new(move |result| {
                    finished.enter();
                    shared.recording_finalized(&finished, result);
                    finished.notify();
                }));
            }
            None => signal.notify(),
        }
        true
    }

    fn recording_finalized(&self, signal: &Arc<FinalizeSignal>, result: Result<RecordingResult, CaptureError>) {
        {
            let mut inner = self.inner.lock();
            if inner
                .pending_finalize
                .as_ref()
                .is_some_and(|pending| Arc::ptr_eq(pending, signal))
            {
                inner.pending_finalize = None;
            }
            if let Ok(result) = &result {
                inner.last_result = Some(result.clone());
            }
        }

        let notices = match result {
            Ok(result) => vec![Notice::RecordingStopped(Some(result))],
            Err(e) => {
                log::error!("Recording finalize failed: {}", e);
                vec![Notice::RecordingError(e), Notice::RecordingStopped(None)]
            }
        };
        self.emit(notices);
    }

    fn start_timer(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let timer = DurationTimer::start(self.config.duration_update_interval, move || match weak.upgrade() {
            Some(shared) => {
                shared.report_duration();
                true
            }
            None => false,
        });
        match timer {
            Ok(timer) => {
                let previous = self.timer.lock().replace(timer);
                if let Some(previous) = previous {
                    previous.stop();
                }
            }
            Err(e) => log::error!("Failed to start duration timer: {}", e),
        }
    }

    fn stop_timer(&self) {
        let timer = self.timer.lock().take();
        if let Some(timer) = timer {
            timer.stop();
        }
    }

    fn report_duration(&self) {
        let ms = {
            let mut inner = self.inner.lock();
            if !inner.state.has_recording() {
                return;
            }
            let ms = inner.current_duration / TICKS_PER_MILLISECOND;
            if ms == inner.last_reported_ms {
                return;
            }
            inner.last_reported_ms = ms;
            ms
        };
        self.emit(vec![Notice::Duration(ms)]);
    }
}

/// Camera/microphone capture session with live preview and optional
/// recording to a muxed file.
///
/// ```text
/// [camera]──┐                          ┌→ PreviewSink / AudioMonitor
///           ├→ AggregateReader → session┤
/// [mic]─────┘                          └→ EncodeSinkWriter → file
/// ```
///
/// All methods take `&self` and may be called from any thread. Delegate
/// notifications are delivered without holding session locks. Dropping the
/// session deactivates it, which blocks until a running recording is
/// finalized.
pub struct CaptureRecordSession {
    shared: Arc<SessionShared>,
}

impl CaptureRecordSession {
    /// Session with the built-in muxers and default configuration.
    pub fn new(devices: Arc<dyn DeviceProvider>) -> Self {
        Self::build(devices, Arc::new(BuiltinMuxers), SessionConfig::default())
    }

    pub fn with_config(
        devices: Arc<dyn DeviceProvider>,
        muxers: Arc<dyn MuxerProvider>,
        config: SessionConfig,
    ) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::InvalidArgument)?;
        Ok(Self::build(devices, muxers, config))
    }

    fn build(devices: Arc<dyn DeviceProvider>, muxers: Arc<dyn MuxerProvider>, config: SessionConfig) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                config,
                devices,
                muxers,
                inner: Mutex::new(SessionInner::new()),
                writer: Mutex::new(None),
                reader: Mutex::new(None),
                delegate: Mutex::new(None),
                preview: Mutex::new(None),
                monitor: Mutex::new(None),
                timer: Mutex::new(None),
            }),
        }
    }

    pub fn set_delegate(&self, delegate: Arc<dyn SessionDelegate>) {
        *self.shared.delegate.lock() = Some(delegate);
    }

    pub fn set_preview_sink(&self, sink: Option<Arc<dyn PreviewSink>>) {
        *self.shared.preview.lock() = sink;
    }

    pub fn set_audio_monitor(&self, monitor: Option<Arc<dyn AudioMonitor>>) {
        *self.shared.monitor.lock() = monitor;
    }

    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().state
    }

    /// Formats negotiated at activation. Empty while inactive.
    pub fn stream_formats(&self) -> StreamFormats {
        self.shared.inner.lock().formats
    }

    /// Open the requested devices and start streaming.
    ///
    /// Device, permission and format errors are returned here and leave the
    /// session inactive. Samples already available are delivered before this
    /// returns.
    pub fn activate(&self, request: &ActivationRequest) -> Result<(), CaptureError> {
        self.shared.activate(request)
    }

    /// Stop any recording, wait for it to be finalized, then close the devices.
    ///
    /// Blocks on the finalize. Called from a delegate during finalize it does
    /// not wait. Called while another thread is in [`activate`](Self::activate),
    /// it makes that activation fail with `InvalidState`.
    pub fn deactivate(&self) {
        self.shared.deactivate();
    }

    /// Create the output file and start recording from the next sample.
    ///
    /// Fails if the session is not streaming, a previous recording is still
    /// being finalized, or the writer cannot be set up.
    pub fn start_recording(&self, path: impl AsRef<Path>, settings: &RecordingSettings) -> Result<(), CaptureError> {
        self.shared.start_recording(path.as_ref(), settings)
    }

    /// Stop recording. Returns at once; `on_recording_stopped` fires when the
    /// file is finalized.
    pub fn stop_recording(&self) {
        if !self.shared.stop_recording(None) {
            log::debug!("stop_recording ignored: not recording");
        }
    }

    /// Returns `false` unless the session was recording.
    pub fn pause_recording(&self) -> bool {
        let mut notices = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if inner.state != SessionState::Recording {
                return false;
            }
            inner.pause_timestamp = inner.last_timestamp;
            inner.transition(SessionState::Paused, &mut notices);
        }
        self.shared.emit(notices);
        true
    }

    /// Returns `false` unless the session was paused. Time spent paused is cut
    /// from the recording timeline.
    pub fn resume_recording(&self) -> bool {
        let mut notices = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if inner.state != SessionState::Paused {
                return false;
            }
            let pause = inner.pause_timestamp.take();
            if let (Some(offset), Some(pause), Some(last)) = (inner.time_offset, pause, inner.last_timestamp) {
                inner.time_offset = Some(offset + (last - pause));
            }
            inner.transition(SessionState::Recording, &mut notices);
        }
        self.shared.emit(notices);
        true
    }

    pub fn set_muted(&self, muted: bool) {
        self.shared.inner.lock().muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.shared.inner.lock().muted
    }

    /// Recording gain for audio, clamped to `0.0..=1.0`.
    pub fn set_volume(&self, volume: f32) {
        if volume.is_nan() {
            return;
        }
        self.shared.inner.lock().volume = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        self.shared.inner.lock().volume
    }

    /// Recorded duration in milliseconds; 0 when not recording.
    pub fn duration_ms(&self) -> i64 {
        self.shared.inner.lock().current_duration / TICKS_PER_MILLISECOND
    }

    /// Whether a stopped recording is still being finalized.
    pub fn is_finalizing(&self) -> bool {
        self.shared.inner.lock().finalize_pending()
    }

    /// Wait until the last stopped recording has been finalized. Returns
    /// `false` on timeout.
    pub fn wait_for_recording_stopped(&self, timeout: Duration) -> bool {
        let pending = self.shared.inner.lock().pending_finalize.clone();
        match pending {
            Some(signal) => signal.wait_timeout(timeout),
            None => true,
        }
    }

    /// Result of the most recent successfully finalized recording.
    pub fn last_recording(&self) -> Option<RecordingResult> {
        self.shared.inner.lock().last_result.clone()
    }

    /// Read requests outstanding on the devices: 1 while streaming.
    pub fn outstanding_requests(&self) -> usize {
        let reader = self.shared.reader.lock().clone();
        reader.map_or(0, |r| r.outstanding_requests())
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        let reader = self.shared.reader.lock().clone();
        let mut diagnostics = self.shared.inner.lock().diagnostics.clone();
        if let Some(reader) = reader {
            diagnostics.read_requests = reader.requests_issued();
        }
        diagnostics
    }

    /// Levels of the last recorded audio sample.
    pub fn audio_levels(&self) -> AudioLevels {
        self.shared.inner.lock().levels
    }
}

impl Drop for CaptureRecordSession {
    fn drop(&mut self) {
        self.shared.deactivate();
        self.shared.stop_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{CodecId, ContainerFormat};
    use crate::models::format::AudioSampleFormat;
    use crate::storage::metadata;
    use crate::testing::{EventLog, FakeFeed, FakeProvider, FlakyMuxers, FrameLog, SessionEvent};
    use crate::writer::read_sample_stream;
    use approx::assert_abs_diff_eq;
    use std::fs;
    use std::path::PathBuf;
    use std::thread;
    use std::time::Instant;

    const WAIT: Duration = Duration::from_secs(5);
    const MS: i64 = TICKS_PER_MILLISECOND;

    struct Rig {
        session: CaptureRecordSession,
        events: Arc<EventLog>,
        frames: Arc<FrameLog>,
        camera: Arc<FakeFeed>,
        mic: Arc<FakeFeed>,
    }

    fn rig_with(muxers: Arc<dyn MuxerProvider>, config: SessionConfig) -> Rig {
        let camera = FakeFeed::new();
        let mic = FakeFeed::new();
        let provider = FakeProvider::new()
            .with_camera("cam", Arc::clone(&camera))
            .with_microphone("mic", Arc::clone(&mic));
        let session = CaptureRecordSession::with_config(Arc::new(provider), muxers, config).unwrap();
        let events = EventLog::new();
        let frames = FrameLog::new();
        session.set_delegate(Arc::clone(&events) as Arc<dyn SessionDelegate>);
        session.set_preview_sink(Some(Arc::clone(&frames) as Arc<dyn PreviewSink>));
        session.set_audio_monitor(Some(Arc::clone(&frames) as Arc<dyn AudioMonitor>));
        Rig {
            session,
            events,
            frames,
            camera,
            mic,
        }
    }

    fn rig() -> Rig {
        rig_with(Arc::new(BuiltinMuxers), SessionConfig::default())
    }

    fn temp_path(ext: &str) -> PathBuf {
        std::env::temp_dir().join(format!("capture_record_session_{}.{}", uuid::Uuid::new_v4(), ext))
    }

    fn frame(ts: i64) -> ReadEvent {
        ReadEvent::Sample(Sample::video(ts, vec![0x80; 16]))
    }

    fn audio(ts: i64, samples: &[f32]) -> ReadEvent {
        ReadEvent::Sample(Sample::audio(ts, pcm::f32_to_bytes(samples)))
    }

    fn written_timestamps(path: &Path) -> Vec<i64> {
        read_sample_stream(path)
            .unwrap()
            .samples
            .iter()
            .map(|s| s.timestamp)
            .collect()
    }

    #[test]
    fn one_read_stays_outstanding_while_streaming() {
        let rig = rig();
        for ts in 0..3 {
            rig.camera.push(frame(ts * 1000));
        }
        rig.session.activate(&ActivationRequest::camera("cam")).unwrap();

        assert_eq!(rig.session.state(), SessionState::Streaming);
        assert_eq!(rig.frames.video_timestamps(), vec![0, 1000, 2000]);
        assert_eq!(rig.session.outstanding_requests(), 1);

        rig.camera.push(frame(3000));
        assert_eq!(rig.session.outstanding_requests(), 1);
        assert_eq!(rig.events.count(|e| *e == SessionEvent::StreamingStarted), 1);

        let diagnostics = rig.session.diagnostics();
        assert_eq!(diagnostics.video_samples, 4);
        assert_eq!(diagnostics.preview_frames, 4);
        assert_eq!(diagnostics.read_requests, 5);

        rig.session.deactivate();
        assert_eq!(rig.session.state(), SessionState::Inactive);
        assert_eq!(rig.session.outstanding_requests(), 0);
        assert!(rig.camera.is_closed());
        assert_eq!(rig.events.count(|e| *e == SessionEvent::StreamingStopped), 1);
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let rig = rig();
        let path = temp_path("crs");
        rig.session.activate(&ActivationRequest::camera("cam")).unwrap();
        assert!(!rig.session.pause_recording());
        assert!(!rig.session.resume_recording());

        rig.session.start_recording(&path, &RecordingSettings::default()).unwrap();
        assert!(!rig.session.resume_recording());
        assert!(rig.session.pause_recording());
        assert!(!rig.session.pause_recording());
        assert_eq!(rig.session.state(), SessionState::Paused);
        assert!(rig.session.resume_recording());
        assert!(!rig.session.resume_recording());
        assert_eq!(rig.session.state(), SessionState::Recording);

        assert_eq!(rig.events.count(|e| *e == SessionEvent::State(SessionState::Paused)), 1);

        rig.session.deactivate();
        fs::remove_file(&path).ok();
    }

    #[test]
    fn paused_time_is_cut_from_the_recording() {
        let rig = rig();
        let path = temp_path("crs");
        rig.session.activate(&ActivationRequest::camera("cam")).unwrap();
        rig.session.start_recording(&path, &RecordingSettings::default()).unwrap();

        rig.camera.push(frame(1000));
        rig.camera.push(frame(3000));
        rig.camera.push(frame(5000));
        assert!(rig.session.pause_recording());
        rig.camera.push(frame(6000));
        rig.camera.push(frame(7000));
        assert!(rig.session.resume_recording());
        rig.camera.push(frame(7100));

        // preview keeps running while paused
        assert_eq!(rig.frames.video_timestamps().len(), 6);

        rig.session.deactivate();
        assert_eq!(written_timestamps(&path), vec![0, 2000, 4000, 4100]);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn output_timestamps_never_decrease() {
        let rig = rig();
        let path = temp_path("crs");
        rig.session.activate(&ActivationRequest::camera("cam")).unwrap();
        rig.session.start_recording(&path, &RecordingSettings::default()).unwrap();

        rig.camera.push(frame(10_000));
        rig.camera.push(frame(20_000));
        rig.camera.push(frame(15_000));
        rig.camera.push(frame(5_000));
        rig.camera.push(frame(30_000));

        rig.session.deactivate();
        assert_eq!(written_timestamps(&path), vec![0, 10_000, 10_000, 10_000, 20_000]);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn volume_and_mute_scale_recorded_audio() {
        let rig = rig();
        let path = temp_path("crs");
        rig.session.activate(&ActivationRequest::microphone("mic")).unwrap();
        let settings = RecordingSettings::audio_only(ContainerFormat::SampleStream, CodecId::PCM_F32LE);
        rig.session.start_recording(&path, &settings).unwrap();

        rig.session.set_volume(0.5);
        rig.mic.push(audio(0, &[0.8, -0.4, 0.2, 0.6]));
        assert_abs_diff_eq!(rig.session.audio_levels().peak, 0.4, epsilon = 1e-6);

        rig.session.set_muted(true);
        rig.mic.push(audio(1000, &[0.8, -0.4, 0.2, 0.6]));
        assert_eq!(rig.session.audio_levels().peak, 0.0);

        // the monitor hears the microphone before gain
        let monitored = rig.frames.audio_samples();
        assert_eq!(monitored.len(), 2);
        let heard = pcm::to_f32_samples(monitored[1].payload(), AudioSampleFormat::F32);
        assert_abs_diff_eq!(heard[0], 0.8, epsilon = 1e-6);

        rig.session.deactivate();
        let file = read_sample_stream(&path).unwrap();
        assert_eq!(file.samples.len(), 2);

        let half = pcm::to_f32_samples(&file.samples[0].payload, AudioSampleFormat::F32);
        for (got, want) in half.iter().zip([0.4f32, -0.2, 0.1, 0.3]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-6);
        }
        let muted = pcm::to_f32_samples(&file.samples[1].payload, AudioSampleFormat::F32);
        assert!(muted.iter().all(|s| *s == 0.0));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn volume_is_clamped() {
        let rig = rig();
        rig.session.set_volume(3.0);
        assert_eq!(rig.session.volume(), 1.0);
        rig.session.set_volume(-1.0);
        assert_eq!(rig.session.volume(), 0.0);
        rig.session.set_volume(f32::NAN);
        assert_eq!(rig.session.volume(), 0.0);
        rig.session.set_muted(true);
        assert!(rig.session.is_muted());
    }

    #[test]
    fn failed_write_drops_the_sample_and_recording_continues() {
        let config = SessionConfig {
            duration_update_interval: Duration::from_millis(5),
        };
        let rig = rig_with(Arc::new(FlakyMuxers::failing_writes(&[1])), config);
        let path = temp_path("crs");
        rig.session.activate(&ActivationRequest::camera("cam")).unwrap();
        rig.session.start_recording(&path, &RecordingSettings::default()).unwrap();

        rig.camera.push(frame(0));
        rig.camera.push(frame(100 * MS));
        assert_eq!(rig.session.state(), SessionState::Recording);
        rig.camera.push(frame(200 * MS));
        assert_eq!(rig.session.state(), SessionState::Recording);
        assert_eq!(rig.session.duration_ms(), 200);
        assert!(rig.events.wait_until(WAIT, |events| events.contains(&SessionEvent::Duration(200))));

        let diagnostics = rig.session.diagnostics();
        assert_eq!(diagnostics.samples_written, 2);
        assert_eq!(diagnostics.samples_dropped, 1);

        rig.session.deactivate();
        assert_eq!(written_timestamps(&path), vec![0, 200 * MS]);
        let stopped = rig.events.recordings_stopped();
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].as_ref().map(|r| r.samples_dropped), Some(1));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn deactivate_blocks_until_the_recording_is_finalized() {
        let rig = rig_with(
            Arc::new(FlakyMuxers::slow_finalize(Duration::from_millis(50))),
            SessionConfig::default(),
        );
        let path = temp_path("crs");
        rig.session.activate(&ActivationRequest::camera("cam")).unwrap();
        rig.session.start_recording(&path, &RecordingSettings::default()).unwrap();
        for i in 0..3 {
            rig.camera.push(frame(i * 333_333));
        }

        rig.session.deactivate();

        let stopped = rig.events.recordings_stopped();
        assert_eq!(stopped.len(), 1);
        let result = stopped[0].clone().unwrap();
        assert_eq!(result.samples_written, 3);
        assert_eq!(rig.session.last_recording(), Some(result));

        let file = read_sample_stream(&path).unwrap();
        assert_eq!(file.samples.len(), 3);

        // finalize completes before the session reports inactive
        let events = rig.events.events();
        let stopped_at = events
            .iter()
            .position(|e| matches!(e, SessionEvent::RecordingStopped(_)))
            .unwrap();
        let inactive_at = events
            .iter()
            .rposition(|e| *e == SessionEvent::State(SessionState::Inactive))
            .unwrap();
        assert!(stopped_at < inactive_at);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn camera_only_recording_end_to_end() {
        let rig = rig();
        let path = temp_path("crs");
        rig.session.activate(&ActivationRequest::camera("cam")).unwrap();
        let settings = RecordingSettings {
            write_metadata: true,
            ..Default::default()
        };
        rig.session.start_recording(&path, &settings).unwrap();
        assert_eq!(rig.session.state(), SessionState::Recording);

        rig.camera.push(frame(50_000));
        rig.camera.push(frame(383_333));
        rig.session.stop_recording();
        assert_eq!(rig.session.state(), SessionState::Streaming);
        assert!(rig.session.wait_for_recording_stopped(WAIT));
        assert!(!rig.session.is_finalizing());

        // streaming goes on after the recording
        rig.camera.push(frame(716_666));
        assert_eq!(rig.frames.video_timestamps().len(), 3);

        let file = read_sample_stream(&path).unwrap();
        assert_eq!(file.streams.len(), 1);
        assert_eq!(file.stream_index(StreamTag::Audio), None);
        assert_eq!(file.samples.len(), 2);

        let result = rig.session.last_recording().unwrap();
        assert!(result.metadata.has_video());
        assert!(!result.metadata.has_audio());
        assert!(metadata::metadata_path(&path).exists());

        rig.session.deactivate();
        assert_eq!(rig.events.count(|e| *e == SessionEvent::RecordingStarted), 1);
        assert_eq!(rig.events.recordings_stopped().len(), 1);

        fs::remove_file(metadata::metadata_path(&path)).ok();
        fs::remove_file(&path).ok();
    }

    #[test]
    fn streaming_error_force_stops_the_recording() {
        let rig = rig();
        let path = temp_path("crs");
        rig.session.activate(&ActivationRequest::new("cam", "mic")).unwrap();
        rig.session.start_recording(&path, &RecordingSettings::default()).unwrap();
        rig.camera.push(frame(0));

        let error = CaptureError::streaming(-7, "camera unplugged");
        rig.camera.push(ReadEvent::Error(error.clone()));
        assert_eq!(rig.session.state(), SessionState::Inactive);
        assert!(rig.camera.is_closed());
        assert!(rig.mic.is_closed());
        assert!(rig.session.wait_for_recording_stopped(WAIT));

        assert_eq!(rig.events.count(|e| *e == SessionEvent::StreamingError(error.clone())), 1);
        assert_eq!(rig.events.recordings_stopped().len(), 1);
        assert_eq!(read_sample_stream(&path).unwrap().samples.len(), 1);

        // the session can be activated again
        rig.session.activate(&ActivationRequest::camera("cam")).unwrap();
        assert_eq!(rig.session.state(), SessionState::Streaming);
        rig.session.deactivate();
        fs::remove_file(&path).ok();
    }

    #[test]
    fn dropping_the_session_after_a_streaming_error_waits_for_finalize() {
        let rig = rig_with(
            Arc::new(FlakyMuxers::slow_finalize(Duration::from_millis(300))),
            SessionConfig::default(),
        );
        let path = temp_path("crs");
        rig.session.activate(&ActivationRequest::camera("cam")).unwrap();
        rig.session.start_recording(&path, &RecordingSettings::default()).unwrap();
        rig.camera.push(frame(0));
        rig.camera.push(ReadEvent::Error(CaptureError::streaming(-1, "device lost")));
        assert_eq!(rig.session.state(), SessionState::Inactive);
        assert!(rig.session.is_finalizing());

        let Rig { session, events, .. } = rig;
        drop(session);
        assert_eq!(events.recordings_stopped().len(), 1);
        assert_eq!(read_sample_stream(&path).unwrap().samples.len(), 1);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn deactivate_during_activation_cancels_it() {
        let camera = FakeFeed::new();
        let provider = FakeProvider::new()
            .with_camera("cam", Arc::clone(&camera))
            .slow_open(Duration::from_millis(200));
        let session = CaptureRecordSession::new(Arc::new(provider));
        let events = EventLog::new();
        session.set_delegate(Arc::clone(&events) as Arc<dyn SessionDelegate>);

        thread::scope(|scope| {
            let activation = scope.spawn(|| session.activate(&ActivationRequest::camera("cam")));
            let deadline = Instant::now() + WAIT;
            while session.state() != SessionState::Activating && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            session.deactivate();
            assert!(matches!(activation.join().unwrap(), Err(CaptureError::InvalidState(_))));
        });

        assert_eq!(session.state(), SessionState::Inactive);
        assert!(camera.is_closed());
        assert!(events.events().is_empty());

        // a later activation is not affected
        session.activate(&ActivationRequest::camera("cam")).unwrap();
        assert_eq!(session.state(), SessionState::Streaming);
        session.deactivate();
    }

    #[test]
    fn stop_recording_does_not_wait_on_a_write_with_the_state_locked() {
        let rig = rig_with(
            Arc::new(FlakyMuxers::slow_writes(Duration::from_millis(500))),
            SessionConfig::default(),
        );
        let path = temp_path("crs");
        rig.session.activate(&ActivationRequest::camera("cam")).unwrap();
        rig.session.start_recording(&path, &RecordingSettings::default()).unwrap();

        thread::scope(|scope| {
            scope.spawn(|| rig.camera.push(frame(0)));
            thread::sleep(Duration::from_millis(50));
            scope.spawn(|| rig.session.stop_recording());
            thread::sleep(Duration::from_millis(50));

            let started = Instant::now();
            assert_eq!(rig.session.state(), SessionState::Streaming);
            assert!(started.elapsed() < Duration::from_millis(250));
        });

        rig.session.deactivate();
        assert_eq!(rig.events.recordings_stopped().len(), 1);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn end_of_stream_stops_streaming() {
        let rig = rig();
        rig.session.activate(&ActivationRequest::camera("cam")).unwrap();
        rig.camera.push(frame(0));
        rig.camera.push(ReadEvent::EndOfStream);

        assert_eq!(rig.session.state(), SessionState::Inactive);
        assert_eq!(rig.session.outstanding_requests(), 0);
        assert_eq!(rig.events.count(|e| *e == SessionEvent::StreamingStopped), 1);

        rig.session.deactivate();
        assert_eq!(rig.events.count(|e| *e == SessionEvent::StreamingStopped), 1);
    }

    #[test]
    fn activation_errors_are_returned_synchronously() {
        let camera = FakeFeed::new();
        let provider = FakeProvider::new()
            .with_camera("cam", Arc::clone(&camera))
            .deny_microphone();
        let session = CaptureRecordSession::new(Arc::new(provider));
        let events = EventLog::new();
        session.set_delegate(Arc::clone(&events) as Arc<dyn SessionDelegate>);

        assert_eq!(
            session.activate(&ActivationRequest::new("cam", "mic")),
            Err(CaptureError::PermissionDenied)
        );
        assert_eq!(session.state(), SessionState::Inactive);
        assert!(camera.is_closed());

        assert!(matches!(
            session.activate(&ActivationRequest::camera("missing")),
            Err(CaptureError::DeviceNotAvailable(_))
        ));
        assert!(matches!(
            session.activate(&ActivationRequest::new("", "")),
            Err(CaptureError::InvalidArgument(_))
        ));
        assert!(events.events().is_empty());

        session.activate(&ActivationRequest::camera("cam")).unwrap();
        assert!(matches!(
            session.activate(&ActivationRequest::camera("cam")),
            Err(CaptureError::InvalidState(_))
        ));
    }

    #[test]
    fn start_recording_errors_leave_the_session_streaming() {
        let rig = rig();
        let path = temp_path("crs");
        assert!(matches!(
            rig.session.start_recording(&path, &RecordingSettings::default()),
            Err(CaptureError::InvalidState(_))
        ));

        rig.session.activate(&ActivationRequest::camera("cam")).unwrap();
        let missing_dir = std::env::temp_dir()
            .join(format!("capture_record_missing_{}", uuid::Uuid::new_v4()))
            .join("out.crs");
        assert!(matches!(
            rig.session.start_recording(&missing_dir, &RecordingSettings::default()),
            Err(CaptureError::LocationNotWritable(_))
        ));
        let wav = RecordingSettings::audio_only(ContainerFormat::Wav, CodecId::PCM_S16LE);
        assert!(matches!(
            rig.session.start_recording(&path, &wav),
            Err(CaptureError::FormatNotSupported(_))
        ));
        assert_eq!(rig.session.state(), SessionState::Streaming);

        // stop without a recording is a no-op
        rig.session.stop_recording();
        assert_eq!(rig.session.state(), SessionState::Streaming);
        assert!(rig.events.recordings_stopped().is_empty());
    }

    #[test]
    fn unwritable_output_stops_the_recording() {
        let rig = rig_with(Arc::new(FlakyMuxers::unwritable_after(1)), SessionConfig::default());
        let path = temp_path("crs");
        rig.session.activate(&ActivationRequest::camera("cam")).unwrap();
        rig.session.start_recording(&path, &RecordingSettings::default()).unwrap();

        rig.camera.push(frame(0));
        rig.camera.push(frame(1000));
        assert_eq!(rig.session.state(), SessionState::Streaming);
        assert!(rig.session.wait_for_recording_stopped(WAIT));
        assert_eq!(
            rig.events.count(|e| *e == SessionEvent::RecordingError(CaptureError::NotWritable)),
            1
        );
        assert_eq!(rig.events.recordings_stopped().len(), 1);

        rig.camera.push(frame(2000));
        assert_eq!(rig.frames.video_timestamps().len(), 3);
        rig.session.deactivate();
        fs::remove_file(&path).ok();
    }

    #[test]
    fn duration_is_reported_only_when_it_changes() {
        let config = SessionConfig {
            duration_update_interval: Duration::from_millis(5),
        };
        let rig = rig_with(Arc::new(BuiltinMuxers), config);
        let path = temp_path("crs");
        rig.session.activate(&ActivationRequest::camera("cam")).unwrap();
        rig.session.start_recording(&path, &RecordingSettings::default()).unwrap();
        assert_eq!(rig.events.durations(), vec![0]);

        rig.camera.push(frame(10 * MS));
        rig.camera.push(frame(110 * MS));
        assert!(rig.events.wait_until(WAIT, |events| events.contains(&SessionEvent::Duration(100))));
        assert_eq!(rig.session.duration_ms(), 100);

        thread::sleep(Duration::from_millis(40));
        assert_eq!(rig.events.durations(), vec![0, 100]);

        rig.session.stop_recording();
        assert_eq!(rig.session.duration_ms(), 0);
        rig.session.deactivate();
        fs::remove_file(&path).ok();
    }

    #[test]
    fn new_recording_waits_for_the_previous_finalize() {
        let rig = rig_with(
            Arc::new(FlakyMuxers::slow_finalize(Duration::from_millis(300))),
            SessionConfig::default(),
        );
        let first = temp_path("crs");
        let second = temp_path("crs");
        rig.session.activate(&ActivationRequest::camera("cam")).unwrap();
        rig.session.start_recording(&first, &RecordingSettings::default()).unwrap();
        rig.camera.push(frame(0));
        rig.session.stop_recording();

        assert!(rig.session.is_finalizing());
        assert!(matches!(
            rig.session.start_recording(&second, &RecordingSettings::default()),
            Err(CaptureError::InvalidState(_))
        ));

        assert!(rig.session.wait_for_recording_stopped(WAIT));
        rig.session.start_recording(&second, &RecordingSettings::default()).unwrap();
        rig.camera.push(frame(1000));
        rig.session.deactivate();

        assert_eq!(written_timestamps(&second), vec![0]);
        assert_eq!(rig.events.recordings_stopped().len(), 2);
        fs::remove_file(&first).ok();
        fs::remove_file(&second).ok();
    }

    #[test]
    fn audio_and_video_are_recorded_together() {
        let rig = rig();
        let path = temp_path("crs");
        rig.session.activate(&ActivationRequest::new("cam", "mic")).unwrap();
        rig.session.start_recording(&path, &RecordingSettings::default()).unwrap();

        rig.camera.push(frame(1000));
        rig.mic.push(audio(1500, &[0.5, 0.5]));
        rig.camera.push(frame(2000));

        rig.session.deactivate();
        let file = read_sample_stream(&path).unwrap();
        let video = file.stream_index(StreamTag::Video).unwrap();
        let audio_index = file.stream_index(StreamTag::Audio).unwrap();
        let video_ts: Vec<i64> = file.samples_of(video).map(|s| s.timestamp).collect();
        let audio_ts: Vec<i64> = file.samples_of(audio_index).map(|s| s.timestamp).collect();
        assert_eq!(video_ts, vec![0, 1000]);
        assert_eq!(audio_ts, vec![500]);
        // pcm_s16le: one stereo frame is 4 bytes
        assert_eq!(file.samples_of(audio_index).next().unwrap().payload.len(), 4);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn dropping_the_session_finalizes_the_recording() {
        let rig = rig();
        let path = temp_path("crs");
        rig.session.activate(&ActivationRequest::camera("cam")).unwrap();
        rig.session.start_recording(&path, &RecordingSettings::default()).unwrap();
        rig.camera.push(frame(0));

        let Rig {
            session, events, camera, ..
        } = rig;
        drop(session);

        assert_eq!(events.recordings_stopped().len(), 1);
        assert!(camera.is_closed());
        assert_eq!(written_timestamps(&path), vec![0]);
        fs::remove_file(&path).ok();
    }
}
