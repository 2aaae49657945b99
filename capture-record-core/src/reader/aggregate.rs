use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

use super::{Continuation, ReadCallback, ReadEvent};
use crate::models::config::ActivationRequest;
use crate::models::error::CaptureError;
use crate::models::format::{AudioFormat, DeviceKind, MediaFormat, StreamFormats, StreamTag, VideoFormat};
use crate::processing::negotiate::{negotiate_audio_format, negotiate_video_format};
use crate::traits::device_source::{DeviceProvider, DeviceSource};

/// Owns an opened device and closes it when dropped.
struct SourceHandle(Box<dyn DeviceSource>);

impl Deref for SourceHandle {
    type Target = dyn DeviceSource;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl DerefMut for SourceHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        if self.0.is_open() {
            self.0.close();
        }
    }
}

type SharedSource = Arc<Mutex<SourceHandle>>;

/// Per-device bookkeeping. A slot holds at most one completed read that has
/// not been delivered yet.
struct Slot {
    stream: StreamTag,
    source: SharedSource,
    armed: bool,
    ready: Option<(u64, ReadEvent)>,
    finished: bool,
}

impl Slot {
    fn new(stream: StreamTag, source: SourceHandle) -> Self {
        Self {
            stream,
            source: Arc::new(Mutex::new(source)),
            armed: false,
            ready: None,
            finished: false,
        }
    }

    fn can_arm(&self) -> bool {
        !self.armed && self.ready.is_none() && !self.finished
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Idle,
    Outstanding,
}

enum Step {
    Arm(usize, StreamTag, SharedSource),
    Deliver(StreamTag, ReadEvent),
    Done,
}

struct ReaderState {
    active: bool,
    started: bool,
    request: Request,
    /// Thread currently running the pull loop. Only that thread arms devices
    /// and invokes the callback.
    dispatcher: Option<ThreadId>,
    slots: Vec<Slot>,
    next_seq: u64,
}

impl ReaderState {
    fn next_step(&mut self) -> Step {
        if !self.active || self.request != Request::Outstanding {
            return Step::Done;
        }

        if let Some(index) = self.slots.iter().position(Slot::can_arm) {
            let slot = &mut self.slots[index];
            slot.armed = true;
            return Step::Arm(index, slot.stream, Arc::clone(&slot.source));
        }

        let oldest = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.ready.as_ref().map(|(seq, _)| (*seq, i)))
            .min();
        let Some((_, index)) = oldest else {
            return Step::Done;
        };

        let slot = &mut self.slots[index];
        match slot.ready.take() {
            Some((_, event)) => {
                if !event.is_sample() {
                    slot.finished = true;
                }
                self.request = Request::Idle;
                Step::Deliver(slot.stream, event)
            }
            None => Step::Done,
        }
    }

    fn store(&mut self, index: usize, event: ReadEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(slot) = self.slots.get_mut(index) {
            slot.armed = false;
            slot.ready = Some((seq, event));
        }
    }
}

struct ReaderShared {
    state: Mutex<ReaderState>,
    idle: Condvar,
    callback: Arc<dyn ReadCallback>,
    requests: AtomicU64,
    device_reads: AtomicU64,
}

impl ReaderShared {
    /// Run the pull loop until nothing is left to do. The caller must hold the
    /// dispatcher role.
    fn drive(self: &Arc<Self>) {
        loop {
            let step = {
                let mut state = self.state.lock();
                let step = state.next_step();
                if let Step::Done = step {
                    state.dispatcher = None;
                    self.idle.notify_all();
                    return;
                }
                step
            };

            match step {
                Step::Arm(index, stream, source) => {
                    self.device_reads.fetch_add(1, Ordering::Relaxed);
                    let completion = ReadCompletion {
                        reader: Arc::downgrade(self),
                        slot: index,
                        stream,
                        completed: false,
                    };
                    let result = source.lock().read_sample(completion);
                    if let Err(e) = result {
                        log::warn!("Read request on {:?} stream rejected: {}", stream, e);
                        self.state.lock().store(index, ReadEvent::Error(e));
                    }
                }
                Step::Deliver(stream, event) => {
                    log::trace!("Delivering {:?} completion", stream);
                    let next = self.callback.on_read_complete(stream, event);
                    let mut state = self.state.lock();
                    if next == Continuation::Continue && state.active {
                        state.request = Request::Outstanding;
                        self.requests.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Step::Done => return,
            }
        }
    }

    fn complete(self: &Arc<Self>, index: usize, event: ReadEvent) {
        {
            let mut state = self.state.lock();
            if index >= state.slots.len() {
                return;
            }
            if !state.active {
                state.slots[index].armed = false;
                return;
            }
            state.store(index, event);
            if state.dispatcher.is_some() {
                return;
            }
            state.dispatcher = Some(thread::current().id());
        }
        self.drive();
    }
}

/// Handed to a device with each read request. Must be completed exactly once.
///
/// Dropping it without completing reports an error for the stream, unless the
/// reader has already been shut down.
pub struct ReadCompletion {
    reader: Weak<ReaderShared>,
    slot: usize,
    stream: StreamTag,
    completed: bool,
}

impl ReadCompletion {
    pub fn stream(&self) -> StreamTag {
        self.stream
    }

    /// Whether the reader that issued this request is gone or shut down.
    pub fn is_cancelled(&self) -> bool {
        match self.reader.upgrade() {
            Some(shared) => !shared.state.lock().active,
            None => true,
        }
    }

    pub fn complete(mut self, event: ReadEvent) {
        self.completed = true;
        if let Some(shared) = self.reader.upgrade() {
            shared.complete(self.slot, event);
        }
    }
}

impl std::fmt::Debug for ReadCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadCompletion")
            .field("slot", &self.slot)
            .field("stream", &self.stream)
            .finish()
    }
}

impl Drop for ReadCompletion {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        if let Some(shared) = self.reader.upgrade() {
            let error = CaptureError::Unknown("read request dropped without completion".into());
            shared.complete(self.slot, ReadEvent::Error(error));
        }
    }
}

/// Camera and/or microphone behind one pull loop.
///
/// At most one read request is outstanding across all devices while active.
/// Devices are read ahead by at most one sample each; completions are
/// delivered oldest first. Dropping the reader shuts it down and closes every
/// device.
pub struct AggregateReader {
    shared: Arc<ReaderShared>,
    formats: StreamFormats,
}

impl AggregateReader {
    /// Open the requested devices and negotiate their formats.
    ///
    /// No read is issued until [`start`](Self::start). Any device opened before
    /// a failure is closed again.
    pub fn open(
        provider: &dyn DeviceProvider,
        request: &ActivationRequest,
        callback: Arc<dyn ReadCallback>,
    ) -> Result<Self, CaptureError> {
        request.validate().map_err(CaptureError::InvalidArgument)?;

        let mut formats = StreamFormats::default();
        let mut slots = Vec::with_capacity(2);

        if let Some(id) = request.camera_id() {
            let mut source = SourceHandle(provider.open(DeviceKind::Camera, id)?);
            let format = Self::prepare_video(&mut source, request.video_format.as_ref())?;
            formats.video = Some(format);
            slots.push(Slot::new(StreamTag::Video, source));
        }

        if let Some(id) = request.microphone_id() {
            let mut source = SourceHandle(provider.open(DeviceKind::Microphone, id)?);
            let format = Self::prepare_audio(&mut source)?;
            formats.audio = Some(format);
            slots.push(Slot::new(StreamTag::Audio, source));
        }

        log::info!(
            "Opened capture devices (video: {:?}, audio: {:?})",
            formats.video,
            formats.audio
        );

        Ok(Self {
            shared: Arc::new(ReaderShared {
                state: Mutex::new(ReaderState {
                    active: true,
                    started: false,
                    request: Request::Idle,
                    dispatcher: None,
                    slots,
                    next_seq: 0,
                }),
                idle: Condvar::new(),
                callback,
                requests: AtomicU64::new(0),
                device_reads: AtomicU64::new(0),
            }),
            formats,
        })
    }

    fn prepare_video(source: &mut SourceHandle, requested: Option<&VideoFormat>) -> Result<VideoFormat, CaptureError> {
        let native: Vec<VideoFormat> = source
            .native_formats()
            .iter()
            .filter_map(|f| f.as_video().copied())
            .collect();
        let format = negotiate_video_format(&native, requested).ok_or_else(|| {
            CaptureError::FormatNotSupported(format!("camera {} offers no usable video format", source.descriptor().id))
        })?;
        source.set_format(&MediaFormat::Video(format))?;
        Ok(format)
    }

    fn prepare_audio(source: &mut SourceHandle) -> Result<AudioFormat, CaptureError> {
        let native: Vec<AudioFormat> = source
            .native_formats()
            .iter()
            .filter_map(|f| f.as_audio().copied())
            .collect();
        let format = negotiate_audio_format(&native).ok_or_else(|| {
            CaptureError::FormatNotSupported(format!(
                "microphone {} offers no usable audio format",
                source.descriptor().id
            ))
        })?;
        source.set_format(&MediaFormat::Audio(format))?;
        Ok(format)
    }

    /// Issue the first read request.
    ///
    /// Completions that are already available are delivered on the calling
    /// thread before this returns. Calling it again has no effect.
    pub fn start(&self) {
        {
            let mut state = self.shared.state.lock();
            if !state.active || state.started {
                return;
            }
            state.started = true;
            state.request = Request::Outstanding;
            self.shared.requests.fetch_add(1, Ordering::Relaxed);
            if state.dispatcher.is_some() {
                return;
            }
            state.dispatcher = Some(thread::current().id());
        }
        self.shared.drive();
    }

    /// Stop issuing requests and close every device.
    ///
    /// Waits for a completion being delivered on another thread to return
    /// first. Idempotent.
    pub fn shutdown(&self) {
        let sources: Vec<SharedSource> = {
            let mut state = self.shared.state.lock();
            state.active = false;
            state.request = Request::Idle;
            let me = thread::current().id();
            while state.dispatcher.is_some() && state.dispatcher != Some(me) {
                self.shared.idle.wait(&mut state);
            }
            state.slots.drain(..).map(|slot| slot.source).collect()
        };
        if sources.is_empty() {
            return;
        }
        for source in &sources {
            source.lock().close();
        }
        log::info!("Closed {} capture device(s)", sources.len());
    }

    pub fn is_active(&self) -> bool {
        self.shared.state.lock().active
    }

    /// Read requests currently outstanding: 1 while the loop is running, 0
    /// once it stopped or while a completion is being handled.
    pub fn outstanding_requests(&self) -> usize {
        let state = self.shared.state.lock();
        usize::from(state.active && state.request == Request::Outstanding)
    }

    /// Read requests issued since start.
    pub fn requests_issued(&self) -> u64 {
        self.shared.requests.load(Ordering::Relaxed)
    }

    /// Reads issued to individual devices.
    pub fn device_reads(&self) -> u64 {
        self.shared.device_reads.load(Ordering::Relaxed)
    }

    pub fn formats(&self) -> StreamFormats {
        self.formats
    }
}

impl Drop for AggregateReader {
    fn drop(&mut self) {
        self.shutdown();
    }
}
