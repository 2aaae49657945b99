//! WASAPI microphone device source.
//!
//! Captures from a WASAPI capture endpoint in shared mode and serves the
//! reader's asynchronous read requests. Audio arriving while no request is
//! pending is accumulated and handed out as one sample on the next request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use windows::core::*;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use capture_record_core::models::error::CaptureError;
use capture_record_core::models::format::{AudioFormat, AudioSampleFormat, DeviceKind, MediaFormat};
use capture_record_core::models::sample::Sample;
use capture_record_core::processing::pcm;
use capture_record_core::processing::ring_buffer::RingBuffer;
use capture_record_core::reader::{ReadCompletion, ReadEvent};
use capture_record_core::traits::device_source::{DeviceDescriptor, DeviceSource};

/// Endpoint id that selects the default console capture device.
pub const DEFAULT_MICROPHONE_ID: &str = "default";

/// Seconds of audio kept while no read request is pending.
const BUFFER_SECONDS: usize = 2;

const E_ACCESSDENIED_CODE: i32 = -2147024891;

/// State shared between the device and its capture thread.
struct CaptureShared {
    pending: Option<ReadCompletion>,
    buffered: RingBuffer<f32>,
    /// Capture timestamp of the oldest buffered frame.
    buffered_timestamp: Option<i64>,
    error: Option<CaptureError>,
}

impl CaptureShared {
    fn take_buffered(&mut self, format: &AudioFormat, fallback_timestamp: i64, extra: &[f32]) -> Sample {
        let timestamp = self.buffered_timestamp.take().unwrap_or(fallback_timestamp);
        let mut samples = self.buffered.drain();
        samples.extend_from_slice(extra);
        build_sample(format, timestamp, &samples)
    }

    fn buffer(&mut self, format: &AudioFormat, timestamp: i64, samples: &[f32]) {
        if self.buffered.is_empty() {
            self.buffered_timestamp = Some(timestamp);
        }
        let dropped_before = self.buffered.dropped();
        self.buffered.write(samples);
        let dropped = (self.buffered.dropped() - dropped_before) as usize;
        if dropped > 0 {
            let frames = dropped / format.channels.max(1) as usize;
            if let Some(ts) = self.buffered_timestamp.as_mut() {
                *ts += format.frames_to_ticks(frames);
            }
            log::warn!("Mic buffer overflow, dropped {} frames", frames);
        }
    }
}

fn build_sample(format: &AudioFormat, timestamp: i64, samples: &[f32]) -> Sample {
    let frames = samples.len() / format.channels.max(1) as usize;
    Sample::audio(timestamp, pcm::f32_to_bytes(samples)).with_duration(format.frames_to_ticks(frames))
}

/// Hand a captured packet to the pending request, or buffer it.
fn deliver(shared: &Mutex<CaptureShared>, format: &AudioFormat, timestamp: i64, samples: &[f32]) {
    let ready = {
        let mut state = shared.lock();
        match state.pending.take() {
            Some(completion) => {
                let sample = state.take_buffered(format, timestamp, samples);
                Some((completion, sample))
            }
            None => {
                state.buffer(format, timestamp, samples);
                None
            }
        }
    };
    if let Some((completion, sample)) = ready {
        completion.complete(ReadEvent::Sample(sample));
    }
}

/// Report a capture failure on the pending request, or on the next one.
fn fail(shared: &Mutex<CaptureShared>, error: CaptureError) {
    let pending = {
        let mut state = shared.lock();
        let pending = state.pending.take();
        if pending.is_none() {
            state.error = Some(error.clone());
        }
        pending
    };
    if let Some(completion) = pending {
        completion.complete(ReadEvent::Error(error));
    }
}

/// WASAPI microphone as a [`DeviceSource`].
///
/// The native format is the endpoint's shared-mode mix format (float). The
/// capture thread starts with the first read and timestamps packets with
/// their QPC position (100 ns ticks).
pub struct WasapiMicSource {
    descriptor: DeviceDescriptor,
    endpoint_id: Option<String>,
    native: AudioFormat,
    format: Option<AudioFormat>,
    shared: Arc<Mutex<CaptureShared>>,
    running: Arc<AtomicBool>,
    capture_handle: Option<thread::JoinHandle<()>>,
    open: bool,
}

impl WasapiMicSource {
    /// Open the endpoint `id`, or the default microphone for
    /// [`DEFAULT_MICROPHONE_ID`].
    ///
    /// Probes the endpoint's mix format; access denied by the privacy
    /// settings fails with `PermissionDenied`.
    pub fn open(id: &str) -> Result<Self, CaptureError> {
        let endpoint_id = (id != DEFAULT_MICROPHONE_ID).then(|| id.to_string());
        let native = unsafe { probe_mix_format(endpoint_id.as_deref())? };
        log::info!("Opened microphone {} ({:?})", id, native);

        let capacity = native.sample_rate as usize * native.channels as usize * BUFFER_SECONDS;
        Ok(Self {
            descriptor: DeviceDescriptor::new(id, "Microphone", DeviceKind::Microphone),
            endpoint_id,
            native,
            format: None,
            shared: Arc::new(Mutex::new(CaptureShared {
                pending: None,
                buffered: RingBuffer::new(capacity),
                buffered_timestamp: None,
                error: None,
            })),
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: None,
            open: true,
        })
    }

    fn ensure_started(&mut self, format: AudioFormat) -> Result<(), CaptureError> {
        if self.capture_handle.is_some() {
            return Ok(());
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let shared = Arc::clone(&self.shared);
        let endpoint_id = self.endpoint_id.clone();

        let handle = thread::Builder::new()
            .name("wasapi-mic-source".into())
            .spawn(move || {
                if let Err(e) = unsafe { mic_capture_loop(&running, endpoint_id.as_deref(), &format, &shared) } {
                    log::error!("Mic capture error: {}", e);
                    fail(&shared, e);
                }
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn mic thread: {}", e)))?;

        self.capture_handle = Some(handle);
        Ok(())
    }
}

impl DeviceSource for WasapiMicSource {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn native_formats(&self) -> Vec<MediaFormat> {
        vec![MediaFormat::Audio(self.native)]
    }

    fn set_format(&mut self, format: &MediaFormat) -> Result<(), CaptureError> {
        match format {
            MediaFormat::Audio(audio) if *audio == self.native => {
                self.format = Some(*audio);
                Ok(())
            }
            other => Err(CaptureError::FormatNotSupported(format!(
                "shared-mode capture only delivers the mix format, got {:?}",
                other
            ))),
        }
    }

    fn format(&self) -> Option<MediaFormat> {
        self.format.map(MediaFormat::Audio)
    }

    fn read_sample(&mut self, completion: ReadCompletion) -> Result<(), CaptureError> {
        if !self.open {
            return Err(CaptureError::DeviceNotAvailable(self.descriptor.id.clone()));
        }
        let format = self
            .format
            .ok_or_else(|| CaptureError::InvalidState("microphone format not set".into()))?;
        self.ensure_started(format)?;

        let ready = {
            let mut state = self.shared.lock();
            if let Some(error) = state.error.take() {
                Some((completion, ReadEvent::Error(error)))
            } else if !state.buffered.is_empty() {
                let sample = state.take_buffered(&format, 0, &[]);
                Some((completion, ReadEvent::Sample(sample)))
            } else if state.pending.is_some() {
                return Err(CaptureError::InvalidState("a read is already pending".into()));
            } else {
                state.pending = Some(completion);
                None
            }
        };
        if let Some((completion, event)) = ready {
            completion.complete(event);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.running.store(false, Ordering::SeqCst);
        let pending = self.shared.lock().pending.take();
        drop(pending);

        if let Some(handle) = self.capture_handle.take() {
            // Closing from a completion delivered on the capture thread itself.
            if handle.thread().id() == thread::current().id() {
                return;
            }
            let _ = handle.join();
        }
        log::info!("Closed microphone {}", self.descriptor.id);
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl Drop for WasapiMicSource {
    fn drop(&mut self) {
        if self.open {
            self.close();
        }
    }
}

fn streaming_error(context: &str, e: Error) -> CaptureError {
    CaptureError::streaming(e.code().0, format!("{} failed: {}", context, e))
}

unsafe fn capture_device(endpoint_id: Option<&str>) -> Result<IMMDevice, CaptureError> {
    let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
        .map_err(|e| CaptureError::Unknown(format!("failed to create enumerator: {}", e)))?;

    let device = match endpoint_id {
        Some(id) => {
            let wide_id: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
            enumerator.GetDevice(PCWSTR(wide_id.as_ptr()))
        }
        None => enumerator.GetDefaultAudioEndpoint(eCapture, eConsole),
    };
    device.map_err(|_| CaptureError::DeviceNotAvailable(endpoint_id.unwrap_or(DEFAULT_MICROPHONE_ID).to_string()))
}

unsafe fn activate_client(device: &IMMDevice) -> Result<IAudioClient, CaptureError> {
    device.Activate(CLSCTX_ALL, None).map_err(|e| {
        if e.code().0 == E_ACCESSDENIED_CODE {
            CaptureError::PermissionDenied
        } else {
            CaptureError::DeviceNotAvailable(format!("Activate failed: {}", e))
        }
    })
}

/// Read the endpoint's shared-mode mix format on the calling thread.
unsafe fn probe_mix_format(endpoint_id: Option<&str>) -> Result<AudioFormat, CaptureError> {
    let _com_guard = ComGuard::init();

    let device = capture_device(endpoint_id)?;
    let audio_client = activate_client(&device)?;
    let mix_format_ptr = audio_client
        .GetMixFormat()
        .map_err(|e| CaptureError::FormatNotSupported(format!("GetMixFormat failed: {}", e)))?;

    let mix_format = &*mix_format_ptr;
    let format = AudioFormat::new(mix_format.nChannels, mix_format.nSamplesPerSec, AudioSampleFormat::F32);
    CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));
    Ok(format)
}

/// Capture loop running on the `wasapi-mic-source` thread.
///
/// Sequence:
/// 1. CoInitializeEx (MTA)
/// 2. Get capture device (default or by ID) and activate IAudioClient
/// 3. Initialize in shared mode with the mix format
/// 4. Get IAudioCaptureClient service
/// 5. Register with MMCSS for real-time priority
/// 6. Start capture, poll for packets until `running` is cleared
unsafe fn mic_capture_loop(
    running: &AtomicBool,
    endpoint_id: Option<&str>,
    format: &AudioFormat,
    shared: &Mutex<CaptureShared>,
) -> Result<(), CaptureError> {
    let _com_guard = ComGuard::init();

    let device = capture_device(endpoint_id)?;
    let audio_client = activate_client(&device)?;

    let mix_format_ptr = audio_client
        .GetMixFormat()
        .map_err(|e| streaming_error("GetMixFormat", e))?;
    let mix_format = &*mix_format_ptr;
    if mix_format.nChannels != format.channels || mix_format.nSamplesPerSec != format.sample_rate {
        CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));
        return Err(CaptureError::streaming(-1, "endpoint mix format changed"));
    }

    // 100ms in 100-nanosecond units
    let buffer_duration = 1_000_000;
    let initialized = audio_client.Initialize(
        AUDCLNT_SHAREMODE_SHARED,
        AUDCLNT_STREAMFLAGS_NOPERSIST,
        buffer_duration,
        0,
        mix_format,
        None,
    );
    CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));
    initialized.map_err(|e| streaming_error("IAudioClient::Initialize", e))?;

    let capture_client: IAudioCaptureClient = audio_client
        .GetService()
        .map_err(|e| streaming_error("GetService", e))?;

    let mut task_index: u32 = 0;
    let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
    let _mmcss_handle = AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index);

    audio_client
        .Start()
        .map_err(|e| streaming_error("IAudioClient::Start", e))?;

    let channels = format.channels as usize;
    let result = (|| -> Result<(), CaptureError> {
        while running.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(10));

            let mut packet_length = capture_client
                .GetNextPacketSize()
                .map_err(|e| streaming_error("GetNextPacketSize", e))?;

            while packet_length > 0 {
                let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                let mut num_frames: u32 = 0;
                let mut flags: u32 = 0;
                let mut qpc_position: u64 = 0;

                capture_client
                    .GetBuffer(
                        &mut buffer_ptr,
                        &mut num_frames,
                        &mut flags,
                        None,
                        Some(&mut qpc_position as *mut u64),
                    )
                    .map_err(|e| streaming_error("GetBuffer", e))?;

                if num_frames > 0 && !buffer_ptr.is_null() {
                    let total_samples = num_frames as usize * channels;
                    let timestamp = qpc_position as i64;

                    if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 {
                        let silence = vec![0.0f32; total_samples];
                        deliver(shared, format, timestamp, &silence);
                    } else {
                        // Shared mode delivers the float mix format
                        let samples = std::slice::from_raw_parts(buffer_ptr as *const f32, total_samples);
                        deliver(shared, format, timestamp, samples);
                    }
                }

                capture_client
                    .ReleaseBuffer(num_frames)
                    .map_err(|e| streaming_error("ReleaseBuffer", e))?;

                packet_length = capture_client
                    .GetNextPacketSize()
                    .map_err(|e| streaming_error("GetNextPacketSize", e))?;
            }
        }
        Ok(())
    })();

    let _ = audio_client.Stop();
    result
}

/// Initializes COM (MTA) on the current thread and uninitializes on drop.
///
/// A thread already in another apartment is left as it is.
pub(crate) struct ComGuard {
    initialized: bool,
}

impl ComGuard {
    pub(crate) unsafe fn init() -> Self {
        Self {
            initialized: CoInitializeEx(None, COINIT_MULTITHREADED).is_ok(),
        }
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}
