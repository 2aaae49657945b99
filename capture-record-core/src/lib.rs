//! # capture-record-core
//!
//! Platform-agnostic camera/microphone capture with live preview and
//! recording to a muxed file.
//!
//! Platform backends (Windows WASAPI microphone) implement the `DeviceSource`
//! and `DeviceProvider` traits and plug into the generic
//! `CaptureRecordSession`.
//!
//! ## Architecture
//!
//! ```text
//! capture-record-core (this crate)
//! ├── traits/       ← DeviceSource, DeviceProvider, PreviewSink, AudioMonitor, SessionDelegate, MediaMuxer
//! ├── models/       ← Sample, formats, CaptureError, SessionState, RecordingSettings, RecordingResult
//! ├── processing/   ← format negotiation, PCM gain/levels, RingBuffer, WAV header
//! ├── reader/       ← AggregateReader (one-outstanding-read pull loop)
//! ├── writer/       ← EncodeSinkWriter, WAV and sample-stream muxers
//! ├── session/      ← CaptureRecordSession (state machine and orchestration)
//! └── storage/      ← checksum, metadata sidecar
//! ```

pub mod models;
pub mod processing;
pub mod reader;
pub mod session;
pub mod storage;
pub mod traits;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at crate root for convenience.
pub use models::config::{ActivationRequest, CodecId, ContainerFormat, RecordingSettings, SessionConfig};
pub use models::diagnostics::{AudioLevels, SessionDiagnostics};
pub use models::error::CaptureError;
pub use models::format::{
    AudioFormat, AudioSampleFormat, DeviceKind, MediaFormat, PixelFormat, StreamFormats, StreamTag, VideoFormat,
};
pub use models::recording_result::{RecordingMetadata, RecordingResult, RecordingTrack};
pub use models::sample::{Sample, TICKS_PER_MILLISECOND, TICKS_PER_SECOND};
pub use models::state::SessionState;
pub use processing::ring_buffer::RingBuffer;
pub use reader::{AggregateReader, Continuation, ReadCallback, ReadCompletion, ReadEvent};
pub use session::CaptureRecordSession;
pub use traits::device_source::{DeviceDescriptor, DeviceProvider, DeviceSource};
pub use traits::media_muxer::{MediaMuxer, MuxerProvider, OutputStream};
pub use traits::session_delegate::SessionDelegate;
pub use traits::sinks::{AudioMonitor, PreviewSink};
pub use writer::{BuiltinMuxers, EncodeSinkWriter};
