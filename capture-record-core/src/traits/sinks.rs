use crate::models::format::{AudioFormat, VideoFormat};
use crate::models::sample::Sample;

/// Live preview consumer for camera frames.
///
/// Receives every video sample in delivery order, whether or not a recording
/// is in progress. Called on the completion thread: must not block.
pub trait PreviewSink: Send + Sync {
    fn on_video_sample(&self, sample: &Sample, format: &VideoFormat);
}

/// Live monitor for microphone audio (e.g. a level meter or playback tap).
///
/// Receives every audio sample before volume is applied. Called on the
/// completion thread: must not block.
pub trait AudioMonitor: Send + Sync {
    fn on_audio_sample(&self, sample: &Sample, format: &AudioFormat);
}
