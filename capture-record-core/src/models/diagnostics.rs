/// Real-time audio level metering of the captured microphone (0.0–1.0).
///
/// Measured after volume/mute so it reflects what is being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioLevels {
    pub rms: f32,
    pub peak: f32,
}

/// Counters for debugging capture sessions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionDiagnostics {
    pub video_samples: u64,
    pub audio_samples: u64,
    /// Video samples handed to the preview sink.
    pub preview_frames: u64,
    /// Samples handed to the writer.
    pub samples_written: u64,
    /// Samples whose write failed and were dropped.
    pub samples_dropped: u64,
    pub bytes_written: u64,
    /// Read requests issued to devices by the pull loop.
    pub read_requests: u64,
    pub video_format: String,
    pub audio_format: String,
}
