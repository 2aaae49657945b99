use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::format::VideoFormat;

/// Output container, as resolved by the caller's capability resolver.
///
/// The core treats this as an opaque identifier; a `MuxerProvider` decides
/// which containers it can actually write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerFormat {
    /// RIFF/WAVE, audio only.
    Wav,
    /// Chunked interleaved sample stream (`.crs`).
    SampleStream,
    /// Any other container, handled by a custom provider.
    Other(String),
}

impl ContainerFormat {
    pub fn extension(&self) -> &str {
        match self {
            Self::Wav => "wav",
            Self::SampleStream => "crs",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wav => f.write_str("wav"),
            Self::SampleStream => f.write_str("sample-stream"),
            Self::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Opaque codec identifier (e.g. `"pcm_s16le"`, `"raw"`, `"h264"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodecId(pub String);

impl CodecId {
    /// Uncompressed video frames, stored as captured.
    pub const RAW_VIDEO: &'static str = "raw";
    /// 16-bit signed little-endian PCM.
    pub const PCM_S16LE: &'static str = "pcm_s16le";
    /// 32-bit float little-endian PCM.
    pub const PCM_F32LE: &'static str = "pcm_f32le";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Settings for one recording.
///
/// `None` for a codec produces an audio-only or video-only file. Zero
/// width/height and a non-positive frame rate take the negotiated camera format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    pub container: ContainerFormat,
    pub video_codec: Option<CodecId>,
    /// Bits per second (0 = encoder default).
    pub video_bit_rate: u32,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub audio_codec: Option<CodecId>,
    /// Bits per second (0 = encoder default).
    pub audio_bit_rate: u32,
    /// Write a `.metadata.json` sidecar next to the recording.
    pub write_metadata: bool,
}

impl RecordingSettings {
    pub fn audio_only(container: ContainerFormat, codec: &str) -> Self {
        Self {
            container,
            video_codec: None,
            audio_codec: Some(CodecId::new(codec)),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.video_codec.is_none() && self.audio_codec.is_none() {
            return Err("at least one of video or audio codec must be set".into());
        }
        if self.frame_rate.is_nan() {
            return Err("frame rate must be a number".into());
        }
        if (self.width == 0) != (self.height == 0) {
            return Err(format!(
                "width and height must both be set or both be zero (got {}x{})",
                self.width, self.height
            ));
        }
        Ok(())
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            container: ContainerFormat::SampleStream,
            video_codec: Some(CodecId::new(CodecId::RAW_VIDEO)),
            video_bit_rate: 0,
            width: 0,
            height: 0,
            frame_rate: 0.0,
            audio_codec: Some(CodecId::new(CodecId::PCM_S16LE)),
            audio_bit_rate: 0,
            write_metadata: false,
        }
    }
}

/// Session-wide tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// How often the recording duration is polled and reported (default: 100 ms).
    pub duration_update_interval: Duration,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.duration_update_interval.is_zero() {
            return Err("duration update interval must be positive".into());
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_update_interval: Duration::from_millis(100),
        }
    }
}

/// Which devices to open on `activate`.
///
/// Empty ids count as absent; at least one device must be requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivationRequest {
    pub camera_id: Option<String>,
    pub microphone_id: Option<String>,
    pub video_format: Option<VideoFormat>,
}

impl ActivationRequest {
    pub fn new(camera_id: &str, microphone_id: &str) -> Self {
        Self {
            camera_id: non_empty(camera_id),
            microphone_id: non_empty(microphone_id),
            video_format: None,
        }
    }

    pub fn camera(id: &str) -> Self {
        Self::new(id, "")
    }

    pub fn microphone(id: &str) -> Self {
        Self::new("", id)
    }

    pub fn with_video_format(mut self, format: VideoFormat) -> Self {
        self.video_format = Some(format);
        self
    }

    pub fn camera_id(&self) -> Option<&str> {
        self.camera_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn microphone_id(&self) -> Option<&str> {
        self.microphone_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.camera_id().is_none() && self.microphone_id().is_none() {
            return Err("camera id and microphone id are both empty".into());
        }
        Ok(())
    }
}

fn non_empty(id: &str) -> Option<String> {
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}
