use serde::{Deserialize, Serialize};

/// Which of the two capture streams a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamTag {
    Audio,
    Video,
}

impl StreamTag {
    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video)
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio)
    }
}

/// Kind of physical capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Camera,
    Microphone,
}

impl DeviceKind {
    /// The stream this kind of device produces.
    pub fn stream(&self) -> StreamTag {
        match self {
            Self::Camera => StreamTag::Video,
            Self::Microphone => StreamTag::Audio,
        }
    }
}

/// Pixel layout of captured video frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Nv12,
    I420,
    Yuyv,
    Uyvy,
    Rgb24,
    Bgra32,
    Mjpeg,
    /// Layout the core does not understand. Never negotiated.
    Unknown,
}

impl PixelFormat {
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    pub(crate) fn wire_id(&self) -> u8 {
        match self {
            Self::Nv12 => 1,
            Self::I420 => 2,
            Self::Yuyv => 3,
            Self::Uyvy => 4,
            Self::Rgb24 => 5,
            Self::Bgra32 => 6,
            Self::Mjpeg => 7,
            Self::Unknown => 0,
        }
    }

    pub(crate) fn from_wire_id(id: u8) -> Self {
        match id {
            1 => Self::Nv12,
            2 => Self::I420,
            3 => Self::Yuyv,
            4 => Self::Uyvy,
            5 => Self::Rgb24,
            6 => Self::Bgra32,
            7 => Self::Mjpeg,
            _ => Self::Unknown,
        }
    }
}

/// Negotiated (or requested) camera format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    /// Frames per second.
    pub frame_rate: f64,
    pub pixel_format: PixelFormat,
}

impl VideoFormat {
    pub fn new(width: u32, height: u32, frame_rate: f64, pixel_format: PixelFormat) -> Self {
        Self {
            width,
            height,
            frame_rate,
            pixel_format,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Sample encoding of an audio payload. Always interleaved, little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioSampleFormat {
    F32,
    I16,
}

impl AudioSampleFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::F32 => 4,
            Self::I16 => 2,
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bytes_per_sample() as u16 * 8
    }
}

/// Negotiated microphone format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub sample_format: AudioSampleFormat,
}

impl AudioFormat {
    pub fn new(channels: u16, sample_rate: u32, sample_format: AudioSampleFormat) -> Self {
        Self {
            channels,
            sample_rate,
            sample_format,
        }
    }

    /// Bytes per interleaved frame.
    pub fn block_align(&self) -> usize {
        self.channels as usize * self.sample_format.bytes_per_sample()
    }

    /// Duration of `frames` frames in 100 ns ticks.
    pub fn frames_to_ticks(&self, frames: usize) -> i64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (frames as i64 * super::sample::TICKS_PER_SECOND) / self.sample_rate as i64
    }
}

/// Format descriptor of one stream, fixed at stream preparation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaFormat {
    Video(VideoFormat),
    Audio(AudioFormat),
}

impl MediaFormat {
    pub fn stream(&self) -> StreamTag {
        match self {
            Self::Video(_) => StreamTag::Video,
            Self::Audio(_) => StreamTag::Audio,
        }
    }

    pub fn as_video(&self) -> Option<&VideoFormat> {
        match self {
            Self::Video(v) => Some(v),
            Self::Audio(_) => None,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioFormat> {
        match self {
            Self::Audio(a) => Some(a),
            Self::Video(_) => None,
        }
    }
}

/// Formats negotiated for the currently open streams.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StreamFormats {
    pub video: Option<VideoFormat>,
    pub audio: Option<AudioFormat>,
}

impl StreamFormats {
    pub fn has(&self, stream: StreamTag) -> bool {
        match stream {
            StreamTag::Video => self.video.is_some(),
            StreamTag::Audio => self.audio.is_some(),
        }
    }
}
