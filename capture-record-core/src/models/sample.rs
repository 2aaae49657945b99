use super::format::StreamTag;

/// Device clock resolution: timestamps are 100 ns ticks.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks per millisecond, used for duration reporting.
pub const TICKS_PER_MILLISECOND: i64 = 10_000;

/// One timestamped unit of audio or video payload from a capture device.
///
/// The capture fields are fixed once a device produces the sample. The only
/// thing the session changes is the output timestamp it stamps on before
/// handing the sample to the writer, plus in-place gain on audio payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    stream: StreamTag,
    timestamp: i64,
    duration: Option<i64>,
    payload: Vec<u8>,
    output_timestamp: Option<i64>,
}

impl Sample {
    pub fn new(stream: StreamTag, timestamp: i64, payload: Vec<u8>) -> Self {
        Self {
            stream,
            timestamp,
            duration: None,
            payload,
            output_timestamp: None,
        }
    }

    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn video(timestamp: i64, payload: Vec<u8>) -> Self {
        Self::new(StreamTag::Video, timestamp, payload)
    }

    pub fn audio(timestamp: i64, payload: Vec<u8>) -> Self {
        Self::new(StreamTag::Audio, timestamp, payload)
    }

    pub fn stream(&self) -> StreamTag {
        self.stream
    }

    /// Capture timestamp in device clock ticks.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn duration(&self) -> Option<i64> {
        self.duration
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// File-relative timestamp, set once the sample is scheduled for recording.
    pub fn output_timestamp(&self) -> Option<i64> {
        self.output_timestamp
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub(crate) fn set_output_timestamp(&mut self, timestamp: i64) {
        self.output_timestamp = Some(timestamp);
    }

    pub(crate) fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }
}
