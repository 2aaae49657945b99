use std::path::Path;

use crate::models::config::{CodecId, ContainerFormat};
use crate::models::error::CaptureError;
use crate::models::format::MediaFormat;

/// One output stream requested from a muxer.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputStream {
    pub codec: CodecId,
    /// Format of the samples that will be written to this stream.
    pub format: MediaFormat,
    /// Bits per second (0 = encoder default).
    pub bit_rate: u32,
}

/// Container writer behind an `EncodeSinkWriter`.
///
/// Lifecycle: `add_stream`* → `begin_writing` → `write_sample`* → `finalize`.
pub trait MediaMuxer: Send {
    /// Register a stream and return its index.
    ///
    /// Fails with `FormatNotSupported` if the container cannot carry this
    /// codec/format/bit rate.
    fn add_stream(&mut self, stream: &OutputStream) -> Result<usize, CaptureError>;

    fn begin_writing(&mut self) -> Result<(), CaptureError>;

    /// Write one sample. `timestamp` is file-relative (100 ns ticks).
    fn write_sample(
        &mut self,
        stream_index: usize,
        timestamp: i64,
        duration: Option<i64>,
        payload: &[u8],
    ) -> Result<(), CaptureError>;

    /// `false` once the muxer cannot accept any further sample (e.g. disk full).
    fn is_writable(&self) -> bool;

    /// Flush buffered data and write the container trailer. May block.
    fn finalize(&mut self) -> Result<(), CaptureError>;
}

/// Creates muxers for a container format.
pub trait MuxerProvider: Send + Sync {
    /// Fails with `LocationNotWritable` if `path` cannot be created and
    /// `FormatNotSupported` for containers the provider does not know.
    fn create_muxer(&self, path: &Path, container: &ContainerFormat) -> Result<Box<dyn MediaMuxer>, CaptureError>;
}
