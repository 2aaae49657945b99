use std::path::Path;

use super::sample_stream::SampleStreamMuxer;
use super::wav::WavMuxer;
use crate::models::config::ContainerFormat;
use crate::models::error::CaptureError;
use crate::traits::media_muxer::{MediaMuxer, MuxerProvider};

/// Muxers shipped with the core: WAV and the chunked sample stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinMuxers;

impl MuxerProvider for BuiltinMuxers {
    fn create_muxer(&self, path: &Path, container: &ContainerFormat) -> Result<Box<dyn MediaMuxer>, CaptureError> {
        match container {
            ContainerFormat::Wav => Ok(Box::new(WavMuxer::create(path)?)),
            ContainerFormat::SampleStream => Ok(Box::new(SampleStreamMuxer::create(path)?)),
            ContainerFormat::Other(name) => Err(CaptureError::FormatNotSupported(format!(
                "container {} needs a custom muxer provider",
                name
            ))),
        }
    }
}
