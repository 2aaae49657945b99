//! Recording output: the encode sink writer and the built-in container muxers.

mod builtin;
mod finalize;
mod sample_stream;
mod sink_writer;
mod wav;

pub use builtin::BuiltinMuxers;
pub use finalize::FinalizeSignal;
pub use sample_stream::{read_sample_stream, SampleStreamFile, SampleStreamMuxer, StoredSample};
pub use sink_writer::{EncodeSinkWriter, FinalizeCallback};
pub use wav::WavMuxer;

use std::fs::File;
use std::io;
use std::path::Path;

use crate::models::config::CodecId;
use crate::models::error::CaptureError;
use crate::models::format::AudioSampleFormat;

/// Sample format stored for a PCM codec id.
pub(crate) fn pcm_codec_format(codec: &CodecId) -> Option<AudioSampleFormat> {
    match codec.as_str() {
        CodecId::PCM_S16LE => Some(AudioSampleFormat::I16),
        CodecId::PCM_F32LE => Some(AudioSampleFormat::F32),
        _ => None,
    }
}

/// Create the output file, mapping failures to `LocationNotWritable`.
pub(crate) fn create_output(path: &Path) -> Result<File, CaptureError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
            return Err(CaptureError::LocationNotWritable(format!(
                "directory does not exist: {}",
                parent.display()
            )));
        }
        _ => {}
    }
    File::create(path)
        .map_err(|e| CaptureError::LocationNotWritable(format!("{}: {}", path.display(), e)))
}

/// Whether an I/O error means nothing more can be written to the file.
pub(crate) fn is_fatal_write_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::StorageFull | io::ErrorKind::WriteZero | io::ErrorKind::PermissionDenied
    )
}
