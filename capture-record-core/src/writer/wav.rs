use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{create_output, is_fatal_write_error, pcm_codec_format};
use crate::models::error::CaptureError;
use crate::models::format::{AudioFormat, AudioSampleFormat, MediaFormat};
use crate::processing::pcm;
use crate::processing::wav_format::{self, WavSpec};
use crate::traits::media_muxer::{MediaMuxer, OutputStream};

/// Audio-only RIFF/WAVE muxer.
///
/// Writes a provisional 44-byte header at `begin_writing` and patches the size
/// fields at `finalize`. Sample timestamps are not stored; samples are
/// concatenated in write order.
pub struct WavMuxer {
    path: PathBuf,
    file: Option<BufWriter<File>>,
    input: Option<AudioFormat>,
    spec: Option<WavSpec>,
    data_bytes: u64,
    writable: bool,
}

impl WavMuxer {
    pub fn create(path: &Path) -> Result<Self, CaptureError> {
        let file = create_output(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(BufWriter::new(file)),
            input: None,
            spec: None,
            data_bytes: 0,
            writable: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stored_format(&self) -> Option<AudioSampleFormat> {
        self.spec.map(|s| {
            if s.format_tag == wav_format::FORMAT_IEEE_FLOAT {
                AudioSampleFormat::F32
            } else {
                AudioSampleFormat::I16
            }
        })
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;
        if let Err(e) = file.write_all(data) {
            if is_fatal_write_error(&e) {
                self.writable = false;
            }
            return Err(CaptureError::StorageError(format!("write failed: {}", e)));
        }
        Ok(())
    }
}

impl MediaMuxer for WavMuxer {
    fn add_stream(&mut self, stream: &OutputStream) -> Result<usize, CaptureError> {
        let MediaFormat::Audio(input) = stream.format else {
            return Err(CaptureError::FormatNotSupported("wav cannot carry video".into()));
        };
        if self.input.is_some() {
            return Err(CaptureError::FormatNotSupported("wav holds a single audio stream".into()));
        }
        let stored = pcm_codec_format(&stream.codec).ok_or_else(|| {
            CaptureError::FormatNotSupported(format!("codec {} is not supported in wav", stream.codec))
        })?;
        let spec = match stored {
            AudioSampleFormat::I16 => WavSpec::pcm16(input.channels, input.sample_rate),
            AudioSampleFormat::F32 => WavSpec::float32(input.channels, input.sample_rate),
        };
        let pcm_bit_rate = spec.byte_rate() * 8;
        if stream.bit_rate != 0 && stream.bit_rate != pcm_bit_rate {
            return Err(CaptureError::FormatNotSupported(format!(
                "{} at {} Hz x {} is fixed at {} bit/s, got {}",
                stream.codec, input.sample_rate, input.channels, pcm_bit_rate, stream.bit_rate
            )));
        }

        self.input = Some(input);
        self.spec = Some(spec);
        Ok(0)
    }

    fn begin_writing(&mut self) -> Result<(), CaptureError> {
        let spec = self
            .spec
            .ok_or_else(|| CaptureError::InvalidState("no audio stream added".into()))?;
        let header = wav_format::generate_wav_header(&spec, 0);
        self.write_raw(&header)
    }

    fn write_sample(
        &mut self,
        stream_index: usize,
        _timestamp: i64,
        _duration: Option<i64>,
        payload: &[u8],
    ) -> Result<(), CaptureError> {
        let (Some(input), Some(stored)) = (self.input, self.stored_format()) else {
            return Err(CaptureError::InvalidState("no audio stream added".into()));
        };
        if stream_index != 0 {
            return Err(CaptureError::InvalidArgument(format!("no stream {}", stream_index)));
        }
        let data = pcm::transcode(payload, input.sample_format, stored);
        self.write_raw(&data)?;
        self.data_bytes += data.len() as u64;
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.writable && self.file.is_some()
    }

    fn finalize(&mut self) -> Result<(), CaptureError> {
        let spec = self
            .spec
            .ok_or_else(|| CaptureError::InvalidState("no audio stream added".into()))?;
        let mut file = self
            .file
            .take()
            .ok_or_else(|| CaptureError::InvalidState("already finalized".into()))?;

        let mut header = wav_format::generate_wav_header(&spec, 0);
        wav_format::patch_sizes(&mut header, self.data_bytes);

        file.flush().map_err(|e| CaptureError::StorageError(e.to_string()))?;
        let file = file.get_mut();
        file.seek(SeekFrom::Start(0))
            .map_err(|e| CaptureError::StorageError(e.to_string()))?;
        file.write_all(&header)
            .map_err(|e| CaptureError::StorageError(e.to_string()))?;
        file.sync_all().map_err(|e| CaptureError::StorageError(e.to_string()))?;
        Ok(())
    }
}
