//! Chunked interleaved sample stream container (`.crs`).
//!
//! Layout, all integers little-endian:
//! ```text
//! header   "CRSF" | version u16 | stream_count u16 | sample_count u32 | duration i64
//! streams  per stream:
//!            kind u8 (0 = video, 1 = audio) | codec_len u8 | codec bytes | bit_rate u32
//!            video: width u32 | height u32 | frame_rate f64 | pixel u8
//!            audio: channels u16 | sample_rate u32 | sample_format u8 (0 = f32, 1 = i16)
//! records  stream u8 | pts i64 | duration i64 (-1 = none) | len u32 | payload
//! trailer  "CRSE" | sample_count u32
//! ```
//! `sample_count` and `duration` in the header are patched at finalize.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{create_output, is_fatal_write_error, pcm_codec_format};
use crate::models::config::CodecId;
use crate::models::error::CaptureError;
use crate::models::format::{AudioFormat, AudioSampleFormat, MediaFormat, PixelFormat, StreamTag, VideoFormat};
use crate::processing::pcm;
use crate::traits::media_muxer::{MediaMuxer, OutputStream};

const MAGIC: &[u8; 4] = b"CRSF";
const TRAILER_MAGIC: &[u8; 4] = b"CRSE";
const VERSION: u16 = 1;
const HEADER_SIZE: u64 = 20;
const SAMPLE_COUNT_OFFSET: u64 = 8;
const MAX_STREAMS: usize = u8::MAX as usize;
/// Record header: stream, pts, duration and payload length.
const RECORD_HEADER_SIZE: usize = 21;

struct StreamEntry {
    stream: OutputStream,
    /// Format samples are stored in (after PCM transcoding).
    stored: MediaFormat,
}

pub struct SampleStreamMuxer {
    path: PathBuf,
    file: Option<BufWriter<File>>,
    streams: Vec<StreamEntry>,
    began: bool,
    sample_count: u32,
    duration: i64,
    writable: bool,
}

impl SampleStreamMuxer {
    pub fn create(path: &Path) -> Result<Self, CaptureError> {
        let file = create_output(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(BufWriter::new(file)),
            streams: Vec::new(),
            began: false,
            sample_count: 0,
            duration: 0,
            writable: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
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

    fn header(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE as usize);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&(self.streams.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.sample_count.to_le_bytes());
        out.extend_from_slice(&self.duration.to_le_bytes());
        out
    }

    fn stream_table(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.streams {
            let codec = entry.stream.codec.as_str().as_bytes();
            match entry.stored {
                MediaFormat::Video(_) => out.push(0),
                MediaFormat::Audio(_) => out.push(1),
            }
            out.push(codec.len() as u8);
            out.extend_from_slice(codec);
            out.extend_from_slice(&entry.stream.bit_rate.to_le_bytes());
            match entry.stored {
                MediaFormat::Video(v) => {
                    out.extend_from_slice(&v.width.to_le_bytes());
                    out.extend_from_slice(&v.height.to_le_bytes());
                    out.extend_from_slice(&v.frame_rate.to_le_bytes());
                    out.push(v.pixel_format.wire_id());
                }
                MediaFormat::Audio(a) => {
                    out.extend_from_slice(&a.channels.to_le_bytes());
                    out.extend_from_slice(&a.sample_rate.to_le_bytes());
                    out.push(match a.sample_format {
                        AudioSampleFormat::F32 => 0,
                        AudioSampleFormat::I16 => 1,
                    });
                }
            }
        }
        out
    }
}

impl MediaMuxer for SampleStreamMuxer {
    fn add_stream(&mut self, stream: &OutputStream) -> Result<usize, CaptureError> {
        if self.began {
            return Err(CaptureError::InvalidState("streams must be added before writing".into()));
        }
        if self.streams.len() >= MAX_STREAMS {
            return Err(CaptureError::FormatNotSupported("too many streams".into()));
        }
        if stream.codec.as_str().len() > u8::MAX as usize {
            return Err(CaptureError::InvalidArgument("codec id too long".into()));
        }

        let stored = match stream.format {
            MediaFormat::Video(v) => {
                if stream.codec.as_str() != CodecId::RAW_VIDEO {
                    return Err(CaptureError::FormatNotSupported(format!(
                        "video codec {} is not supported in a sample stream",
                        stream.codec
                    )));
                }
                MediaFormat::Video(v)
            }
            MediaFormat::Audio(a) => {
                let sample_format = pcm_codec_format(&stream.codec).ok_or_else(|| {
                    CaptureError::FormatNotSupported(format!(
                        "audio codec {} is not supported in a sample stream",
                        stream.codec
                    ))
                })?;
                MediaFormat::Audio(AudioFormat { sample_format, ..a })
            }
        };

        self.streams.push(StreamEntry {
            stream: stream.clone(),
            stored,
        });
        Ok(self.streams.len() - 1)
    }

    fn begin_writing(&mut self) -> Result<(), CaptureError> {
        if self.streams.is_empty() {
            return Err(CaptureError::InvalidState("no stream added".into()));
        }
        let mut head = self.header();
        head.extend_from_slice(&self.stream_table());
        self.write_raw(&head)?;
        self.began = true;
        Ok(())
    }

    fn write_sample(
        &mut self,
        stream_index: usize,
        timestamp: i64,
        duration: Option<i64>,
        payload: &[u8],
    ) -> Result<(), CaptureError> {
        if !self.began {
            return Err(CaptureError::InvalidState("begin_writing was not called".into()));
        }
        let entry = self
            .streams
            .get(stream_index)
            .ok_or_else(|| CaptureError::InvalidArgument(format!("no stream {}", stream_index)))?;

        let data = match (entry.stream.format, entry.stored) {
            (MediaFormat::Audio(input), MediaFormat::Audio(stored)) => {
                pcm::transcode(payload, input.sample_format, stored.sample_format)
            }
            _ => std::borrow::Cow::Borrowed(payload),
        };
        let len = u32::try_from(data.len())
            .map_err(|_| CaptureError::EncodingFailed(format!("sample of {} bytes is too large", data.len())))?;

        let mut record = Vec::with_capacity(RECORD_HEADER_SIZE + data.len());
        record.push(stream_index as u8);
        record.extend_from_slice(&timestamp.to_le_bytes());
        record.extend_from_slice(&duration.unwrap_or(-1).to_le_bytes());
        record.extend_from_slice(&len.to_le_bytes());
        record.extend_from_slice(&data);
        self.write_raw(&record)?;

        self.sample_count += 1;
        self.duration = self.duration.max(timestamp + duration.unwrap_or(0));
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.writable && self.file.is_some()
    }

    fn finalize(&mut self) -> Result<(), CaptureError> {
        if !self.began {
            return Err(CaptureError::InvalidState("begin_writing was not called".into()));
        }
        let mut trailer = Vec::with_capacity(8);
        trailer.extend_from_slice(TRAILER_MAGIC);
        trailer.extend_from_slice(&self.sample_count.to_le_bytes());
        self.write_raw(&trailer)?;

        let mut file = self
            .file
            .take()
            .ok_or_else(|| CaptureError::InvalidState("already finalized".into()))?;
        file.flush().map_err(|e| CaptureError::StorageError(e.to_string()))?;
        let file = file.get_mut();
        file.seek(SeekFrom::Start(SAMPLE_COUNT_OFFSET))
            .map_err(|e| CaptureError::StorageError(e.to_string()))?;
        file.write_all(&self.sample_count.to_le_bytes())
            .map_err(|e| CaptureError::StorageError(e.to_string()))?;
        file.write_all(&self.duration.to_le_bytes())
            .map_err(|e| CaptureError::StorageError(e.to_string()))?;
        file.sync_all().map_err(|e| CaptureError::StorageError(e.to_string()))?;
        Ok(())
    }
}

/// A sample read back from a `.crs` file.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSample {
    pub stream_index: usize,
    pub timestamp: i64,
    pub duration: Option<i64>,
    pub payload: Vec<u8>,
}

/// Parsed contents of a `.crs` file.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleStreamFile {
    pub streams: Vec<OutputStream>,
    pub samples: Vec<StoredSample>,
    pub duration: i64,
}

impl SampleStreamFile {
    /// Index of the first stream of the given kind.
    pub fn stream_index(&self, stream: StreamTag) -> Option<usize> {
        self.streams.iter().position(|s| s.format.stream() == stream)
    }

    pub fn samples_of(&self, stream_index: usize) -> impl Iterator<Item = &StoredSample> {
        self.samples.iter().filter(move |s| s.stream_index == stream_index)
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CaptureError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| corrupt(format!("unexpected end of file at byte {}", self.pos)))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, CaptureError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CaptureError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, CaptureError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self) -> Result<i64, CaptureError> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(i64::from_le_bytes(raw))
    }

    fn f64(&mut self) -> Result<f64, CaptureError> {
        Ok(f64::from_bits(self.i64()? as u64))
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

fn corrupt(message: String) -> CaptureError {
    CaptureError::StorageError(format!("corrupt sample stream: {}", message))
}

/// Read and validate a finalized `.crs` file.
///
/// Fails if the header, trailer and record count disagree or if bytes follow
/// the trailer.
pub fn read_sample_stream(path: &Path) -> Result<SampleStreamFile, CaptureError> {
    let data = std::fs::read(path).map_err(|e| CaptureError::StorageError(format!("failed to read file: {}", e)))?;
    let mut cur = Cursor { data: &data, pos: 0 };

    if cur.take(4)? != MAGIC {
        return Err(corrupt("bad magic".into()));
    }
    let version = cur.u16()?;
    if version != VERSION {
        return Err(corrupt(format!("unsupported version {}", version)));
    }
    let stream_count = cur.u16()? as usize;
    let sample_count = cur.u32()?;
    let duration = cur.i64()?;

    let mut streams = Vec::with_capacity(stream_count);
    for _ in 0..stream_count {
        let kind = cur.u8()?;
        let codec_len = cur.u8()? as usize;
        let codec = String::from_utf8(cur.take(codec_len)?.to_vec()).map_err(|_| corrupt("codec id is not utf-8".into()))?;
        let bit_rate = cur.u32()?;
        let format = match kind {
            0 => MediaFormat::Video(VideoFormat {
                width: cur.u32()?,
                height: cur.u32()?,
                frame_rate: cur.f64()?,
                pixel_format: PixelFormat::from_wire_id(cur.u8()?),
            }),
            1 => {
                let channels = cur.u16()?;
                let sample_rate = cur.u32()?;
                let sample_format = match cur.u8()? {
                    0 => AudioSampleFormat::F32,
                    1 => AudioSampleFormat::I16,
                    other => return Err(corrupt(format!("unknown sample format {}", other))),
                };
                MediaFormat::Audio(AudioFormat::new(channels, sample_rate, sample_format))
            }
            other => return Err(corrupt(format!("unknown stream kind {}", other))),
        };
        streams.push(OutputStream {
            codec: CodecId(codec),
            format,
            bit_rate,
        });
    }

    let mut samples = Vec::with_capacity((sample_count as usize).min(cur.remaining() / RECORD_HEADER_SIZE));
    loop {
        if cur.remaining() >= 4 && &data[cur.pos..cur.pos + 4] == TRAILER_MAGIC {
            cur.take(4)?;
            break;
        }
        let stream_index = cur.u8()? as usize;
        if stream_index >= streams.len() {
            return Err(corrupt(format!("record for unknown stream {}", stream_index)));
        }
        let timestamp = cur.i64()?;
        let raw_duration = cur.i64()?;
        let len = cur.u32()? as usize;
        let payload = cur.take(len)?.to_vec();
        samples.push(StoredSample {
            stream_index,
            timestamp,
            duration: (raw_duration >= 0).then_some(raw_duration),
            payload,
        });
    }

    let trailer_count = cur.u32()?;
    if cur.remaining() != 0 {
        return Err(corrupt(format!("{} trailing bytes", cur.remaining())));
    }
    if trailer_count != sample_count || samples.len() != sample_count as usize {
        return Err(corrupt(format!(
            "sample count mismatch (header {}, trailer {}, records {})",
            sample_count,
            trailer_count,
            samples.len()
        )));
    }

    Ok(SampleStreamFile {
        streams,
        samples,
        duration,
    })
}
