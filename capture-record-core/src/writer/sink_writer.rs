use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::models::config::{CodecId, ContainerFormat, RecordingSettings};
use crate::models::error::CaptureError;
use crate::models::format::{MediaFormat, StreamFormats, StreamTag, VideoFormat};
use crate::models::recording_result::{RecordingMetadata, RecordingResult, RecordingTrack};
use crate::models::sample::{Sample, TICKS_PER_SECOND};
use crate::storage::{checksum, metadata};
use crate::traits::media_muxer::{MediaMuxer, MuxerProvider, OutputStream};

/// Receives the outcome of an asynchronous finalize, on the finalize thread.
pub type FinalizeCallback = Box<dyn FnOnce(Result<RecordingResult, CaptureError>) + Send + 'static>;

/// Muxed recording output for one recording.
///
/// Created by [`start`](Self::start) with one output stream per requested
/// codec whose capture stream is active. Samples must carry an output
/// timestamp. [`finalize`](Self::finalize) consumes the writer and finishes
/// the file on a background thread.
pub struct EncodeSinkWriter {
    muxer: Box<dyn MediaMuxer>,
    path: PathBuf,
    container: ContainerFormat,
    write_metadata: bool,
    video_index: Option<usize>,
    audio_index: Option<usize>,
    tracks: Vec<RecordingTrack>,
    samples_written: u64,
    samples_dropped: u64,
    bytes_written: u64,
    end_timestamp: i64,
}

impl EncodeSinkWriter {
    /// Create the output file and set up its streams.
    ///
    /// Zero width/height and a non-positive frame rate in `settings` take the
    /// negotiated camera values from `formats`. A codec for a stream that is
    /// not active is ignored.
    pub fn start(
        provider: &dyn MuxerProvider,
        path: &Path,
        settings: &RecordingSettings,
        formats: &StreamFormats,
    ) -> Result<Self, CaptureError> {
        settings.validate().map_err(CaptureError::InvalidArgument)?;

        let streams = resolve_streams(settings, formats)?;
        if streams.is_empty() {
            return Err(CaptureError::FormatNotSupported(
                "no active capture stream matches the requested codecs".into(),
            ));
        }

        let mut muxer = provider.create_muxer(path, &settings.container)?;
        let mut video_index = None;
        let mut audio_index = None;
        let mut tracks = Vec::with_capacity(streams.len());

        let prepared = (|| -> Result<(), CaptureError> {
            for (tag, stream) in &streams {
                let index = muxer.add_stream(stream)?;
                match tag {
                    StreamTag::Video => video_index = Some(index),
                    StreamTag::Audio => audio_index = Some(index),
                }
                tracks.push(RecordingTrack {
                    index,
                    codec: stream.codec.clone(),
                    format: stream.format,
                });
            }
            muxer.begin_writing()
        })();

        if let Err(e) = prepared {
            drop(muxer);
            fs::remove_file(path).ok();
            return Err(e);
        }

        log::info!(
            "Recording to {} ({}, {} stream(s))",
            path.display(),
            settings.container,
            tracks.len()
        );

        Ok(Self {
            muxer,
            path: path.to_path_buf(),
            container: settings.container.clone(),
            write_metadata: settings.write_metadata,
            video_index,
            audio_index,
            tracks,
            samples_written: 0,
            samples_dropped: 0,
            bytes_written: 0,
            end_timestamp: 0,
        })
    }

    pub fn stream_index(&self, stream: StreamTag) -> Option<usize> {
        match stream {
            StreamTag::Video => self.video_index,
            StreamTag::Audio => self.audio_index,
        }
    }

    pub fn has_stream(&self, stream: StreamTag) -> bool {
        self.stream_index(stream).is_some()
    }

    /// Write one timestamped sample.
    ///
    /// Returns `Ok(false)` for a stream that is not being recorded. A failed
    /// write drops the sample and counts it; `NotWritable` means the muxer
    /// cannot accept anything more.
    pub fn write_sample(&mut self, sample: &Sample) -> Result<bool, CaptureError> {
        let Some(index) = self.stream_index(sample.stream()) else {
            return Ok(false);
        };
        let timestamp = sample
            .output_timestamp()
            .ok_or_else(|| CaptureError::InvalidArgument("sample has no output timestamp".into()))?;

        if !self.muxer.is_writable() {
            self.samples_dropped += 1;
            return Err(CaptureError::NotWritable);
        }

        match self
            .muxer
            .write_sample(index, timestamp, sample.duration(), sample.payload())
        {
            Ok(()) => {
                self.samples_written += 1;
                self.bytes_written += sample.payload().len() as u64;
                self.end_timestamp = self.end_timestamp.max(timestamp + sample.duration().unwrap_or(0));
                Ok(true)
            }
            Err(e) => {
                self.samples_dropped += 1;
                if self.muxer.is_writable() {
                    Err(e)
                } else {
                    Err(CaptureError::NotWritable)
                }
            }
        }
    }

    pub fn is_writable(&self) -> bool {
        self.muxer.is_writable()
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    pub fn samples_dropped(&self) -> u64 {
        self.samples_dropped
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Finish the file on a `sink-finalize` thread and report through `callback`.
    ///
    /// Returns immediately. If the thread cannot be spawned the file is
    /// finished on the calling thread instead.
    pub fn finalize(self, callback: FinalizeCallback) {
        let job = Arc::new(Mutex::new(Some((self, callback))));
        let remote = Arc::clone(&job);

        let spawned = thread::Builder::new()
            .name("sink-finalize".into())
            .spawn(move || {
                let taken = remote.lock().take();
                if let Some((writer, callback)) = taken {
                    callback(writer.finish());
                }
            });

        if let Err(e) = spawned {
            log::error!("Failed to spawn finalize thread, finalizing inline: {}", e);
            let taken = job.lock().take();
            if let Some((writer, callback)) = taken {
                callback(writer.finish());
            }
        }
    }

    /// Flush the muxer, checksum the file and build the result. Blocks.
    pub fn finish(mut self) -> Result<RecordingResult, CaptureError> {
        self.muxer.finalize().map_err(|e| {
            log::error!("Failed to finalize {}: {}", self.path.display(), e);
            CaptureError::FinalizeFailed(e.to_string())
        })?;

        let checksum = checksum::sha256_file(&self.path)?;
        let duration_secs = self.end_timestamp as f64 / TICKS_PER_SECOND as f64;

        let mut metadata = RecordingMetadata::new(
            duration_secs,
            &self.path.to_string_lossy(),
            &checksum,
            self.container.clone(),
            self.tracks.clone(),
        );
        metadata.samples_written = self.samples_written;
        metadata.samples_dropped = self.samples_dropped;

        if self.write_metadata {
            metadata::write_metadata(&metadata, &self.path)?;
        }

        log::info!(
            "Finalized {} ({} samples written, {} dropped)",
            self.path.display(),
            self.samples_written,
            self.samples_dropped
        );

        Ok(RecordingResult {
            file_path: self.path.clone(),
            duration_secs,
            metadata,
            checksum,
            samples_written: self.samples_written,
            samples_dropped: self.samples_dropped,
        })
    }
}

fn resolve_streams(
    settings: &RecordingSettings,
    formats: &StreamFormats,
) -> Result<Vec<(StreamTag, OutputStream)>, CaptureError> {
    let mut streams = Vec::with_capacity(2);

    match (&settings.video_codec, formats.video) {
        (Some(codec), Some(native)) => {
            let format = VideoFormat {
                width: if settings.width == 0 { native.width } else { settings.width },
                height: if settings.height == 0 { native.height } else { settings.height },
                frame_rate: if settings.frame_rate <= 0.0 {
                    native.frame_rate
                } else {
                    settings.frame_rate
                },
                pixel_format: native.pixel_format,
            };
            if codec.as_str() == CodecId::RAW_VIDEO && (format.width, format.height) != (native.width, native.height) {
                return Err(CaptureError::FormatNotSupported(format!(
                    "raw video cannot be scaled from {}x{} to {}x{}",
                    native.width, native.height, format.width, format.height
                )));
            }
            streams.push((
                StreamTag::Video,
                OutputStream {
                    codec: codec.clone(),
                    format: MediaFormat::Video(format),
                    bit_rate: settings.video_bit_rate,
                },
            ));
        }
        (Some(codec), None) => log::debug!("Ignoring video codec {}: no camera is active", codec),
        _ => {}
    }

    match (&settings.audio_codec, formats.audio) {
        (Some(codec), Some(native)) => streams.push((
            StreamTag::Audio,
            OutputStream {
                codec: codec.clone(),
                format: MediaFormat::Audio(native),
                bit_rate: settings.audio_bit_rate,
            },
        )),
        (Some(codec), None) => log::debug!("Ignoring audio codec {}: no microphone is active", codec),
        _ => {}
    }

    Ok(streams)
}
