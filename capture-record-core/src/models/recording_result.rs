use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::{CodecId, ContainerFormat};
use super::format::MediaFormat;

/// Result delivered with `on_recording_stopped` once a recording file is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    pub metadata: RecordingMetadata,
    /// Hex SHA-256 of the finalized file.
    pub checksum: String,
    /// Samples accepted by the muxer.
    pub samples_written: u64,
    /// Samples dropped because a write failed.
    pub samples_dropped: u64,
}

/// One output track of a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingTrack {
    pub index: usize,
    pub codec: CodecId,
    pub format: MediaFormat,
}

/// Metadata stored alongside a recording.
///
/// Serializable for the `.metadata.json` sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub duration_secs: f64,
    pub file_path: String,
    pub checksum: String,
    pub container: ContainerFormat,
    pub created_at: String,
    pub tracks: Vec<RecordingTrack>,
    pub samples_written: u64,
    pub samples_dropped: u64,
}

impl RecordingMetadata {
    pub fn new(
        duration_secs: f64,
        file_path: &str,
        checksum: &str,
        container: ContainerFormat,
        tracks: Vec<RecordingTrack>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            duration_secs,
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            container,
            created_at: chrono::Utc::now().to_rfc3339(),
            tracks,
            samples_written: 0,
            samples_dropped: 0,
        }
    }

    pub fn has_video(&self) -> bool {
        self.tracks.iter().any(|t| t.format.as_video().is_some())
    }

    pub fn has_audio(&self) -> bool {
        self.tracks.iter().any(|t| t.format.as_audio().is_some())
    }
}
