use thiserror::Error;

/// Errors that can occur during capture and recording operations.
///
/// Activation failures (`PermissionDenied`, `DeviceNotAvailable`,
/// `FormatNotSupported`) are returned synchronously. `Streaming` is only ever
/// reported through the session delegate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("device not available: {0}")]
    DeviceNotAvailable(String),

    #[error("format not supported: {0}")]
    FormatNotSupported(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("location not writable: {0}")]
    LocationNotWritable(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("writer is no longer writable")]
    NotWritable,

    #[error("finalize failed: {0}")]
    FinalizeFailed(String),

    #[error("streaming error {code}: {message}")]
    Streaming { code: i32, message: String },

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// Stable numeric code, reported through `on_streaming_error`.
    ///
    /// Backend streaming errors keep the platform code they were raised with.
    pub fn code(&self) -> i32 {
        match self {
            Self::PermissionDenied => 1,
            Self::DeviceNotAvailable(_) => 2,
            Self::FormatNotSupported(_) => 3,
            Self::InvalidArgument(_) => 4,
            Self::InvalidState(_) => 5,
            Self::LocationNotWritable(_) => 6,
            Self::EncodingFailed(_) => 7,
            Self::StorageError(_) => 8,
            Self::NotWritable => 9,
            Self::FinalizeFailed(_) => 10,
            Self::Streaming { code, .. } => *code,
            Self::Unknown(_) => -1,
        }
    }

    /// Whether this error is raised synchronously by `activate` / `start_recording`.
    pub fn is_activation_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied
                | Self::DeviceNotAvailable(_)
                | Self::FormatNotSupported(_)
                | Self::LocationNotWritable(_)
        )
    }

    pub fn streaming(code: i32, message: impl Into<String>) -> Self {
        Self::Streaming {
            code,
            message: message.into(),
        }
    }
}
