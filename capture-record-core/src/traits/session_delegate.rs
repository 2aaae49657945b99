use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::SessionState;

/// Event delegate for capture/record session notifications.
///
/// Methods are called from whichever thread caused the event: the control
/// thread, a device completion thread, the finalize thread or the duration
/// timer. Implementations should marshal to the UI thread if needed. The
/// session never holds its own locks while calling a delegate, so calling back
/// into the session is allowed.
pub trait SessionDelegate: Send + Sync {
    fn on_state_changed(&self, _state: SessionState) {}

    /// The first sample arrived after activation.
    fn on_streaming_started(&self) {}

    /// Streaming ended (end of stream or deactivate).
    fn on_streaming_stopped(&self) {}

    /// A device failed after activation. The session is already inactive.
    fn on_streaming_error(&self, _error: &CaptureError) {}

    /// The first sample of a recording was written.
    fn on_recording_started(&self) {}

    /// The recording file was finalized. `None` if finalization failed; the
    /// failure is reported through `on_recording_error` first.
    fn on_recording_stopped(&self, _result: Option<&RecordingResult>) {}

    fn on_recording_error(&self, _error: &CaptureError) {}

    /// Recording duration in milliseconds. Only emitted when it changed.
    fn on_duration_changed(&self, _duration_ms: i64) {}
}
