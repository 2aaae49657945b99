use crate::models::error::CaptureError;
use crate::models::format::{DeviceKind, MediaFormat, StreamTag};
use crate::reader::ReadCompletion;

/// Identity of an opened capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
        }
    }

    pub fn stream(&self) -> StreamTag {
        self.kind.stream()
    }
}

/// One opened capture device (camera or microphone).
///
/// Implemented by platform backends:
/// - `WasapiMicSource` (Windows)
///
/// Reads are asynchronous. `read_sample` hands the device a [`ReadCompletion`]
/// which the device completes exactly once, either before `read_sample`
/// returns or later from its own capture thread. A device never has more than
/// one read pending.
pub trait DeviceSource: Send {
    fn descriptor(&self) -> &DeviceDescriptor;

    /// Formats the device can produce, in the device's preference order.
    fn native_formats(&self) -> Vec<MediaFormat>;

    /// Select the format subsequent samples are produced in.
    fn set_format(&mut self, format: &MediaFormat) -> Result<(), CaptureError>;

    /// The format selected with `set_format`, if any.
    fn format(&self) -> Option<MediaFormat>;

    /// Request the next sample.
    ///
    /// Returning `Err` means the request was not accepted; the completion is
    /// dropped and the error is reported for this stream instead.
    fn read_sample(&mut self, completion: ReadCompletion) -> Result<(), CaptureError>;

    /// Stop producing samples and release device resources. Idempotent.
    ///
    /// A pending completion is dropped without being completed.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Opens capture devices by id.
///
/// Activation errors (`PermissionDenied`, `DeviceNotAvailable`) come from here.
pub trait DeviceProvider: Send + Sync {
    fn open(&self, kind: DeviceKind, id: &str) -> Result<Box<dyn DeviceSource>, CaptureError>;
}
