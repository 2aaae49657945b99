use capture_record_core::models::error::CaptureError;
use capture_record_core::models::format::DeviceKind;
use capture_record_core::traits::device_source::{DeviceProvider, DeviceSource};

use crate::permissions::check_microphone_permission;
use crate::wasapi_mic::WasapiMicSource;

/// Opens WASAPI microphones. Cameras are not provided by this backend.
///
/// Microphone ids are WASAPI endpoint ids, or `"default"` for the default
/// console capture device.
#[derive(Debug, Default, Clone, Copy)]
pub struct WasapiDeviceProvider;

impl WasapiDeviceProvider {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceProvider for WasapiDeviceProvider {
    fn open(&self, kind: DeviceKind, id: &str) -> Result<Box<dyn DeviceSource>, CaptureError> {
        match kind {
            DeviceKind::Camera => Err(CaptureError::DeviceNotAvailable(format!(
                "camera {}: the WASAPI backend only captures microphones",
                id
            ))),
            DeviceKind::Microphone => {
                if !check_microphone_permission()? {
                    log::warn!("Microphone access is disabled or no capture device exists");
                    return Err(CaptureError::PermissionDenied);
                }
                Ok(Box::new(WasapiMicSource::open(id)?))
            }
        }
    }
}
