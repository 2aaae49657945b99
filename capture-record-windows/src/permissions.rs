//! Windows microphone privacy permission check.
//!
//! On Windows 10 1803+, microphone access is controlled by the privacy
//! settings at Settings > Privacy > Microphone. Desktop apps are generally
//! allowed unless the user has disabled the global toggle.
//!
//! Unpackaged desktop apps get no per-app consent dialog. Packaged apps
//! (MSIX/UWP) get an automatic consent prompt.

use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use capture_record_core::models::error::CaptureError;

use crate::wasapi_mic::ComGuard;

const E_ACCESSDENIED_CODE: i32 = -2147024891;
const AUDCLNT_E_DEVICE_IN_USE_CODE: i32 = -2004287478;

/// Check if microphone access is available.
///
/// Attempts to activate the default capture device. `Ok(false)` if there is
/// no capture device, or activation is denied (microphone permission is
/// likely disabled in Windows Privacy Settings).
pub fn check_microphone_permission() -> Result<bool, CaptureError> {
    unsafe {
        let _com_guard = ComGuard::init();
        check_mic_access_inner()
    }
}

unsafe fn check_mic_access_inner() -> Result<bool, CaptureError> {
    let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
        .map_err(|e| CaptureError::Unknown(format!("failed to create enumerator: {}", e)))?;

    let device = match enumerator.GetDefaultAudioEndpoint(eCapture, eConsole) {
        Ok(d) => d,
        Err(_) => return Ok(false),
    };

    let result: windows::core::Result<IAudioClient> = device.Activate(CLSCTX_ALL, None);

    match result {
        Ok(_) => Ok(true),
        Err(e) => {
            let code = e.code().0;
            if code == E_ACCESSDENIED_CODE || code == AUDCLNT_E_DEVICE_IN_USE_CODE {
                Ok(false)
            } else {
                log::warn!("Unexpected error checking mic permission: {}", e);
                Ok(true)
            }
        }
    }
}
