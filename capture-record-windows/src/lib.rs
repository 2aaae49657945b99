//! # capture-record-windows
//!
//! Windows WASAPI backend for capture-record-core.
//!
//! Provides:
//! - `WasapiMicSource`: microphone `DeviceSource` via a WASAPI capture endpoint
//! - `WasapiDeviceProvider`: opens microphones for a `CaptureRecordSession`
//! - `permissions`: Windows microphone privacy check
//!
//! ## Platform Requirements
//! - Windows 10 1803+
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use capture_record_core::{ActivationRequest, CaptureRecordSession, ContainerFormat, CodecId, RecordingSettings};
//! use capture_record_windows::WasapiDeviceProvider;
//!
//! let session = CaptureRecordSession::new(Arc::new(WasapiDeviceProvider::new()));
//! session.activate(&ActivationRequest::microphone("default"))?;
//! session.start_recording("take.wav", &RecordingSettings::audio_only(ContainerFormat::Wav, CodecId::PCM_S16LE))?;
//! ```

#[cfg(target_os = "windows")]
pub mod permissions;
#[cfg(target_os = "windows")]
pub mod provider;
#[cfg(target_os = "windows")]
pub mod wasapi_mic;

#[cfg(target_os = "windows")]
pub use provider::WasapiDeviceProvider;
#[cfg(target_os = "windows")]
pub use wasapi_mic::{WasapiMicSource, DEFAULT_MICROPHONE_ID};
