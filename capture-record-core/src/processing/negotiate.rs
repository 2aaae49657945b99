//! Picks concrete device formats out of what a device natively offers.

use crate::models::format::{AudioFormat, AudioSampleFormat, VideoFormat};

/// Frame rate below which a faster native mode is always preferred.
const SMOOTH_FRAME_RATE: f64 = 29.9;

/// Preferred capture audio layout: float stereo at 48 kHz.
pub const PREFERRED_AUDIO: AudioFormat = AudioFormat {
    channels: 2,
    sample_rate: 48000,
    sample_format: AudioSampleFormat::F32,
};

/// Choose a camera mode from `native`.
///
/// An exact match of `requested` (size, fuzzy frame rate, pixel layout) wins.
/// Otherwise a faster mode replaces the current pick while the pick is below
/// ~30 fps, and at equal frame rate the larger frame wins. Modes with an unknown
/// pixel layout are never chosen. Returns `None` when nothing is usable.
pub fn negotiate_video_format(native: &[VideoFormat], requested: Option<&VideoFormat>) -> Option<VideoFormat> {
    let mut best: Option<VideoFormat> = None;
    let mut best_area = 0u64;
    let mut best_rate = 0.0f64;

    for format in native.iter().filter(|f| f.pixel_format.is_known()) {
        if let Some(req) = requested {
            if req.width == format.width
                && req.height == format.height
                && fuzzy_eq(req.frame_rate, format.frame_rate)
                && req.pixel_format == format.pixel_format
            {
                return Some(*format);
            }
        }

        let area = format.area();
        if (best_rate < SMOOTH_FRAME_RATE && best_rate < format.frame_rate)
            || (best_rate == format.frame_rate && best_area < area)
        {
            best_area = area;
            best_rate = format.frame_rate;
            best = Some(*format);
        }
    }

    best
}

/// Choose the microphone capture format from `native`.
///
/// Float stereo 48 kHz if offered, else the first float format, else the first
/// native format.
pub fn negotiate_audio_format(native: &[AudioFormat]) -> Option<AudioFormat> {
    native
        .iter()
        .find(|f| **f == PREFERRED_AUDIO)
        .or_else(|| native.iter().find(|f| f.sample_format == AudioSampleFormat::F32))
        .or_else(|| native.first())
        .copied()
}

fn fuzzy_eq(a: f64, b: f64) -> bool {
    (a - b).abs() * 100_000.0 <= a.abs().min(b.abs())
}
