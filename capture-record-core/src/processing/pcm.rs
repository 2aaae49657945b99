//! Pure-math helpers for interleaved little-endian PCM payloads.
//!
//! Payloads arrive as raw bytes from capture devices, so every helper works on
//! `&[u8]` plus an [`AudioSampleFormat`] and never allocates unless it returns a
//! new buffer.

use std::borrow::Cow;

use crate::models::diagnostics::AudioLevels;
use crate::models::format::AudioSampleFormat;

/// Scale every sample of `payload` in place by `gain`.
///
/// `I16` samples are rounded and saturated. A trailing partial sample is left
/// untouched.
pub fn apply_gain(payload: &mut [u8], format: AudioSampleFormat, gain: f32) {
    if gain == 1.0 {
        return;
    }
    match format {
        AudioSampleFormat::F32 => {
            for chunk in payload.chunks_exact_mut(4) {
                let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                chunk.copy_from_slice(&(value * gain).to_le_bytes());
            }
        }
        AudioSampleFormat::I16 => {
            for chunk in payload.chunks_exact_mut(2) {
                let value = i16::from_le_bytes([chunk[0], chunk[1]]) as f32;
                let scaled = (value * gain).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                chunk.copy_from_slice(&scaled.to_le_bytes());
            }
        }
    }
}

/// Decode a payload into normalized `f32` samples in `[-1.0, 1.0]`.
pub fn to_f32_samples(payload: &[u8], format: AudioSampleFormat) -> Vec<f32> {
    match format {
        AudioSampleFormat::F32 => payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        AudioSampleFormat::I16 => payload
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / i16::MAX as f32)
            .collect(),
    }
}

/// Encode `f32` samples as little-endian `f32` bytes.
pub fn f32_to_bytes(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 4);
    for &sample in samples {
        data.extend_from_slice(&sample.to_le_bytes());
    }
    data
}

/// Convert f32 samples `[-1.0, 1.0]` to 16-bit PCM (little-endian bytes).
///
/// Clamps out-of-range values. Output length = `samples.len() * 2` bytes.
pub fn convert_to_int16_pcm(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let int16_value = (clamped * i16::MAX as f32) as i16;
        data.extend_from_slice(&int16_value.to_le_bytes());
    }
    data
}

/// Re-encode a payload from one sample format to another.
pub fn transcode(payload: &[u8], from: AudioSampleFormat, to: AudioSampleFormat) -> Cow<'_, [u8]> {
    match (from, to) {
        (AudioSampleFormat::F32, AudioSampleFormat::I16) => {
            Cow::Owned(convert_to_int16_pcm(&to_f32_samples(payload, from)))
        }
        (AudioSampleFormat::I16, AudioSampleFormat::F32) => Cow::Owned(f32_to_bytes(&to_f32_samples(payload, from))),
        _ => Cow::Borrowed(payload),
    }
}

/// Compute RMS level of samples (0.0–1.0 range for normalized audio).
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Compute peak absolute level of samples.
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

/// RMS and peak of a raw payload.
pub fn measure(payload: &[u8], format: AudioSampleFormat) -> AudioLevels {
    let samples = to_f32_samples(payload, format);
    AudioLevels {
        rms: rms_level(&samples),
        peak: peak_level(&samples),
    }
}
