//! WAV file format utilities.
//!
//! Generates standard 44-byte RIFF WAV headers for integer PCM and IEEE float
//! payloads, and patches the size fields once the data length is known.

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// `WAVE_FORMAT_PCM`.
pub const FORMAT_PCM: u16 = 1;
/// `WAVE_FORMAT_IEEE_FLOAT`.
pub const FORMAT_IEEE_FLOAT: u16 = 3;

/// Fields of the `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bit_depth: u16,
}

impl WavSpec {
    pub fn pcm16(channels: u16, sample_rate: u32) -> Self {
        Self {
            format_tag: FORMAT_PCM,
            channels,
            sample_rate,
            bit_depth: 16,
        }
    }

    pub fn float32(channels: u16, sample_rate: u32) -> Self {
        Self {
            format_tag: FORMAT_IEEE_FLOAT,
            channels,
            sample_rate,
            bit_depth: 32,
        }
    }

    pub fn block_align(&self) -> u16 {
        self.channels * self.bit_depth / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

/// Generate a 44-byte WAV RIFF header.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    file size - 8 (36 + data_size)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (format chunk size)
/// [20-21]  format tag (1 = PCM, 3 = IEEE float)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate
/// [32-33]  block_align
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(spec: &WavSpec, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let mut header = [0u8; WAV_HEADER_SIZE];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_size).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&spec.format_tag.to_le_bytes());
    header[22..24].copy_from_slice(&spec.channels.to_le_bytes());
    header[24..28].copy_from_slice(&spec.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&spec.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&spec.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&spec.bit_depth.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Patch the RIFF chunk size (offset 4) and data size (offset 40) in place.
///
/// Sizes past `u32::MAX` saturate.
pub fn patch_sizes(header: &mut [u8], data_size: u64) {
    let data = data_size.min(u32::MAX as u64 - 36) as u32;
    header[4..8].copy_from_slice(&(data + 36).to_le_bytes());
    header[40..44].copy_from_slice(&data.to_le_bytes());
}

/// Parse the `fmt ` fields and data size back out of a 44-byte header.
pub fn parse_wav_header(header: &[u8]) -> Option<(WavSpec, u32)> {
    if header.len() < WAV_HEADER_SIZE || &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
        return None;
    }
    let u16_at = |o: usize| u16::from_le_bytes([header[o], header[o + 1]]);
    let u32_at = |o: usize| u32::from_le_bytes([header[o], header[o + 1], header[o + 2], header[o + 3]]);
    let spec = WavSpec {
        format_tag: u16_at(20),
        channels: u16_at(22),
        sample_rate: u32_at(24),
        bit_depth: u16_at(34),
    };
    Some((spec, u32_at(40)))
}
