//! PCM16 mono WAV/RIFF framing for file mode and the default chunk encoder
//! (spec §6, §4.7). Adapted from the teacher's `encode_wav` (which writes
//! IEEE-float WAV for transcription uploads) to the canonical 44-byte PCM16
//! header this engine requires.

use crate::error::EngineError;

const RIFF_HEADER_LEN: usize = 44;
const FMT_CHUNK_SIZE: u32 = 16;
const AUDIO_FORMAT_PCM: u16 = 1;

/// A parsed mono PCM16 WAV payload.
#[derive(Debug)]
pub struct WavPcm16Mono {
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

/// Parses a WAV/RIFF byte buffer per spec §6's exact header layout,
/// rejecting anything that isn't PCM16 mono.
pub fn parse_wav(bytes: &[u8]) -> Result<WavPcm16Mono, EngineError> {
    if bytes.len() < RIFF_HEADER_LEN {
        return Err(EngineError::UnsupportedFormat(
            "buffer shorter than a WAV header".to_string(),
        ));
    }
    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" || &bytes[12..16] != b"fmt " {
        return Err(EngineError::UnsupportedFormat(
            "missing RIFF/WAVE/fmt chunk markers".to_string(),
        ));
    }

    let fmt_chunk_size = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
    if fmt_chunk_size != FMT_CHUNK_SIZE {
        return Err(EngineError::UnsupportedFormat(format!(
            "unexpected fmt chunk size {fmt_chunk_size}"
        )));
    }

    let audio_format = u16::from_le_bytes(bytes[20..22].try_into().unwrap());
    if audio_format != AUDIO_FORMAT_PCM {
        return Err(EngineError::UnsupportedFormat(format!(
            "unsupported audio format code {audio_format}, only PCM is accepted"
        )));
    }

    let num_channels = u16::from_le_bytes(bytes[22..24].try_into().unwrap());
    if num_channels != 1 {
        return Err(EngineError::UnsupportedChannelCount(num_channels));
    }

    let sample_rate = u32::from_le_bytes(bytes[24..28].try_into().unwrap());

    let bits_per_sample = u16::from_le_bytes(bytes[34..36].try_into().unwrap());
    if bits_per_sample != 16 {
        return Err(EngineError::UnsupportedFormat(format!(
            "unsupported bits-per-sample {bits_per_sample}, only 16-bit PCM is accepted"
        )));
    }

    if &bytes[36..40] != b"data" {
        return Err(EngineError::UnsupportedFormat(
            "missing data chunk marker".to_string(),
        ));
    }
    let data_size = u32::from_le_bytes(bytes[40..44].try_into().unwrap()) as usize;
    let data = &bytes[44..];
    let usable = data_size.min(data.len());

    let samples = data[..usable]
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Ok(WavPcm16Mono { sample_rate, samples })
}

/// Writes a canonical 44-byte-header PCM16 mono WAV.
pub fn write_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let num_channels: u16 = 1;
    let bits_per_sample: u16 = 16;
    let block_align = num_channels * (bits_per_sample / 8);
    let byte_rate = sample_rate * u32::from(block_align);
    let data_size = (samples.len() * 2) as u32;
    let file_size = 4 + (8 + FMT_CHUNK_SIZE) + (8 + data_size);

    let mut buf = Vec::with_capacity(RIFF_HEADER_LEN + samples.len() * 2);

    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&FMT_CHUNK_SIZE.to_le_bytes());
    buf.extend_from_slice(&AUDIO_FORMAT_PCM.to_le_bytes());
    buf.extend_from_slice(&num_channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}

/// Converts a float frame in `[-1, 1]` to i16 PCM, clamping out-of-range
/// values rather than wrapping.
pub fn floats_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

pub fn i16_to_floats(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / i16::MAX as f32).collect()
}
