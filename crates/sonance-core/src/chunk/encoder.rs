//! The `ChunkEncoder` collaborator (spec §4.3, §6): the assembler is
//! agnostic to the container a chunk's audio is stored in. The default
//! implementation reuses the file-mode WAV framing so tests and any host
//! that doesn't supply its own encoder get a playable artifact for free.

use crate::wav;

/// Encodes a float sample track into a container's byte representation.
/// Must be deterministic for identical inputs (spec §6).
pub trait ChunkEncoder: Send + Sync {
    fn encode(&self, samples: &[f32], sample_rate: u32) -> Vec<u8>;
}

/// Encodes tracks as 16-bit PCM WAV, grounded in the same header-writing
/// routine file mode uses.
pub struct WavChunkEncoder;

impl WavChunkEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WavChunkEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkEncoder for WavChunkEncoder {
    fn encode(&self, samples: &[f32], sample_rate: u32) -> Vec<u8> {
        let pcm = wav::floats_to_i16(samples);
        wav::write_wav(&pcm, sample_rate)
    }
}
