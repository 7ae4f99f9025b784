//! Chunk cutting, dual-track recording and per-chunk metrics (spec §4.3).
//! One `ChunkAssembler` instance lives per stream, fed one 480-sample
//! frame at a time by the Stream Controller.

pub mod encoder;

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

pub use encoder::{ChunkEncoder, WavChunkEncoder};

const FRAME_LEN: usize = 480;
const SAMPLES_PER_MS: u64 = 48;
const SILENCE_ENERGY_THRESHOLD: f32 = 0.001;
/// Residual shorter than half a chunk is dropped on flush (spec §4.3).
const RESIDUAL_FLUSH_RATIO: f32 = 0.5;

/// Aggregate metrics computed when a chunk closes (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChunkMetrics {
    pub noise_reduction_level: f32,
    pub average_input_energy: f32,
    pub average_output_energy: f32,
}

/// One frame's worth of pipeline output, as fed to the assembler (spec
/// §4.2 step 12).
pub struct FrameObservation<'a> {
    pub raw: &'a [f32; FRAME_LEN],
    pub processed: &'a [f32; FRAME_LEN],
    pub noise_reduction_percent: f32,
    pub vad: f32,
    pub peak_in: f32,
    pub peak_out: f32,
    pub input_rms: f32,
    pub output_rms: f32,
    pub avg_energy: f32,
}

/// A closed, immutable chunk of processed audio (spec §3). Never mutated
/// after construction.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub id: String,
    pub index: u64,
    pub start_time_ms: u64,
    pub end_time_ms: u64,
    pub duration_ms: u64,
    pub original_blob: Vec<u8>,
    pub processed_blob: Vec<u8>,
    pub original_size_bytes: usize,
    pub processed_size_bytes: usize,
    pub metrics: ChunkMetrics,
    pub average_vad: f32,
    pub vad_timeline: Vec<(f32, f32)>,
    pub is_valid: bool,
    pub error_message: Option<String>,
}

struct Accumulator {
    original_track: Vec<f32>,
    processed_track: Vec<f32>,
    sum_input_rms: f32,
    sum_output_rms: f32,
    sum_noise_reduction_percent: f32,
    silence_frames: u64,
    active_frames: u64,
    vad_timeline: Vec<(f32, f32)>,
    samples_accumulated: usize,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            original_track: Vec::new(),
            processed_track: Vec::new(),
            sum_input_rms: 0.0,
            sum_output_rms: 0.0,
            sum_noise_reduction_percent: 0.0,
            silence_frames: 0,
            active_frames: 0,
            vad_timeline: Vec::new(),
            samples_accumulated: 0,
        }
    }

    fn frames(&self) -> u64 {
        self.silence_frames + self.active_frames
    }
}

/// Cuts a stream's frames into fixed-duration chunks (spec §4.3).
pub struct ChunkAssembler {
    samples_per_chunk: usize,
    chunk_duration_ms: u32,
    encoder: Arc<dyn ChunkEncoder>,
    index: u64,
    total_samples_processed: u64,
    accumulator: Accumulator,
}

impl ChunkAssembler {
    pub fn new(chunk_duration_ms: u32) -> Self {
        Self::with_encoder(chunk_duration_ms, Arc::new(WavChunkEncoder::new()))
    }

    pub fn with_encoder(chunk_duration_ms: u32, encoder: Arc<dyn ChunkEncoder>) -> Self {
        let samples_per_chunk = (chunk_duration_ms as u64 * SAMPLES_PER_MS) as usize;
        Self {
            samples_per_chunk,
            chunk_duration_ms,
            encoder,
            index: 0,
            total_samples_processed: 0,
            accumulator: Accumulator::new(),
        }
    }

    /// Feeds one 480-sample frame's observation, returning a closed chunk
    /// once `samples_per_chunk` processed samples have accumulated.
    pub fn feed_frame(&mut self, observation: FrameObservation<'_>) -> Option<Chunk> {
        let start_time_ms = self.total_samples_processed / SAMPLES_PER_MS;

        self.accumulator.original_track.extend_from_slice(observation.raw);
        self.accumulator
            .processed_track
            .extend_from_slice(observation.processed);
        self.accumulator.sum_input_rms += observation.input_rms;
        self.accumulator.sum_output_rms += observation.output_rms;
        self.accumulator.sum_noise_reduction_percent += observation.noise_reduction_percent;
        if observation.avg_energy < SILENCE_ENERGY_THRESHOLD {
            self.accumulator.silence_frames += 1;
        } else {
            self.accumulator.active_frames += 1;
        }
        let time_sec = self.total_samples_processed as f32 / 48_000.0;
        self.accumulator.vad_timeline.push((time_sec, observation.vad));
        self.accumulator.samples_accumulated += FRAME_LEN;
        self.total_samples_processed += FRAME_LEN as u64;

        if self.accumulator.samples_accumulated >= self.samples_per_chunk {
            let end_time_ms = self.total_samples_processed / SAMPLES_PER_MS;
            return Some(self.close_chunk(start_time_ms, end_time_ms, true));
        }
        None
    }

    /// Flushes any residual partial chunk (spec §4.3 stop policy): a
    /// residual shorter than half a chunk duration is dropped entirely.
    pub fn flush(&mut self) -> Option<Chunk> {
        if self.accumulator.frames() == 0 {
            return None;
        }
        let duration_ms = self.accumulator.samples_accumulated as u64 / SAMPLES_PER_MS;
        if (duration_ms as f32) < RESIDUAL_FLUSH_RATIO * self.chunk_duration_ms as f32 {
            self.accumulator = Accumulator::new();
            return None;
        }
        let end_time_ms = self.total_samples_processed / SAMPLES_PER_MS;
        let start_time_ms = end_time_ms - duration_ms;
        Some(self.close_chunk(start_time_ms, end_time_ms, false))
    }

    fn close_chunk(&mut self, start_time_ms: u64, end_time_ms: u64, is_full: bool) -> Chunk {
        let accumulator = std::mem::replace(&mut self.accumulator, Accumulator::new());
        let frames = accumulator.frames().max(1);

        let original_blob = self.encoder.encode(&accumulator.original_track, 48_000);
        let processed_blob = self.encoder.encode(&accumulator.processed_track, 48_000);

        let noise_reduction_level = accumulator.sum_noise_reduction_percent / frames as f32;
        let average_input_energy = accumulator.sum_input_rms / frames as f32;
        let average_output_energy = accumulator.sum_output_rms / frames as f32;
        let average_vad = if accumulator.vad_timeline.is_empty() {
            0.0
        } else {
            accumulator.vad_timeline.iter().map(|(_, v)| v).sum::<f32>()
                / accumulator.vad_timeline.len() as f32
        };

        let duration_ms = if is_full {
            self.chunk_duration_ms as u64
        } else {
            end_time_ms - start_time_ms
        };

        let is_valid = !original_blob.is_empty()
            && !processed_blob.is_empty()
            && accumulator.frames() > 0;

        let chunk = Chunk {
            id: Uuid::new_v4().to_string(),
            index: self.index,
            start_time_ms,
            end_time_ms,
            duration_ms,
            original_size_bytes: original_blob.len(),
            processed_size_bytes: processed_blob.len(),
            original_blob,
            processed_blob,
            metrics: ChunkMetrics {
                noise_reduction_level,
                average_input_energy,
                average_output_energy,
            },
            average_vad,
            vad_timeline: accumulator.vad_timeline,
            is_valid,
            error_message: None,
        };
        self.index += 1;
        chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation<'a>(raw: &'a [f32; FRAME_LEN], processed: &'a [f32; FRAME_LEN]) -> FrameObservation<'a> {
        FrameObservation {
            raw,
            processed,
            noise_reduction_percent: 10.0,
            vad: 0.8,
            peak_in: 0.5,
            peak_out: 0.4,
            input_rms: 0.3,
            output_rms: 0.25,
            avg_energy: 0.01,
        }
    }

    #[test]
    fn closes_a_chunk_at_the_duration_boundary() {
        let mut assembler = ChunkAssembler::new(100); // 100ms = 4800 samples = 10 frames
        let raw = [0.1f32; FRAME_LEN];
        let processed = [0.08f32; FRAME_LEN];
        let mut chunk = None;
        for _ in 0..10 {
            chunk = assembler.feed_frame(observation(&raw, &processed));
        }
        let chunk = chunk.expect("chunk should close at the 10th frame");
        assert_eq!(chunk.index, 0);
        assert_eq!(chunk.duration_ms, 100);
        assert!(chunk.is_valid);
    }

    #[test]
    fn indices_increase_monotonically() {
        let mut assembler = ChunkAssembler::new(10); // 1 frame per chunk
        let raw = [0.1f32; FRAME_LEN];
        let processed = [0.08f32; FRAME_LEN];
        let first = assembler.feed_frame(observation(&raw, &processed)).unwrap();
        let second = assembler.feed_frame(observation(&raw, &processed)).unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert_eq!(second.start_time_ms, first.end_time_ms);
    }

    #[test]
    fn residual_shorter_than_half_a_chunk_is_dropped() {
        let mut assembler = ChunkAssembler::new(1000); // 100 frames per chunk
        let raw = [0.1f32; FRAME_LEN];
        let processed = [0.08f32; FRAME_LEN];
        for _ in 0..10 {
            // 100ms of residual, well under 500ms threshold
            assembler.feed_frame(observation(&raw, &processed));
        }
        assert!(assembler.flush().is_none());
    }

    #[test]
    fn residual_at_least_half_a_chunk_is_flushed() {
        let mut assembler = ChunkAssembler::new(1000); // 100 frames per chunk
        let raw = [0.1f32; FRAME_LEN];
        let processed = [0.08f32; FRAME_LEN];
        for _ in 0..60 {
            // 600ms of residual, over the 500ms threshold
            assembler.feed_frame(observation(&raw, &processed));
        }
        let chunk = assembler.flush().expect("residual should flush");
        assert_eq!(chunk.duration_ms, 600);
        assert!(chunk.is_valid);
    }

    #[test]
    fn vad_timeline_has_one_sample_per_frame() {
        let mut assembler = ChunkAssembler::new(100);
        let raw = [0.1f32; FRAME_LEN];
        let processed = [0.08f32; FRAME_LEN];
        let chunk = (0..10)
            .filter_map(|_| assembler.feed_frame(observation(&raw, &processed)))
            .next()
            .unwrap();
        assert_eq!(chunk.vad_timeline.len(), 10);
    }
}
