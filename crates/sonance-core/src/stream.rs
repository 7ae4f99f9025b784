//! Stream Controller (spec §4.5): one per active stream, owns the ring
//! buffers, filter chain, optional AGC and optional chunk assembler, and
//! runs the 12-step frame pipeline (spec §4.2) on the audio callback path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use uuid::Uuid;

use crate::agc::Agc;
use crate::chunk::{Chunk, ChunkAssembler, FrameObservation};
use crate::denoiser::{DenoiserHandle, DenoiserModule, FRAME_LEN};
use crate::filters::FilterChain;
use crate::gate::{self, EnergyHistory};
use crate::metrics::MetricsManager;
use crate::ring::{self, RingConsumer, RingProducer};

/// Uniquely identifies a stream for the lifetime of the engine (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StreamId(Uuid);

impl StreamId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

const STATE_PROCESSING: u8 = 0;
const STATE_PAUSED: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// Local stream lifecycle (spec §4.5): `Created → Processing ↔ Paused →
/// Stopped`. Represented as an `AtomicU8` so the audio callback path never
/// takes a lock to check it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamState {
    Processing,
    Paused,
    Stopped,
}

fn decode_state(value: u8) -> StreamState {
    match value {
        STATE_PROCESSING => StreamState::Processing,
        STATE_PAUSED => StreamState::Paused,
        _ => StreamState::Stopped,
    }
}

/// Result of one `process_block` call: the produced output samples plus
/// any chunk closed while processing this block.
pub struct BlockOutput {
    pub samples: Vec<f32>,
    pub chunks: Vec<Chunk>,
}

/// One active stream's owned pipeline state (spec §4.5).
pub struct StreamController {
    id: StreamId,
    state: AtomicU8,
    input_gain: f32,
    input_producer: RingProducer,
    input_consumer: RingConsumer,
    output_producer: RingProducer,
    output_consumer: RingConsumer,
    filter_chain: FilterChain,
    agc: Option<Agc>,
    denoiser: Arc<dyn DenoiserModule>,
    denoiser_handle: DenoiserHandle,
    energy_history: EnergyHistory,
    chunk_assembler: Option<ChunkAssembler>,
    metrics: Arc<MetricsManager>,
    buffer_size: usize,
}

impl StreamController {
    pub fn new(
        buffer_size: usize,
        input_gain: f32,
        agc: Option<Agc>,
        denoiser: Arc<dyn DenoiserModule>,
        chunk_duration_ms: Option<u32>,
        metrics: Arc<MetricsManager>,
    ) -> Self {
        let (input_producer, input_consumer) = ring::new_ring(buffer_size);
        let (output_producer, output_consumer) = ring::new_ring(buffer_size);
        let denoiser_handle = denoiser.create_state();

        Self {
            id: StreamId::new(),
            state: AtomicU8::new(STATE_PROCESSING),
            input_gain,
            input_producer,
            input_consumer,
            output_producer,
            output_consumer,
            filter_chain: FilterChain::new(),
            agc,
            denoiser,
            denoiser_handle,
            energy_history: EnergyHistory::new(),
            chunk_assembler: chunk_duration_ms.map(ChunkAssembler::new),
            metrics,
            buffer_size,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.id
    }

    pub fn state(&self) -> StreamState {
        decode_state(self.state.load(Ordering::Relaxed))
    }

    pub fn pause(&self) {
        self.state
            .compare_exchange(STATE_PROCESSING, STATE_PAUSED, Ordering::Relaxed, Ordering::Relaxed)
            .ok();
    }

    pub fn resume(&self) {
        self.state
            .compare_exchange(STATE_PAUSED, STATE_PROCESSING, Ordering::Relaxed, Ordering::Relaxed)
            .ok();
    }

    pub fn set_input_gain(&mut self, gain: f32) {
        self.input_gain = gain.clamp(0.5, 10.0);
    }

    pub fn set_agc_enabled(&mut self, enabled: bool) {
        if enabled && self.agc.is_none() {
            self.agc = Some(Agc::new(0.2, 4.0));
        } else if !enabled {
            self.agc = None;
        }
    }

    pub fn set_agc_target_level(&mut self, target: f32) {
        if let Some(agc) = self.agc.as_mut() {
            agc.set_target_level(target.clamp(f32::EPSILON, 1.0));
        }
    }

    /// Runs the full 12-step frame pipeline (spec §4.2) over one host block
    /// of `input` samples, never blocking: an output-ring underflow is
    /// filled with silence and counted as dropped frames instead.
    pub fn process_block(&mut self, input: &[f32]) -> BlockOutput {
        if self.state() != StreamState::Processing {
            return BlockOutput {
                samples: vec![0.0; input.len()],
                chunks: Vec::new(),
            };
        }

        // Step 1-2: apply input gain, push into the input ring.
        let mut gained = input.to_vec();
        for sample in gained.iter_mut() {
            *sample *= self.input_gain;
        }
        let written = self.input_producer.push_slice(&gained);
        if written < gained.len() {
            self.metrics.record_dropped_frame();
        }

        let mut chunks = Vec::new();

        // Step 3-12: drain complete 480-sample frames and run the pipeline.
        while self.input_consumer.len() >= FRAME_LEN {
            let mut raw = [0.0f32; FRAME_LEN];
            self.input_consumer.pop_frame(&mut raw);
            let input_rms = MetricsManager::calculate_rms(&raw);
            let peak_in = MetricsManager::calculate_peak(&raw);

            let mut frame = raw;
            self.filter_chain.process_in_place(&mut frame);
            if let Some(agc) = self.agc.as_mut() {
                agc.process_in_place(&mut frame);
            }

            let vad = self
                .denoiser
                .process_frame(&mut self.denoiser_handle, &mut frame);

            let output_rms = MetricsManager::calculate_rms(&frame);
            let peak_out = MetricsManager::calculate_peak(&frame);
            let avg_energy = self.energy_history.push(input_rms);

            let outcome = gate::apply_post_gate(&mut frame, input_rms, output_rms, avg_energy);

            self.metrics.update_input_level(input_rms);
            self.metrics.update_output_level(output_rms);
            self.metrics.update_vad(vad);
            self.metrics.update_noise_reduction(outcome.noise_reduction_percent);
            self.metrics.record_frame(0.0);

            self.output_producer.push_slice(&frame);

            if let Some(assembler) = self.chunk_assembler.as_mut() {
                let observation = FrameObservation {
                    raw: &raw,
                    processed: &frame,
                    noise_reduction_percent: outcome.noise_reduction_percent,
                    vad,
                    peak_in,
                    peak_out,
                    input_rms,
                    output_rms,
                    avg_energy,
                };
                if let Some(chunk) = assembler.feed_frame(observation) {
                    self.metrics.record_chunk(chunk.average_vad, chunk.metrics.noise_reduction_level);
                    chunks.push(chunk);
                }
            }
        }

        let mut out = vec![0.0f32; input.len()];
        let deficit = self.output_consumer.drain_into(&mut out);
        for _ in 0..deficit {
            self.metrics.record_dropped_frame();
        }

        BlockOutput { samples: out, chunks }
    }

    /// Stops the stream: idempotent after the first call. Flushes any
    /// residual chunk per spec §4.3's stop policy.
    pub fn stop(&mut self) -> Option<Chunk> {
        let was_running = self.state.swap(STATE_STOPPED, Ordering::Relaxed) != STATE_STOPPED;
        if !was_running {
            return None;
        }
        self.chunk_assembler.as_mut().and_then(ChunkAssembler::flush)
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        let handle = std::mem::replace(&mut self.denoiser_handle, self.denoiser.create_state());
        self.denoiser.destroy_state(handle);
    }
}
