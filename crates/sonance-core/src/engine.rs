//! Engine & Lifecycle (spec §4.1): owns the denoiser module, the shared
//! metrics manager and event bus, and the registry of active stream
//! controllers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::agc::Agc;
use crate::config::{ChunkOptions, EngineConfig};
use crate::denoiser::{self, DenoiserModule};
use crate::error::{EngineError, ErrorHistory, ErrorRecord};
use crate::events::{Event, EventBus, EventKind, SubscriptionId};
use crate::metrics::MetricsManager;
use crate::resample;
use crate::state::EngineState;
use crate::stream::{StreamController, StreamId};
use crate::wav;

const WARMUP_FRAMES: usize = 10;

/// Read-only health snapshot (ambient addition, spec §3).
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub engine_state: EngineState,
    pub denoiser_loaded: bool,
    pub active_streams: usize,
    pub memory_usage_bytes_hint: usize,
    pub version: &'static str,
    pub recent_errors: Vec<ErrorRecord>,
    pub last_error: Option<ErrorRecord>,
}

struct Inner {
    state: EngineState,
    config: EngineConfig,
    denoiser: Option<Arc<dyn DenoiserModule>>,
    streams: HashMap<StreamId, StreamController>,
    /// Insertion order, since a host may force-`destroy` with multiple
    /// active streams and spec §4.1 requires declaration order.
    stream_order: Vec<StreamId>,
    error_history: ErrorHistory,
    /// The most recently recorded error, cleared by `reset_error()` without
    /// touching `error_history` (spec §7).
    last_error: Option<ErrorRecord>,
    cleanup_armed: bool,
}

/// The engine's public API surface (spec §4.1). Internally guarded by a
/// single `parking_lot::Mutex` that the audio callback path never takes —
/// `process_block` runs entirely against the `StreamController` it was
/// handed at `process_stream` time.
pub struct Engine {
    inner: Mutex<Inner>,
    metrics: Arc<MetricsManager>,
    events: Arc<EventBus>,
    clock_ms: AtomicU64,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: EngineState::Uninitialized,
                config: config.validated(),
                denoiser: None,
                streams: HashMap::new(),
                stream_order: Vec::new(),
                error_history: ErrorHistory::new(),
                last_error: None,
                cleanup_armed: false,
            }),
            metrics: Arc::new(MetricsManager::new()),
            events: Arc::new(EventBus::new()),
            clock_ms: AtomicU64::new(0),
        }
    }

    /// Advances the engine's internal monotonic clock (ms), used to stamp
    /// metrics snapshots and error records. A host that drives
    /// `process_block` from its audio thread calls this opportunistically
    /// with wall-clock time; tests can drive it directly.
    pub fn advance_clock(&self, now_ms: u64) {
        self.clock_ms.fetch_max(now_ms, Ordering::Relaxed);
    }

    fn now_ms(&self) -> u64 {
        self.clock_ms.load(Ordering::Relaxed)
    }

    fn transition(&self, inner: &mut Inner, to: EngineState) -> Result<(), EngineError> {
        if !inner.state.can_transition_to(to) {
            return Err(EngineError::InvalidState { from: inner.state, to });
        }
        let from = inner.state;
        inner.state = to;
        tracing::info!(?from, ?to, "engine state transition");
        self.events.emit(&Event::StateChange(from, to));
        Ok(())
    }

    /// Initializes the engine: loads the denoiser, warms it up, and moves
    /// to `Ready` (or `Degraded` if the load fails and degraded mode is
    /// allowed). At-most-one-initialization: concurrent callers all block
    /// on the same `inner` mutex rather than racing independent loads.
    pub fn initialize(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        if inner.state != EngineState::Uninitialized {
            return Err(EngineError::AlreadyInitialized);
        }
        self.transition(&mut inner, EngineState::Initializing)?;

        match denoiser::load_denoiser() {
            Ok(module) => {
                module.warmup(WARMUP_FRAMES);
                inner.denoiser = Some(Arc::from(module));
                self.transition(&mut inner, EngineState::Ready)?;
                Ok(())
            }
            Err(reason) if inner.config.allow_degraded => {
                tracing::warn!(%reason, "denoiser load failed, entering degraded mode");
                inner.denoiser = Some(Arc::from(denoiser::load_noop_denoiser()));
                self.transition(&mut inner, EngineState::Degraded)?;
                self.events.emit(&Event::DegradedMode);
                Ok(())
            }
            Err(reason) => {
                self.transition(&mut inner, EngineState::Error)?;
                let err = EngineError::InitializationFailed(reason);
                self.record_error(&mut inner, &err);
                Err(err)
            }
        }
    }

    fn record_error(&self, inner: &mut Inner, err: &EngineError) {
        let record = ErrorRecord::from_error(self.now_ms(), err);
        tracing::error!(kind = %record.kind, message = %record.message, "engine error");
        inner.error_history.push(record.clone());
        inner.last_error = Some(record.clone());
        self.events.emit(&Event::Error(record));
    }

    /// Clears the last-surfaced error flag without touching error history
    /// (spec §7).
    pub fn reset_error(&self) {
        self.inner.lock().last_error = None;
    }

    /// Allocates a new stream controller and transitions the engine to
    /// `Processing` (spec §4.1).
    pub fn process_stream(
        &self,
        chunk_options: Option<ChunkOptions>,
    ) -> Result<StreamId, EngineError> {
        let mut inner = self.inner.lock();
        let allowed = matches!(
            inner.state,
            EngineState::Ready | EngineState::Processing | EngineState::Paused | EngineState::Degraded
        );
        if !allowed {
            return Err(EngineError::InvalidState {
                from: inner.state,
                to: EngineState::Processing,
            });
        }
        let denoiser = inner
            .denoiser
            .clone()
            .ok_or(EngineError::InitializationFailed("denoiser not loaded".to_string()))?;

        let agc = if inner.config.agc_enabled {
            Some(Agc::new(inner.config.agc_target_level, inner.config.agc_max_gain))
        } else {
            None
        };

        let controller = StreamController::new(
            inner.config.buffer_size as usize,
            inner.config.input_gain,
            agc,
            denoiser,
            chunk_options.and_then(|o| o.chunk_duration_ms),
            Arc::clone(&self.metrics),
        );
        let id = controller.stream_id();
        inner.streams.insert(id, controller);
        inner.stream_order.push(id);
        inner.cleanup_armed = false;

        if inner.state != EngineState::Processing {
            self.transition(&mut inner, EngineState::Processing)?;
        }
        self.events.emit(&Event::ProcessingStart(id));
        Ok(id)
    }

    /// Runs `body` against the named stream's controller while the engine
    /// lock is held. The audio callback path should prefer holding its own
    /// `StreamController` handle directly rather than routing through
    /// here; this exists for host code that only has a `StreamId`.
    pub fn with_stream<R>(
        &self,
        id: StreamId,
        body: impl FnOnce(&mut StreamController) -> R,
    ) -> Result<R, EngineError> {
        let mut inner = self.inner.lock();
        let controller = inner
            .streams
            .get_mut(&id)
            .ok_or_else(|| EngineError::InternalProcessingFault(format!("unknown stream {id}")))?;
        Ok(body(controller))
    }

    /// Pauses every active stream and moves the engine to `Paused` (spec
    /// §3's `Processing -> Paused` row).
    pub fn pause(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, EngineState::Paused)?;
        for controller in inner.streams.values() {
            controller.pause();
        }
        Ok(())
    }

    /// Resumes every active stream and moves the engine back to
    /// `Processing` (spec §3's `Paused -> Processing` row).
    pub fn resume(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, EngineState::Processing)?;
        for controller in inner.streams.values() {
            controller.resume();
        }
        Ok(())
    }

    pub fn stop_stream(&self, id: StreamId) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        if let Some(mut controller) = inner.streams.remove(&id) {
            if let Some(chunk) = controller.stop() {
                self.events.emit(&Event::Chunk(chunk));
            }
        }
        inner.stream_order.retain(|existing| *existing != id);
        self.events.emit(&Event::ProcessingEnd(id));
        if inner.streams.is_empty() && inner.config.auto_cleanup {
            inner.cleanup_armed = true;
        }
        Ok(())
    }

    pub fn set_input_gain(&self, gain: f32) {
        let mut inner = self.inner.lock();
        for controller in inner.streams.values_mut() {
            controller.set_input_gain(gain.clamp(0.5, 10.0));
        }
    }

    pub fn set_agc_enabled(&self, enabled: bool) {
        let mut inner = self.inner.lock();
        for controller in inner.streams.values_mut() {
            controller.set_agc_enabled(enabled);
        }
    }

    pub fn set_agc_target_level(&self, target: f32) {
        let mut inner = self.inner.lock();
        for controller in inner.streams.values_mut() {
            controller.set_agc_target_level(target.clamp(f32::EPSILON, 1.0));
        }
    }

    /// Runs a whole file through the same frame pipeline a live stream
    /// would use, with no chunking (spec §4.1).
    pub fn process_file(&self, bytes: &[u8]) -> Result<Vec<u8>, EngineError> {
        let parsed = wav::parse_wav(bytes)?;
        let mut samples = wav::i16_to_floats(&parsed.samples);
        if parsed.sample_rate != resample::TARGET_SAMPLE_RATE_HZ {
            samples = resample::resample_linear(&samples, parsed.sample_rate)
                .map_err(EngineError::ResamplingFailed)?;
        }

        let denoiser = {
            let inner = self.inner.lock();
            inner
                .denoiser
                .clone()
                .ok_or(EngineError::InitializationFailed("denoiser not loaded".to_string()))?
        };

        let mut controller = StreamController::new(
            resample::TARGET_SAMPLE_RATE_HZ as usize,
            1.0,
            None,
            denoiser,
            None,
            Arc::clone(&self.metrics),
        );

        let mut output = Vec::with_capacity(samples.len());
        let block = controller.buffer_size();
        for chunk in samples.chunks(block) {
            let result = controller.process_block(chunk);
            output.extend_from_slice(&result.samples);
        }
        // Flush any samples still sitting in the ring by pushing trailing
        // silence until the input ring drains.
        let flush_block = vec![0.0f32; block];
        for _ in 0..((crate::denoiser::FRAME_LEN + block - 1) / block) {
            let result = controller.process_block(&flush_block);
            output.extend_from_slice(&result.samples);
        }
        output.truncate(samples.len());

        let pcm = wav::floats_to_i16(&output);
        Ok(wav::write_wav(&pcm, resample::TARGET_SAMPLE_RATE_HZ))
    }

    /// Tears the engine down. With active streams and `force=false`, fails
    /// fast; otherwise stops every stream in declaration order.
    pub fn destroy(&self, force: bool) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        if !inner.streams.is_empty() && !force {
            return Err(EngineError::ActiveStreamsPresent(inner.streams.len()));
        }
        self.transition(&mut inner, EngineState::Destroying)?;

        let ids: Vec<StreamId> = std::mem::take(&mut inner.stream_order);
        for id in ids {
            if let Some(mut controller) = inner.streams.remove(&id) {
                if let Some(chunk) = controller.stop() {
                    self.events.emit(&Event::Chunk(chunk));
                }
            }
            self.events.emit(&Event::ProcessingEnd(id));
        }
        inner.denoiser = None;
        inner.cleanup_armed = false;

        self.transition(&mut inner, EngineState::Destroyed)?;
        self.events.emit(&Event::Destroyed);
        Ok(())
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let inner = self.inner.lock();
        Diagnostics {
            engine_state: inner.state,
            denoiser_loaded: inner.denoiser.is_some(),
            active_streams: inner.streams.len(),
            memory_usage_bytes_hint: inner.streams.len() * inner.config.buffer_size as usize * 4,
            version: env!("CARGO_PKG_VERSION"),
            recent_errors: inner.error_history.recent(),
            last_error: inner.last_error.clone(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.inner.lock().state
    }

    pub fn on(&self, kind: EventKind, callback: crate::events::Callback) -> SubscriptionId {
        self.events.on(kind, callback)
    }

    pub fn off(&self, id: SubscriptionId) {
        self.events.off(id);
    }

    pub fn metrics(&self) -> Arc<MetricsManager> {
        Arc::clone(&self.metrics)
    }

    /// Polls the metrics cadence and emits a `MetricsUpdate` if due. A host
    /// calls this opportunistically from its audio callback path (spec
    /// §4.4); it is never driven by a spawned timer thread.
    pub fn poll_metrics(&self) {
        if let Some(snapshot) = self.metrics.poll_cadence(self.now_ms()) {
            self.events.emit(&Event::MetricsUpdate(snapshot));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializes_into_ready_state() {
        let engine = Engine::new(EngineConfig::default());
        engine.initialize().unwrap();
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[test]
    fn double_initialize_fails() {
        let engine = Engine::new(EngineConfig::default());
        engine.initialize().unwrap();
        assert!(matches!(engine.initialize(), Err(EngineError::AlreadyInitialized)));
    }

    #[test]
    fn process_stream_requires_ready_state() {
        let engine = Engine::new(EngineConfig::default());
        assert!(engine.process_stream(None).is_err());
    }

    #[test]
    fn process_stream_transitions_to_processing() {
        let engine = Engine::new(EngineConfig::default());
        engine.initialize().unwrap();
        engine.process_stream(None).unwrap();
        assert_eq!(engine.state(), EngineState::Processing);
    }

    #[test]
    fn destroy_with_active_streams_fails_without_force() {
        let engine = Engine::new(EngineConfig::default());
        engine.initialize().unwrap();
        engine.process_stream(None).unwrap();
        assert!(matches!(
            engine.destroy(false),
            Err(EngineError::ActiveStreamsPresent(1))
        ));
    }

    #[test]
    fn destroy_with_force_stops_all_streams() {
        let engine = Engine::new(EngineConfig::default());
        engine.initialize().unwrap();
        engine.process_stream(None).unwrap();
        engine.destroy(true).unwrap();
        assert_eq!(engine.state(), EngineState::Destroyed);
    }

    #[test]
    fn degraded_mode_emits_once_and_still_allows_processing() {
        // Exercises the `Initializing -> Degraded` branch directly, since
        // `denoiser::load_denoiser` never fails in this build (see its doc
        // comment) — a host with a backend that can genuinely fail to load
        // would hit this same path through `initialize()`.
        let engine = Engine::new(EngineConfig {
            allow_degraded: true,
            ..EngineConfig::default()
        });
        let degraded_events = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&degraded_events);
        engine.on(
            EventKind::DegradedMode,
            Box::new(move |_| *counter.lock() += 1),
        );

        {
            let mut inner = engine.inner.lock();
            engine.transition(&mut inner, EngineState::Initializing).unwrap();
            inner.denoiser = Some(Arc::from(denoiser::load_noop_denoiser()));
            engine.transition(&mut inner, EngineState::Degraded).unwrap();
        }
        engine.events.emit(&Event::DegradedMode);

        assert_eq!(engine.state(), EngineState::Degraded);
        assert_eq!(*degraded_events.lock(), 1);

        let stream_id = engine.process_stream(None).unwrap();
        let output = engine
            .with_stream(stream_id, |controller| controller.process_block(&[0.3; 480]))
            .unwrap();
        assert_eq!(output.samples.len(), 480);
    }

    #[test]
    fn process_file_round_trips_through_wav() {
        let engine = Engine::new(EngineConfig::default());
        engine.initialize().unwrap();
        let input_samples = vec![100i16; 4800];
        let input_wav = wav::write_wav(&input_samples, 48_000);
        let output_wav = engine.process_file(&input_wav).unwrap();
        let parsed = wav::parse_wav(&output_wav).unwrap();
        assert_eq!(parsed.sample_rate, 48_000);
        assert_eq!(parsed.samples.len(), input_samples.len());
    }

    #[test]
    fn subscribers_receive_state_change_events() {
        let engine = Engine::new(EngineConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        engine.on(
            EventKind::StateChange,
            Box::new(move |event| {
                if let Event::StateChange(from, to) = event {
                    seen_clone.lock().push((*from, *to));
                }
            }),
        );
        engine.initialize().unwrap();
        assert!(!seen.lock().is_empty());
    }

    #[test]
    fn pause_and_resume_toggle_engine_and_stream_state() {
        let engine = Engine::new(EngineConfig::default());
        engine.initialize().unwrap();
        let stream_id = engine.process_stream(None).unwrap();

        engine.pause().unwrap();
        assert_eq!(engine.state(), EngineState::Paused);
        engine
            .with_stream(stream_id, |controller| {
                assert_eq!(controller.state(), crate::stream::StreamState::Paused);
            })
            .unwrap();

        engine.resume().unwrap();
        assert_eq!(engine.state(), EngineState::Processing);
        engine
            .with_stream(stream_id, |controller| {
                assert_eq!(controller.state(), crate::stream::StreamState::Processing);
            })
            .unwrap();
    }

    #[test]
    fn reset_error_clears_flag_but_preserves_history() {
        let engine = Engine::new(EngineConfig::default());
        {
            let mut inner = engine.inner.lock();
            let err = EngineError::CleanupFailed("test".to_string());
            engine.record_error(&mut inner, &err);
        }
        assert!(engine.diagnostics().last_error.is_some());
        assert_eq!(engine.diagnostics().recent_errors.len(), 1);

        engine.reset_error();
        assert!(engine.diagnostics().last_error.is_none());
        assert_eq!(engine.diagnostics().recent_errors.len(), 1);
    }
}
