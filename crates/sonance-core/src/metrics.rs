use std::collections::VecDeque;

use serde::Serialize;

const DEFAULT_HISTORY_CAPACITY: usize = 600;
const DEFAULT_EMIT_CADENCE_MS: u64 = 100;

/// A point-in-time metrics snapshot (spec §3). Subscribers receive
/// independent copies — this type is a plain value object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProcessingMetrics {
    pub noise_reduction_level: f32,
    pub processing_latency_ms: f32,
    pub input_level: f32,
    pub output_level: f32,
    pub peak_input_level: f32,
    pub peak_output_level: f32,
    pub frame_count: u64,
    pub dropped_frames: u64,
    pub vad: f32,
    pub timestamp_ms: u64,
}

impl Default for ProcessingMetrics {
    fn default() -> Self {
        Self {
            noise_reduction_level: 0.0,
            processing_latency_ms: 0.0,
            input_level: 0.0,
            output_level: 0.0,
            peak_input_level: 0.0,
            peak_output_level: 0.0,
            frame_count: 0,
            dropped_frames: 0,
            vad: 0.0,
            timestamp_ms: 0,
        }
    }
}

/// Per-stream RMS/peak/VAD/noise-reduction accounting (spec §4.4).
///
/// The current snapshot lives behind a `parking_lot::RwLock` rather than a
/// bespoke atomic-pointer scheme: the snapshot is a multi-field struct, not
/// a single word, so a torn read is only avoidable behind a real lock or an
/// `ArcSwap`; `parking_lot`'s uncontended fast path is cheap enough for the
/// audio thread to take on every metrics-cadence check.
pub struct MetricsManager {
    current: parking_lot::RwLock<ProcessingMetrics>,
    history: parking_lot::Mutex<VecDeque<ProcessingMetrics>>,
    history_capacity: usize,
    emit_cadence_ms: u64,
    last_emit_ms: std::sync::atomic::AtomicU64,
}

impl MetricsManager {
    pub fn new() -> Self {
        Self::with_capacity_and_cadence(DEFAULT_HISTORY_CAPACITY, DEFAULT_EMIT_CADENCE_MS)
    }

    pub fn with_capacity_and_cadence(history_capacity: usize, emit_cadence_ms: u64) -> Self {
        Self {
            current: parking_lot::RwLock::new(ProcessingMetrics::default()),
            history: parking_lot::Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            emit_cadence_ms,
            // u64::MAX is a sentinel for "never emitted" so the very first
            // poll always fires, regardless of what now_ms happens to be.
            last_emit_ms: std::sync::atomic::AtomicU64::new(u64::MAX),
        }
    }

    pub fn calculate_rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    pub fn calculate_peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |max, &s| max.max(s.abs()))
    }

    pub fn update_input_level(&self, level: f32) {
        let mut current = self.current.write();
        current.input_level = level;
        current.peak_input_level = current.peak_input_level.max(level);
    }

    pub fn update_output_level(&self, level: f32) {
        let mut current = self.current.write();
        current.output_level = level;
        current.peak_output_level = current.peak_output_level.max(level);
    }

    pub fn update_vad(&self, vad: f32) {
        self.current.write().vad = vad.clamp(0.0, 1.0);
    }

    pub fn update_noise_reduction(&self, percent: f32) {
        self.current.write().noise_reduction_level = percent.clamp(0.0, 100.0);
    }

    pub fn record_frame(&self, latency_ms: f32) {
        let mut current = self.current.write();
        current.frame_count += 1;
        current.processing_latency_ms = latency_ms;
    }

    pub fn record_dropped_frame(&self) {
        self.current.write().dropped_frames += 1;
    }

    /// Folds a closed chunk's aggregate metrics into the running snapshot.
    pub fn record_chunk(&self, average_vad: f32, noise_reduction_level: f32) {
        let mut current = self.current.write();
        current.vad = average_vad.clamp(0.0, 1.0);
        current.noise_reduction_level = noise_reduction_level.clamp(0.0, 100.0);
    }

    pub fn metrics(&self) -> ProcessingMetrics {
        *self.current.read()
    }

    pub fn history(&self) -> Vec<ProcessingMetrics> {
        self.history.lock().iter().copied().collect()
    }

    /// Stamps and snapshots the current metrics, pushing to history.
    /// Returns the stamped snapshot for callers that want to emit it
    /// immediately (e.g. on chunk close) without waiting for cadence.
    pub fn snapshot_now(&self, now_ms: u64) -> ProcessingMetrics {
        let mut current = self.current.write();
        current.timestamp_ms = current.timestamp_ms.max(now_ms);
        let snapshot = *current;
        drop(current);

        let mut history = self.history.lock();
        if history.len() == self.history_capacity {
            history.pop_front();
        }
        history.push_back(snapshot);
        snapshot
    }

    /// Returns `Some(snapshot)` and advances the cadence clock iff at least
    /// `emit_cadence_ms` has elapsed since the last emission — coalescing
    /// multiple updates into one `MetricsUpdate` event per spec §4.4,
    /// driven opportunistically from the audio callback path rather than a
    /// spawned timer thread.
    pub fn poll_cadence(&self, now_ms: u64) -> Option<ProcessingMetrics> {
        let last = self.last_emit_ms.load(std::sync::atomic::Ordering::Relaxed);
        if last != u64::MAX && now_ms.saturating_sub(last) < self.emit_cadence_ms {
            return None;
        }
        self.last_emit_ms.store(now_ms, std::sync::atomic::Ordering::Relaxed);
        Some(self.snapshot_now(now_ms))
    }
}

impl Default for MetricsManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(MetricsManager::calculate_rms(&[0.0; 480]), 0.0);
    }

    #[test]
    fn rms_of_constant_signal() {
        let samples = vec![0.5f32; 100];
        assert!((MetricsManager::calculate_rms(&samples) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn peak_picks_largest_magnitude() {
        let samples = vec![0.1, -0.9, 0.3, 0.2];
        assert!((MetricsManager::calculate_peak(&samples) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn values_stay_in_bounds() {
        let manager = MetricsManager::new();
        manager.update_vad(5.0);
        manager.update_noise_reduction(-10.0);
        let snapshot = manager.metrics();
        assert!((0.0..=1.0).contains(&snapshot.vad));
        assert!((0.0..=100.0).contains(&snapshot.noise_reduction_level));
    }

    #[test]
    fn history_is_bounded() {
        let manager = MetricsManager::with_capacity_and_cadence(3, 0);
        for t in 0..10u64 {
            manager.snapshot_now(t);
        }
        assert_eq!(manager.history().len(), 3);
    }

    #[test]
    fn snapshot_timestamps_never_regress() {
        let manager = MetricsManager::new();
        let s1 = manager.snapshot_now(100);
        let s2 = manager.snapshot_now(50); // out-of-order caller
        assert!(s2.timestamp_ms >= s1.timestamp_ms);
    }

    #[test]
    fn cadence_coalesces_rapid_updates() {
        let manager = MetricsManager::with_capacity_and_cadence(600, 100);
        assert!(manager.poll_cadence(0).is_some());
        assert!(manager.poll_cadence(10).is_none());
        assert!(manager.poll_cadence(50).is_none());
        assert!(manager.poll_cadence(101).is_some());
    }

    #[test]
    fn frame_count_monotonically_increases() {
        let manager = MetricsManager::new();
        manager.record_frame(1.0);
        manager.record_frame(1.0);
        assert_eq!(manager.metrics().frame_count, 2);
    }
}
