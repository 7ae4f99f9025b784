//! Energy-gated post-processor (spec §4.2 steps 8-10): the denoiser
//! preserves some stationary noise floor, so a gate driven by a rolling
//! energy history sharpens silence and further suppresses noise-like
//! frames.

use std::collections::VecDeque;

const ENERGY_HISTORY_LEN: usize = 20;
const SILENCE_THRESHOLD: f32 = 0.001;
const LOW_ENERGY_THRESHOLD: f32 = 0.005;
const REDUCTION_RATIO_FLOOR: f32 = 0.3;

/// Rolling energy history used to decide gate attenuation.
#[derive(Debug, Clone)]
pub struct EnergyHistory {
    window: VecDeque<f32>,
}

impl EnergyHistory {
    pub fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(ENERGY_HISTORY_LEN),
        }
    }

    pub fn push(&mut self, rms: f32) -> f32 {
        if self.window.len() == ENERGY_HISTORY_LEN {
            self.window.pop_front();
        }
        self.window.push_back(rms);
        self.average()
    }

    pub fn average(&self) -> f32 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f32>() / self.window.len() as f32
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

impl Default for EnergyHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of applying the post-gate to one frame (spec §4.2 steps 9-10).
#[derive(Debug, Clone, Copy)]
pub struct GateOutcome {
    pub avg_energy: f32,
    pub reduction_ratio: f32,
    pub noise_reduction_percent: f32,
}

/// Applies the post-gate to `frame` in place given the frame's pre/post
/// denoise RMS and the rolling average energy, returning the computed
/// outcome for metrics/chunk bookkeeping.
pub fn apply_post_gate(frame: &mut [f32], input_rms: f32, output_rms: f32, avg_energy: f32) -> GateOutcome {
    let attenuation = if avg_energy < SILENCE_THRESHOLD {
        0.1
    } else if avg_energy < LOW_ENERGY_THRESHOLD {
        let span = LOW_ENERGY_THRESHOLD - SILENCE_THRESHOLD;
        let t = (avg_energy - SILENCE_THRESHOLD) / span;
        0.1 + t * 0.9
    } else {
        1.0
    };

    if attenuation != 1.0 {
        for sample in frame.iter_mut() {
            *sample *= attenuation;
        }
    }

    // With no input signal there is nothing to reduce: without this, silence
    // (input_rms == output_rms == 0) would compute reduction_ratio == 0 and
    // report 100% noise reduction, which spec §8 scenario S4 rules out.
    let reduction_ratio = if input_rms < SILENCE_THRESHOLD {
        1.0
    } else {
        output_rms / (input_rms + 1e-4)
    };

    if reduction_ratio < REDUCTION_RATIO_FLOOR && avg_energy < LOW_ENERGY_THRESHOLD {
        for sample in frame.iter_mut() {
            *sample *= reduction_ratio;
        }
    }

    let noise_reduction_percent = ((1.0 - reduction_ratio) * 100.0).clamp(0.0, 100.0);

    GateOutcome {
        avg_energy,
        reduction_ratio,
        noise_reduction_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_attenuates_deep_silence() {
        let mut frame = vec![1.0f32; 480];
        let outcome = apply_post_gate(&mut frame, 1.0, 1.0, 0.0005);
        assert!((frame[0] - 0.1).abs() < 1e-6);
        assert!((outcome.avg_energy - 0.0005).abs() < 1e-6);
    }

    #[test]
    fn interpolates_in_the_low_energy_band() {
        let mid = (SILENCE_THRESHOLD + LOW_ENERGY_THRESHOLD) / 2.0;
        let mut frame = vec![1.0f32; 480];
        apply_post_gate(&mut frame, 1.0, 1.0, mid);
        assert!(frame[0] > 0.1 && frame[0] < 1.0);
    }

    #[test]
    fn leaves_loud_frames_unchanged() {
        let mut frame = vec![0.5f32; 480];
        apply_post_gate(&mut frame, 0.5, 0.5, 0.05);
        assert!((frame[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn suppresses_noise_like_frames_further() {
        let mut frame = vec![1.0f32; 480];
        // output_rms << input_rms and avg_energy below the low-energy
        // threshold: reduction_ratio < 0.3 triggers the extra suppression.
        apply_post_gate(&mut frame, 1.0, 0.1, 0.0005);
        assert!(frame[0] < 0.1, "expected extra suppression, got {}", frame[0]);
    }

    #[test]
    fn true_silence_reports_zero_noise_reduction() {
        let mut frame = vec![0.0f32; 480];
        let outcome = apply_post_gate(&mut frame, 0.0, 0.0, 0.0);
        assert_eq!(outcome.noise_reduction_percent, 0.0);
    }

    #[test]
    fn noise_reduction_percent_is_clamped() {
        let mut frame = vec![1.0f32; 480];
        let outcome = apply_post_gate(&mut frame, 0.0001, 1.0, 0.05);
        assert!((0.0..=100.0).contains(&outcome.noise_reduction_percent));
    }

    #[test]
    fn energy_history_tracks_rolling_average() {
        let mut history = EnergyHistory::new();
        for _ in 0..30 {
            history.push(1.0);
        }
        assert!((history.average() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn energy_history_is_bounded() {
        let mut history = EnergyHistory::new();
        for i in 0..50 {
            history.push(i as f32);
        }
        assert_eq!(history.window.len(), ENERGY_HISTORY_LEN);
    }
}
