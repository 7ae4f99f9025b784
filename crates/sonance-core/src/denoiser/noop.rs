//! Degraded-mode denoiser: passes audio through unchanged. Used when the
//! real denoiser fails to load (spec §4.1's `Degraded` lifecycle branch).

use super::{DenoiserHandle, DenoiserModule, FRAME_LEN};
use crate::metrics::MetricsManager;

pub struct NoopState;

pub struct NoopModule;

impl NoopModule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoopModule {
    fn default() -> Self {
        Self::new()
    }
}

impl DenoiserModule for NoopModule {
    fn create_state(&self) -> DenoiserHandle {
        DenoiserHandle::new(NoopState)
    }

    fn process_frame(&self, handle: &mut DenoiserHandle, frame: &mut [f32; FRAME_LEN]) -> f32 {
        let _ = handle.downcast_mut::<NoopState>();
        let input_rms = MetricsManager::calculate_rms(frame);
        let output_rms = input_rms;
        output_rms / (input_rms + f32::EPSILON)
    }

    fn is_degraded(&self) -> bool {
        true
    }
}
