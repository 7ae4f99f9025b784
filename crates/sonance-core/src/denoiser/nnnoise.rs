//! Real RNNoise-backed denoiser via `nnnoiseless`.

use super::{DenoiserHandle, DenoiserModule, FRAME_LEN};
use nnnoiseless::DenoiseState;

pub struct RnnoiselessState {
    inner: Box<DenoiseState<'static>>,
}

pub struct RnnoiseModule;

impl RnnoiseModule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RnnoiseModule {
    fn default() -> Self {
        Self::new()
    }
}

impl DenoiserModule for RnnoiseModule {
    fn create_state(&self) -> DenoiserHandle {
        DenoiserHandle::new(RnnoiselessState {
            inner: DenoiseState::new(),
        })
    }

    fn process_frame(&self, handle: &mut DenoiserHandle, frame: &mut [f32; FRAME_LEN]) -> f32 {
        let state = handle.downcast_mut::<RnnoiselessState>();
        let input = *frame;
        let vad = state.inner.process_frame(frame, &input);
        vad
    }
}
