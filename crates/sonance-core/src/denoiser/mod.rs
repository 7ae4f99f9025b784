//! Denoiser adapter (spec §4.6): a capability-shaped collaborator the
//! engine treats as an opaque frame-in/frame-out filter. Two
//! implementations ship in-core: an `nnnoiseless`-backed real denoiser and
//! a no-op degraded-mode substitute.

mod nnnoise;
mod noop;

pub use nnnoise::RnnoiseModule;
pub use noop::NoopModule;

pub const FRAME_LEN: usize = 480;

/// An opaque per-stream denoiser state handle. Must not outlive the
/// `DenoiserModule` that created it, and must never be shared across
/// concurrent `process_frame` calls.
pub struct DenoiserHandle(Box<dyn std::any::Any + Send>);

impl DenoiserHandle {
    fn new<T: std::any::Any + Send>(inner: T) -> Self {
        Self(Box::new(inner))
    }

    fn downcast_mut<T: std::any::Any>(&mut self) -> &mut T {
        self.0
            .downcast_mut::<T>()
            .expect("DenoiserHandle used with the wrong DenoiserModule")
    }
}

/// Frame-in/frame-out denoiser contract. Implementations must be
/// deterministic per-handle and must not retain references to the
/// caller's buffers across calls (spec §4.6).
pub trait DenoiserModule: Send + Sync {
    fn create_state(&self) -> DenoiserHandle;
    fn destroy_state(&self, handle: DenoiserHandle) {
        drop(handle);
    }

    /// Denoises `frame` in place, returning a per-frame VAD score in
    /// `[0, 1]`.
    fn process_frame(&self, handle: &mut DenoiserHandle, frame: &mut [f32; FRAME_LEN]) -> f32;

    /// Primes internal caches by running `frames` silent frames through a
    /// scratch handle (spec §4.1: "warmup of >= 10 silent frames").
    fn warmup(&self, frames: usize) {
        let mut handle = self.create_state();
        let mut silence = [0.0f32; FRAME_LEN];
        for _ in 0..frames {
            self.process_frame(&mut handle, &mut silence);
        }
        self.destroy_state(handle);
    }

    fn is_degraded(&self) -> bool {
        false
    }
}

/// Attempts to load the real `nnnoiseless`-backed module. This never
/// actually fails today (the model is statically linked), but the
/// `Result` return mirrors spec §4.1's "if the denoiser load fails"
/// branch so callers (and tests) can exercise the degraded-mode fallback
/// uniformly regardless of which concrete failure mode a future backend
/// introduces.
pub fn load_denoiser() -> Result<Box<dyn DenoiserModule>, String> {
    Ok(Box::new(RnnoiseModule::new()))
}

pub fn load_noop_denoiser() -> Box<dyn DenoiserModule> {
    Box::new(NoopModule::new())
}
