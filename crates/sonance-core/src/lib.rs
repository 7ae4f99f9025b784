pub mod agc;
pub mod chunk;
pub mod config;
pub mod denoiser;
pub mod engine;
pub mod error;
pub mod events;
pub mod filters;
pub mod gate;
pub mod metrics;
pub mod resample;
pub mod ring;
pub mod state;
pub mod stream;
pub mod wav;

pub use config::{ChunkOptions, EngineConfig, NoiseReductionLevel};
pub use engine::{Diagnostics, Engine};
pub use error::{EngineError, ErrorRecord};
pub use events::{Event, EventKind, SubscriptionId};
pub use state::EngineState;
pub use stream::{StreamController, StreamId, StreamState};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
