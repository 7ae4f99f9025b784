use thiserror::Error;

use crate::state::EngineState;

/// Errors surfaced by the engine's public API.
///
/// Errors on the audio callback path never propagate through this type —
/// they are recorded as `ErrorRecord`s and surfaced via the `Error` event
/// instead, so `process_block` itself is infallible.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid state transition: {from:?} -> {to:?}")]
    InvalidState { from: EngineState, to: EngineState },

    #[error("initialize() called after the engine already initialized")]
    AlreadyInitialized,

    #[error("required capability unavailable: {0}")]
    EnvironmentUnsupported(String),

    #[error("denoiser initialization failed: {0}")]
    InitializationFailed(String),

    #[error("audio context creation failed: {0}")]
    AudioContextCreationFailed(String),

    #[error("unsupported channel count: {0} (mono only)")]
    UnsupportedChannelCount(u16),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("resampling failed: {0}")]
    ResamplingFailed(String),

    #[error("destroy(force=false) called with {0} active stream(s)")]
    ActiveStreamsPresent(usize),

    #[error("cleanup failed: {0}")]
    CleanupFailed(String),

    #[error("internal processing fault: {0}")]
    InternalProcessingFault(String),
}

/// A single entry in the engine's bounded error history.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorRecord {
    pub timestamp_ms: u64,
    pub kind: String,
    pub message: String,
}

impl ErrorRecord {
    pub fn from_error(timestamp_ms: u64, err: &EngineError) -> Self {
        Self {
            timestamp_ms,
            kind: kind_name(err).to_string(),
            message: err.to_string(),
        }
    }
}

fn kind_name(err: &EngineError) -> &'static str {
    match err {
        EngineError::InvalidState { .. } => "InvalidState",
        EngineError::AlreadyInitialized => "AlreadyInitialized",
        EngineError::EnvironmentUnsupported(_) => "EnvironmentUnsupported",
        EngineError::InitializationFailed(_) => "InitializationFailed",
        EngineError::AudioContextCreationFailed(_) => "AudioContextCreationFailed",
        EngineError::UnsupportedChannelCount(_) => "UnsupportedChannelCount",
        EngineError::UnsupportedFormat(_) => "UnsupportedFormat",
        EngineError::ResamplingFailed(_) => "ResamplingFailed",
        EngineError::ActiveStreamsPresent(_) => "ActiveStreamsPresent",
        EngineError::CleanupFailed(_) => "CleanupFailed",
        EngineError::InternalProcessingFault(_) => "InternalProcessingFault",
    }
}

/// Bounded ring of the last `CAPACITY` error records (spec: 10).
#[derive(Debug, Clone, Default)]
pub struct ErrorHistory {
    entries: std::collections::VecDeque<ErrorRecord>,
}

const ERROR_HISTORY_CAPACITY: usize = 10;

impl ErrorHistory {
    pub fn new() -> Self {
        Self {
            entries: std::collections::VecDeque::with_capacity(ERROR_HISTORY_CAPACITY),
        }
    }

    pub fn push(&mut self, record: ErrorRecord) {
        if self.entries.len() == ERROR_HISTORY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(record);
    }

    pub fn recent(&self) -> Vec<ErrorRecord> {
        self.entries.iter().cloned().collect()
    }
}
