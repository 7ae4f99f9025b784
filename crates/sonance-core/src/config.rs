use serde::{Deserialize, Serialize};

/// Noise reduction aggressiveness presets. `Auto` lets the engine pick a
/// level based on the observed noise floor; the frame pipeline itself only
/// cares about the post-gate thresholds, which are fixed by spec §4.2 and
/// not tuned per level today — the field exists for host-facing UX and
/// future-proofing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseReductionLevel {
    Low,
    Medium,
    High,
    Auto,
}

impl Default for NoiseReductionLevel {
    fn default() -> Self {
        NoiseReductionLevel::Auto
    }
}

/// Host audio-callback block size. Only the enumerated power-of-two sizes
/// are legal; out-of-range requests clamp to the nearest one.
const LEGAL_BUFFER_SIZES: [u32; 5] = [256, 512, 1024, 2048, 4096];

/// Immutable, validated engine configuration (spec §3).
///
/// Reading this from a config file or environment is a host concern
/// (explicitly out of scope); this type only owns construction-time
/// validation and clamping. It derives `Serialize`/`Deserialize` so a host
/// can snapshot or transmit it over its own transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub noise_reduction_level: NoiseReductionLevel,
    pub buffer_size: u32,
    pub allow_degraded: bool,
    pub auto_cleanup: bool,
    pub cleanup_delay_ms: u64,
    pub log_level: String,
    pub agc_enabled: bool,
    pub agc_target_level: f32,
    pub agc_max_gain: f32,
    pub input_gain: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            noise_reduction_level: NoiseReductionLevel::default(),
            buffer_size: 1024,
            allow_degraded: false,
            auto_cleanup: false,
            cleanup_delay_ms: 0,
            log_level: "info".to_string(),
            agc_enabled: false,
            agc_target_level: 0.2,
            agc_max_gain: 4.0,
            input_gain: 1.0,
        }
    }
}

impl EngineConfig {
    /// Applies spec §3 clamping rules. Called once at construction so
    /// callers never observe an out-of-range field afterward.
    pub fn validated(mut self) -> Self {
        self.buffer_size = nearest_legal_buffer_size(self.buffer_size);
        self.agc_target_level = self.agc_target_level.clamp(f32::EPSILON, 1.0);
        self.agc_max_gain = self.agc_max_gain.max(1.0);
        self.input_gain = self.input_gain.clamp(0.5, 10.0);
        self
    }
}

fn nearest_legal_buffer_size(requested: u32) -> u32 {
    LEGAL_BUFFER_SIZES
        .iter()
        .copied()
        .min_by_key(|&size| (size as i64 - requested as i64).abs())
        .unwrap_or(1024)
}

/// Per-stream chunking options passed to `Engine::process_stream`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkOptions {
    /// `None` disables chunking entirely for the stream.
    pub chunk_duration_ms: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_already_valid() {
        let cfg = EngineConfig::default().validated();
        assert_eq!(cfg.buffer_size, 1024);
        assert!((0.5..=10.0).contains(&cfg.input_gain));
    }

    #[test]
    fn buffer_size_clamps_to_nearest_legal() {
        let cfg = EngineConfig {
            buffer_size: 300,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.buffer_size, 256);

        let cfg = EngineConfig {
            buffer_size: 3000,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.buffer_size, 2048);
    }

    #[test]
    fn input_gain_clamps_into_range() {
        let cfg = EngineConfig {
            input_gain: 0.1,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.input_gain, 0.5);

        let cfg = EngineConfig {
            input_gain: 50.0,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.input_gain, 10.0);
    }

    #[test]
    fn agc_target_level_clamps_into_unit_interval() {
        let cfg = EngineConfig {
            agc_target_level: 0.0,
            ..Default::default()
        }
        .validated();
        assert!(cfg.agc_target_level > 0.0);

        let cfg = EngineConfig {
            agc_target_level: 5.0,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.agc_target_level, 1.0);
    }

    #[test]
    fn agc_max_gain_floors_at_one() {
        let cfg = EngineConfig {
            agc_max_gain: 0.2,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.agc_max_gain, 1.0);
    }

    #[test]
    fn unknown_fields_are_ignored_on_deserialize() {
        let json = r#"{"inputGain":2.0,"totallyUnknownField":42}"#;
        // EngineConfig uses snake_case by default (no rename_all), so this
        // exercises #[serde(default)] filling in every other field while
        // unknown keys are silently dropped (serde_json's default behavior).
        let parsed: Result<EngineConfig, _> = serde_json::from_str(json);
        assert!(parsed.is_ok());
    }
}
