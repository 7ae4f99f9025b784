//! Linear-interpolation resampler used only in file mode and whenever a
//! host context's sample rate differs from 48 kHz (spec §4.2).
//!
//! This intentionally diverges from the teacher's windowed-sinc `rubato`
//! resampler: spec §8's round-trip invariant (property 7, scenario S2)
//! pins an exact `round(len * 48000 / src_sr)` output length with no
//! filter-delay slop, which a sinc resampler's group delay cannot
//! guarantee. See DESIGN.md.

pub const TARGET_SAMPLE_RATE_HZ: u32 = 48_000;

/// Resamples mono `input` from `src_sample_rate_hz` to `TARGET_SAMPLE_RATE_HZ`
/// via linear interpolation. Edge samples replicate the boundary value.
pub fn resample_linear(input: &[f32], src_sample_rate_hz: u32) -> Result<Vec<f32>, String> {
    if src_sample_rate_hz == 0 {
        return Err("source sample rate must be positive".to_string());
    }

    if src_sample_rate_hz == TARGET_SAMPLE_RATE_HZ || input.is_empty() {
        return Ok(input.to_vec());
    }

    let ratio = TARGET_SAMPLE_RATE_HZ as f64 / src_sample_rate_hz as f64;
    let output_len = (input.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(output_len);

    let last_index = (input.len() - 1) as f64;
    for i in 0..output_len {
        let src_pos = if output_len <= 1 {
            0.0
        } else {
            i as f64 * last_index / (output_len - 1) as f64
        };
        let lower = src_pos.floor() as usize;
        let upper = (lower + 1).min(input.len() - 1);
        let frac = (src_pos - lower as f64) as f32;
        let sample = input[lower] * (1.0 - frac) + input[upper] * frac;
        output.push(sample);
    }

    Ok(output)
}
