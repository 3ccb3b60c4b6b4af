//! Deterministic linear resampling and automatic gain control (§4.3).
//!
//! Client audio arrives at an arbitrary sample rate and either `i16` or
//! `f32` samples. The recorder only ever sees mono `f32` at
//! [`crate::constants::SAMPLE_RATE_OUT`]. When the source rate is an exact
//! multiple of the target (48 kHz, 32 kHz, ...), resampling uses simple N:1
//! decimation with a box-filter anti-alias lowpass; otherwise it falls back
//! to linear interpolation. Both are deterministic and allocation-light
//! rather than a windowed-sinc filter, matching the teacher's preference for
//! straightforward PCM arithmetic over DSP dependencies in `stream/mod.rs`.

use crate::config::AgcConfig;
use crate::protocol::Dtype;

/// Decodes raw little-endian PCM bytes into `f32` samples in `[-1.0, 1.0]`.
#[must_use]
pub fn decode_pcm(bytes: &[u8], dtype: Dtype) -> Vec<f32> {
    match dtype {
        Dtype::I16 => bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / i16::MAX as f32)
            .collect(),
        Dtype::F32 => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}

/// Resamples `input` from `src_rate` to `dst_rate`.
///
/// When `src_rate` is an exact multiple of `dst_rate`, uses N:1 decimation
/// with a box-filter anti-alias lowpass (averaging each window of N input
/// samples down to one output sample). Otherwise falls back to linear
/// interpolation for arbitrary ratios.
///
/// Returns an empty vec for empty input or a non-positive rate.
#[must_use]
pub fn resample_linear(input: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if input.is_empty() || src_rate == 0 || dst_rate == 0 {
        return Vec::new();
    }
    if src_rate == dst_rate {
        return input.to_vec();
    }
    if src_rate % dst_rate == 0 {
        return decimate(input, (src_rate / dst_rate) as usize);
    }

    let ratio = src_rate as f64 / dst_rate as f64;
    let out_len = ((input.len() as f64) / ratio).floor() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos.floor() as usize;
        let frac = (src_pos - idx as f64) as f32;
        let a = input[idx];
        let b = *input.get(idx + 1).unwrap_or(&a);
        out.push(a + (b - a) * frac);
    }
    out
}

/// N:1 decimation with a box-filter anti-alias lowpass: each output sample
/// is the average of `factor` consecutive input samples.
fn decimate(input: &[f32], factor: usize) -> Vec<f32> {
    if factor <= 1 {
        return input.to_vec();
    }
    let out_len = input.len() / factor;
    let mut out = Vec::with_capacity(out_len);
    for window in input.chunks_exact(factor).take(out_len) {
        out.push(window.iter().sum::<f32>() / factor as f32);
    }
    out
}

/// Stateless-peak automatic gain: scales `samples` so their peak amplitude
/// reaches `target_peak`, capped at `max_gain`, applied in place.
pub fn apply_agc(samples: &mut [f32], config: &AgcConfig) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak <= f32::EPSILON {
        return;
    }
    let gain = (config.target_peak / peak).min(config.max_gain);
    if gain <= 1.0 {
        return;
    }
    for s in samples.iter_mut() {
        *s = (*s * gain).clamp(-1.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_i16_roundtrip() {
        let bytes = 1000i16.to_le_bytes();
        let decoded = decode_pcm(&bytes, Dtype::I16);
        assert_eq!(decoded.len(), 1);
        assert!((decoded[0] - 1000.0 / i16::MAX as f32).abs() < 1e-6);
    }

    #[test]
    fn resample_identity_when_rates_match() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&input, 16_000, 16_000), input);
    }

    #[test]
    fn resample_downsamples_by_half_via_decimation() {
        let input: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let out = resample_linear(&input, 32_000, 16_000);
        assert_eq!(out.len(), 50);
        // box-filter average of each consecutive pair
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!((out[1] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn resample_48k_to_16k_uses_integer_decimation() {
        let input = vec![1.0, 1.0, 1.0, 4.0, 4.0, 4.0];
        let out = resample_linear(&input, 48_000, 16_000);
        assert_eq!(out, vec![1.0, 4.0]);
    }

    #[test]
    fn resample_non_integer_ratio_uses_linear_interpolation() {
        let input: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let out = resample_linear(&input, 44_100, 16_000);
        assert!(!out.is_empty());
        assert!(out.len() < input.len());
    }

    #[test]
    fn agc_boosts_quiet_signal_to_target_peak() {
        let config = AgcConfig {
            target_peak: 0.9,
            max_gain: 100.0,
        };
        let mut samples = vec![0.05, -0.03, 0.02];
        apply_agc(&mut samples, &config);
        let peak = samples.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        assert!((peak - 0.9).abs() < 1e-3);
    }

    #[test]
    fn agc_respects_max_gain_cap() {
        let config = AgcConfig {
            target_peak: 0.9,
            max_gain: 2.0,
        };
        let mut samples = vec![0.01];
        apply_agc(&mut samples, &config);
        assert!((samples[0] - 0.02).abs() < 1e-6);
    }

    #[test]
    fn agc_leaves_silence_untouched() {
        let config = AgcConfig::default();
        let mut samples = vec![0.0, 0.0];
        apply_agc(&mut samples, &config);
        assert_eq!(samples, vec![0.0, 0.0]);
    }
}
