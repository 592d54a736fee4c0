//! Fundamental-frequency tracking by parabolic-interpolated spectral peaks.

use crate::constants::{PITCH_FMAX_HZ, PITCH_FMIN_HZ, PITCH_THRESHOLD};
use crate::math::{mean_f64, variance_f64};
use crate::stft::Spectrogram;

/// Summary of the retained per-frame pitch estimates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PitchStats {
    pub mean: f32,
    pub std: f32,
    pub var: f32,
    pub voiced_frames: usize,
}

/// Pitch (Hz) of the dominant peak in one magnitude frame, if any peak qualifies.
///
/// A bin qualifies when it lies in `[PITCH_FMIN_HZ, PITCH_FMAX_HZ)`, exceeds
/// `PITCH_THRESHOLD` of the frame maximum, and is a local maximum.
fn dominant_pitch(frame: &[f32], freqs: &[f32], bin_hz: f32) -> Option<f32> {
    let n = frame.len();
    if n < 3 {
        return None;
    }
    let max_mag = frame.iter().copied().fold(0.0f32, f32::max);
    let reference = PITCH_THRESHOLD * max_mag;
    let gated = |i: usize| if frame[i] > reference { frame[i] } else { 0.0 };

    let mut best_mag = 0.0f32;
    let mut best_pitch = 0.0f32;

    for i in 1..n - 1 {
        let f = freqs[i];
        if f < PITCH_FMIN_HZ || f >= PITCH_FMAX_HZ {
            continue;
        }
        let s = gated(i);
        if !(s > gated(i - 1) && s >= gated(i + 1)) {
            continue;
        }

        let avg = 0.5 * (frame[i + 1] - frame[i - 1]);
        let curvature = 2.0 * frame[i] - frame[i + 1] - frame[i - 1];
        let denom = if curvature.abs() < f32::MIN_POSITIVE {
            curvature + 1.0
        } else {
            curvature
        };
        let shift = avg / denom;
        let mag = frame[i] + 0.5 * avg * shift;

        if mag > best_mag {
            best_mag = mag;
            best_pitch = (i as f32 + shift) * bin_hz;
        }
    }

    (best_pitch > 0.0).then_some(best_pitch)
}

/// Track pitch over every frame and summarize the voiced ones.
///
/// With no voiced frame all statistics are exactly `0.0`.
#[must_use]
pub fn pitch_stats(spec: &Spectrogram, freqs: &[f32], bin_hz: f32) -> PitchStats {
    let voiced: Vec<f32> = spec
        .frames()
        .filter_map(|frame| dominant_pitch(frame, freqs, bin_hz))
        .collect();

    if voiced.is_empty() {
        return PitchStats::default();
    }

    let var = variance_f64(&voiced);
    PitchStats {
        mean: mean_f64(&voiced) as f32,
        std: var.sqrt() as f32,
        var: var as f32,
        voiced_frames: voiced.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{HOP_LENGTH, N_FFT, SAMPLE_RATE_HZ};
    use crate::stft::{Stft, fft_frequencies};

    fn analyze(samples: &[f32]) -> PitchStats {
        let spec = Stft::new(N_FFT, HOP_LENGTH).magnitudes(samples);
        let freqs = fft_frequencies(SAMPLE_RATE_HZ, N_FFT);
        pitch_stats(&spec, &freqs, SAMPLE_RATE_HZ as f32 / N_FFT as f32)
    }

    #[test]
    fn silence_has_no_pitch() {
        let stats = analyze(&vec![0.0; 22_050]);
        assert_eq!(stats, PitchStats::default());
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.std, 0.0);
        assert_eq!(stats.var, 0.0);
    }

    #[test]
    fn steady_tone_is_tracked_with_low_spread() {
        let sr = SAMPLE_RATE_HZ as f32;
        let tone: Vec<f32> = (0..SAMPLE_RATE_HZ as usize)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr).sin())
            .collect();
        let stats = analyze(&tone);
        assert!(stats.voiced_frames > 30);
        assert!((stats.mean - 440.0).abs() < 15.0, "mean {}", stats.mean);
        assert!(stats.std < 20.0, "std {}", stats.std);
        assert!((stats.var - stats.std * stats.std).abs() < 1e-2);
    }

    #[test]
    fn out_of_range_tone_is_ignored() {
        let sr = SAMPLE_RATE_HZ as f32;
        let tone: Vec<f32> = (0..8192)
            .map(|i| (2.0 * std::f32::consts::PI * 60.0 * i as f32 / sr).sin())
            .collect();
        let spec = Stft::new(N_FFT, HOP_LENGTH).magnitudes(&tone);
        let freqs = fft_frequencies(SAMPLE_RATE_HZ, N_FFT);
        let mid = spec.frame(spec.n_frames() / 2);
        // The 60Hz peak is below the search band; only sidelobe leakage could qualify.
        let p = dominant_pitch(mid, &freqs, sr / N_FFT as f32);
        assert!(p.is_none_or(|hz| hz >= PITCH_FMIN_HZ));
    }
}
