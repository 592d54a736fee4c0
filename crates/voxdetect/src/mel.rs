//! Mel filter bank, dB scaling and MFCC.
//!
//! - Slaney-style mel scale and area-normalized triangular filters
//! - `10 * log10` power scaling with an 80 dB dynamic-range floor
//! - orthonormal DCT-II over mel bands

use crate::constants::{AMIN, TOP_DB};
use crate::stft::{Spectrogram, fft_frequencies};
use crate::tensor::FeatureMatrix;

// Slaney mel scale: linear below 1kHz, logarithmic above.
const F_SP: f32 = 200.0 / 3.0;
const MIN_LOG_HZ: f32 = 1000.0;
const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP; // 15.0
// ln(6.4)/27.
const LOGSTEP: f32 = 0.068_751_78;

#[inline]
pub fn hertz_to_mel(freq: f32) -> f32 {
    if freq >= MIN_LOG_HZ {
        MIN_LOG_MEL + (freq / MIN_LOG_HZ).ln() / LOGSTEP
    } else {
        freq / F_SP
    }
}

#[inline]
pub fn mel_to_hertz(mels: f32) -> f32 {
    if mels >= MIN_LOG_MEL {
        MIN_LOG_HZ * (LOGSTEP * (mels - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mels
    }
}

/// `[n_mels * n_freq]` filter weights, row per mel band.
fn build_mel_filters(sample_rate_hz: u32, n_fft: usize, n_mels: usize) -> Vec<f32> {
    let fft_freqs = fft_frequencies(sample_rate_hz, n_fft);
    let n_freq = fft_freqs.len();

    let mel_min = hertz_to_mel(0.0);
    let mel_max = hertz_to_mel((sample_rate_hz as f32) / 2.0);

    let mut filter_freqs = vec![0.0f32; n_mels + 2];
    for (i, v) in filter_freqs.iter_mut().enumerate() {
        let mel = mel_min + (mel_max - mel_min) * (i as f32) / ((n_mels + 1) as f32);
        *v = mel_to_hertz(mel);
    }

    let mut filter_diff = vec![0.0f32; n_mels + 1];
    for (i, v) in filter_diff.iter_mut().enumerate() {
        *v = filter_freqs[i + 1] - filter_freqs[i];
        if *v == 0.0 {
            *v = 1e-6;
        }
    }

    let mut filters = vec![0.0f32; n_mels * n_freq];
    for m in 0..n_mels {
        let enorm = 2.0 / (filter_freqs[m + 2] - filter_freqs[m]);
        for (f, &freq) in fft_freqs.iter().enumerate() {
            let down = (freq - filter_freqs[m]) / filter_diff[m];
            let up = (filter_freqs[m + 2] - freq) / filter_diff[m + 1];
            filters[m * n_freq + f] = down.min(up).max(0.0) * enorm;
        }
    }

    filters
}

/// `[n_out * n_in]` orthonormal DCT-II basis.
fn build_dct_table(n_in: usize, n_out: usize) -> Vec<f32> {
    let mut table = vec![0.0f32; n_out * n_in];
    let n = n_in as f32;
    for k in 0..n_out {
        let scale = if k == 0 {
            (1.0 / n).sqrt()
        } else {
            (2.0 / n).sqrt()
        };
        for m in 0..n_in {
            let angle = std::f32::consts::PI * (k as f32) * (2.0 * m as f32 + 1.0) / (2.0 * n);
            table[k * n_in + m] = scale * angle.cos();
        }
    }
    table
}

/// Convert power values to dB in place, floored at `max - TOP_DB`.
pub fn power_to_db_inplace(values: &mut [f32]) {
    let mut max_db = f32::NEG_INFINITY;
    for v in values.iter_mut() {
        *v = 10.0 * v.max(AMIN).log10();
        max_db = max_db.max(*v);
    }
    let floor = max_db - TOP_DB;
    for v in values.iter_mut() {
        if *v < floor {
            *v = floor;
        }
    }
}

/// Precomputed mel filter bank for one `(sample_rate, n_fft, n_mels)` setup.
#[derive(Debug, Clone)]
pub struct MelBank {
    filters: Vec<f32>,
    n_mels: usize,
    n_freq: usize,
}

impl MelBank {
    #[must_use]
    pub fn new(sample_rate_hz: u32, n_fft: usize, n_mels: usize) -> Self {
        Self {
            filters: build_mel_filters(sample_rate_hz, n_fft, n_mels),
            n_mels,
            n_freq: n_fft / 2 + 1,
        }
    }

    #[must_use]
    pub fn n_mels(&self) -> usize {
        self.n_mels
    }

    /// Mel power spectrogram in dB, frame-major `[n_frames * n_mels]`.
    #[must_use]
    pub fn log_mel(&self, spec: &Spectrogram) -> Vec<f32> {
        debug_assert_eq!(spec.n_bins(), self.n_freq);
        let mut out = Vec::with_capacity(spec.n_frames() * self.n_mels);
        for frame in spec.frames() {
            for m in 0..self.n_mels {
                let filt = &self.filters[m * self.n_freq..(m + 1) * self.n_freq];
                let mut sum = 0.0f32;
                for (w, mag) in filt.iter().zip(frame) {
                    sum += w * mag * mag;
                }
                out.push(sum);
            }
        }
        power_to_db_inplace(&mut out);
        out
    }
}

/// MFCC from a frame-major log-mel buffer, returned as `[n_mfcc, n_frames]`.
#[must_use]
pub fn mfcc_from_log_mel(log_mel: &[f32], n_mels: usize, n_mfcc: usize) -> FeatureMatrix {
    let n_frames = log_mel.len() / n_mels;
    let dct = build_dct_table(n_mels, n_mfcc);
    let mut out = FeatureMatrix::zeros(n_mfcc, n_frames);
    for (t, mel_row) in log_mel.chunks_exact(n_mels).enumerate() {
        for k in 0..n_mfcc {
            let basis = &dct[k * n_mels..(k + 1) * n_mels];
            let mut acc = 0.0f32;
            for (b, x) in basis.iter().zip(mel_row) {
                acc += b * x;
            }
            out.set(k, t, acc);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{HOP_LENGTH, MEL_BINS, N_FFT, N_FREQ, SAMPLE_RATE_HZ};
    use crate::stft::Stft;

    #[test]
    fn mel_scale_roundtrip() {
        for &hz in &[0.0f32, 440.0, 1000.0, 4000.0, 11_025.0] {
            let back = mel_to_hertz(hertz_to_mel(hz));
            assert!((back - hz).abs() < 0.05, "{hz} -> {back}");
        }
        assert!((hertz_to_mel(1000.0) - 15.0).abs() < 1e-5);
    }

    #[test]
    fn filters_are_nonnegative_and_cover_every_band() {
        let f = build_mel_filters(SAMPLE_RATE_HZ, N_FFT, MEL_BINS);
        assert_eq!(f.len(), MEL_BINS * N_FREQ);
        assert!(f.iter().all(|&w| w >= 0.0));
        for m in 0..MEL_BINS {
            let row = &f[m * N_FREQ..(m + 1) * N_FREQ];
            assert!(row.iter().any(|&w| w > 0.0), "empty mel band {m}");
        }
    }

    #[test]
    fn dct_is_orthonormal() {
        let n = 8;
        let t = build_dct_table(n, n);
        for a in 0..n {
            for b in 0..n {
                let dot: f32 = (0..n).map(|i| t[a * n + i] * t[b * n + i]).sum();
                let expect = if a == b { 1.0 } else { 0.0 };
                assert!((dot - expect).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn silence_gives_constant_log_mel_and_flat_cepstrum() {
        let stft = Stft::new(N_FFT, HOP_LENGTH);
        let spec = stft.magnitudes(&vec![0.0f32; 22_050]);
        let bank = MelBank::new(SAMPLE_RATE_HZ, N_FFT, MEL_BINS);
        let log_mel = bank.log_mel(&spec);

        // 10*log10(1e-10) = -100 dB everywhere.
        assert!(log_mel.iter().all(|&v| (v + 100.0).abs() < 1e-4));

        let mfcc = mfcc_from_log_mel(&log_mel, MEL_BINS, 40);
        assert_eq!(mfcc.shape(), (40, 44));
        let c0 = -100.0 * (MEL_BINS as f32).sqrt();
        assert!((mfcc.get(0, 0) - c0).abs() < 1e-2);
        for k in 1..40 {
            assert!(mfcc.get(k, 10).abs() < 1e-2);
        }
    }

    #[test]
    fn db_floor_limits_dynamic_range() {
        let mut v = vec![1.0f32, 1e-12, 1e-3];
        power_to_db_inplace(&mut v);
        assert!((v[0] - 0.0).abs() < 1e-6);
        assert!((v[1] + 80.0).abs() < 1e-4);
        assert!((v[2] + 30.0).abs() < 1e-4);
    }
}
