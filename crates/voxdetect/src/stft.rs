//! Centered short-time Fourier transform using rustfft.

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Magnitude spectrogram stored frame-major: `mags[frame * n_bins + bin]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    n_bins: usize,
    n_frames: usize,
    mags: Vec<f32>,
}

impl Spectrogram {
    #[must_use]
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    #[must_use]
    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    #[must_use]
    pub fn frame(&self, t: usize) -> &[f32] {
        &self.mags[t * self.n_bins..(t + 1) * self.n_bins]
    }

    pub fn frames(&self) -> impl Iterator<Item = &[f32]> {
        self.mags.chunks_exact(self.n_bins)
    }
}

/// Frequency (Hz) of each of the `n_fft / 2 + 1` bins.
#[must_use]
pub fn fft_frequencies(sample_rate_hz: u32, n_fft: usize) -> Vec<f32> {
    (0..=n_fft / 2)
        .map(|k| k as f32 * sample_rate_hz as f32 / n_fft as f32)
        .collect()
}

/// STFT with a periodic Hann window and `n_fft / 2` zero padding on both sides.
///
/// Frame count is `1 + len / hop`.
pub struct Stft {
    fft: Arc<dyn Fft<f32>>,
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
}

impl std::fmt::Debug for Stft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stft")
            .field("n_fft", &self.n_fft)
            .field("hop", &self.hop)
            .finish()
    }
}

impl Stft {
    #[must_use]
    pub fn new(n_fft: usize, hop: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n_fft);

        // Periodic Hann: 0.5*(1-cos(2*pi*i/N))
        let window = (0..n_fft)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_fft as f32).cos()))
            .collect();

        Self {
            fft,
            n_fft,
            hop,
            window,
        }
    }

    #[must_use]
    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    #[must_use]
    pub fn hop(&self) -> usize {
        self.hop
    }

    #[must_use]
    pub fn magnitudes(&self, samples: &[f32]) -> Spectrogram {
        let pad = self.n_fft / 2;
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let n_bins = self.n_fft / 2 + 1;
        let n_frames = 1 + samples.len() / self.hop;
        let mut mags = Vec::with_capacity(n_frames * n_bins);

        let mut buf = vec![Complex::new(0.0f32, 0.0); self.n_fft];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); self.fft.get_inplace_scratch_len()];

        for t in 0..n_frames {
            let start = t * self.hop;
            let frame = &padded[start..start + self.n_fft];
            for ((b, &x), &w) in buf.iter_mut().zip(frame).zip(&self.window) {
                *b = Complex::new(x * w, 0.0);
            }
            self.fft.process_with_scratch(&mut buf, &mut scratch);
            mags.extend(buf[..n_bins].iter().map(|c| c.norm()));
        }

        Spectrogram {
            n_bins,
            n_frames,
            mags,
        }
    }
}
