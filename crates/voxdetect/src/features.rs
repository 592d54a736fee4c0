//! Feature extraction: one waveform in, one immutable [`FeatureBundle`] out.

use crate::audio::Waveform;
use crate::constants::{DEFAULT_N_MFCC, HOP_LENGTH, MEL_BINS, N_FFT, SAMPLE_RATE_HZ};
use crate::mel::{MelBank, mfcc_from_log_mel};
use crate::pitch::{PitchStats, pitch_stats};
use crate::spectral::{spectral_centroid, spectral_contrast, spectral_rolloff};
use crate::stft::{Stft, fft_frequencies};
use crate::tempo::{estimate_tempo, onset_envelope};
use crate::tensor::FeatureMatrix;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeatureError {
    #[error("cannot extract features from an empty waveform")]
    EmptyWaveform,
    #[error("waveform contains a non-finite sample at index {index}")]
    NonFinite { index: usize },
    #[error("coefficient count must be in 1..={max}, got {got}")]
    InvalidCoefficientCount { got: usize, max: usize },
    #[error("waveform is at {got}Hz, extractor expects {expected}Hz")]
    SampleRate { got: u32, expected: u32 },
}

/// Everything derived from a single waveform in a single extraction call.
///
/// Per-frame sequences (`mfcc`, centroid, rolloff, contrast) share one frame count.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBundle {
    mfcc: FeatureMatrix,
    spectral_centroid: Vec<f32>,
    spectral_rolloff: Vec<f32>,
    spectral_contrast: FeatureMatrix,
    pitch: PitchStats,
    tempo: f32,
    waveform: Waveform,
}

impl FeatureBundle {
    #[must_use]
    pub fn mfcc(&self) -> &FeatureMatrix {
        &self.mfcc
    }

    #[must_use]
    pub fn spectral_centroid(&self) -> &[f32] {
        &self.spectral_centroid
    }

    #[must_use]
    pub fn spectral_rolloff(&self) -> &[f32] {
        &self.spectral_rolloff
    }

    #[must_use]
    pub fn spectral_contrast(&self) -> &FeatureMatrix {
        &self.spectral_contrast
    }

    #[must_use]
    pub fn pitch_mean(&self) -> f32 {
        self.pitch.mean
    }

    #[must_use]
    pub fn pitch_std(&self) -> f32 {
        self.pitch.std
    }

    #[must_use]
    pub fn pitch_var(&self) -> f32 {
        self.pitch.var
    }

    #[must_use]
    pub fn voiced_frames(&self) -> usize {
        self.pitch.voiced_frames
    }

    #[must_use]
    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    #[must_use]
    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }

    #[must_use]
    pub fn n_frames(&self) -> usize {
        self.mfcc.cols()
    }
}

/// Stateless extractor; precomputes its FFT plan and filter bank once.
#[derive(Debug)]
pub struct FeatureExtractor {
    n_mfcc: usize,
    stft: Stft,
    mel: MelBank,
    freqs: Vec<f32>,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self {
            n_mfcc: DEFAULT_N_MFCC,
            stft: Stft::new(N_FFT, HOP_LENGTH),
            mel: MelBank::new(SAMPLE_RATE_HZ, N_FFT, MEL_BINS),
            freqs: fft_frequencies(SAMPLE_RATE_HZ, N_FFT),
        }
    }
}

impl FeatureExtractor {
    pub fn new(n_mfcc: usize) -> Result<Self, FeatureError> {
        let mut ex = Self::default();
        ex.set_n_mfcc(n_mfcc)?;
        Ok(ex)
    }

    fn set_n_mfcc(&mut self, n_mfcc: usize) -> Result<(), FeatureError> {
        if n_mfcc == 0 || n_mfcc > MEL_BINS {
            return Err(FeatureError::InvalidCoefficientCount {
                got: n_mfcc,
                max: MEL_BINS,
            });
        }
        self.n_mfcc = n_mfcc;
        Ok(())
    }

    #[must_use]
    pub fn n_mfcc(&self) -> usize {
        self.n_mfcc
    }

    pub fn extract(&self, waveform: &Waveform) -> Result<FeatureBundle, FeatureError> {
        self.extract_with(waveform, self.n_mfcc)
    }

    /// Extract with a per-call coefficient count, sharing this extractor's FFT plan.
    pub fn extract_with(
        &self,
        waveform: &Waveform,
        n_mfcc: usize,
    ) -> Result<FeatureBundle, FeatureError> {
        if n_mfcc == 0 || n_mfcc > MEL_BINS {
            return Err(FeatureError::InvalidCoefficientCount {
                got: n_mfcc,
                max: MEL_BINS,
            });
        }
        if waveform.is_empty() {
            return Err(FeatureError::EmptyWaveform);
        }
        if waveform.sample_rate_hz() != SAMPLE_RATE_HZ {
            return Err(FeatureError::SampleRate {
                got: waveform.sample_rate_hz(),
                expected: SAMPLE_RATE_HZ,
            });
        }
        if let Some(index) = waveform.samples().iter().position(|s| !s.is_finite()) {
            return Err(FeatureError::NonFinite { index });
        }

        let spec = self.stft.magnitudes(waveform.samples());
        let log_mel = self.mel.log_mel(&spec);

        let mfcc = mfcc_from_log_mel(&log_mel, self.mel.n_mels(), n_mfcc);
        let spectral_centroid = spectral_centroid(&spec, &self.freqs);
        let spectral_rolloff = spectral_rolloff(&spec, &self.freqs);
        let spectral_contrast = spectral_contrast(&spec, &self.freqs);

        let bin_hz = SAMPLE_RATE_HZ as f32 / self.stft.n_fft() as f32;
        let pitch = pitch_stats(&spec, &self.freqs, bin_hz);

        let envelope = onset_envelope(&log_mel, self.mel.n_mels());
        let tempo = estimate_tempo(&envelope, SAMPLE_RATE_HZ, self.stft.hop());

        tracing::debug!(
            frames = spec.n_frames(),
            voiced = pitch.voiced_frames,
            pitch_std = pitch.std,
            tempo,
            "extracted features"
        );

        Ok(FeatureBundle {
            mfcc,
            spectral_centroid,
            spectral_rolloff,
            spectral_contrast,
            pitch,
            tempo,
            waveform: waveform.clone(),
        })
    }
}
