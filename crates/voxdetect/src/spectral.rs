//! Per-frame spectral shape statistics over a magnitude spectrogram.

use crate::constants::{AMIN, CONTRAST_BANDS, CONTRAST_FMIN_HZ, CONTRAST_QUANTILE, ROLLOFF_PERCENT};
use crate::stft::Spectrogram;
use crate::tensor::FeatureMatrix;

/// Magnitude-weighted mean frequency of each frame (0.0 for an empty frame).
#[must_use]
pub fn spectral_centroid(spec: &Spectrogram, freqs: &[f32]) -> Vec<f32> {
    spec.frames()
        .map(|frame| {
            let mut weighted = 0.0f32;
            let mut total = 0.0f32;
            for (&m, &f) in frame.iter().zip(freqs) {
                weighted += m * f;
                total += m;
            }
            if total > 0.0 { weighted / total } else { 0.0 }
        })
        .collect()
}

/// Lowest bin frequency at which cumulative magnitude reaches `ROLLOFF_PERCENT` of the total.
#[must_use]
pub fn spectral_rolloff(spec: &Spectrogram, freqs: &[f32]) -> Vec<f32> {
    spec.frames()
        .map(|frame| {
            let total: f32 = frame.iter().sum();
            let threshold = ROLLOFF_PERCENT * total;
            let mut cumulative = 0.0f32;
            for (&m, &f) in frame.iter().zip(freqs) {
                cumulative += m;
                if cumulative >= threshold {
                    return f;
                }
            }
            freqs.last().copied().unwrap_or(0.0)
        })
        .collect()
}

/// One contrast band: the bins it sorts and the bin count its quantile is taken over.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ContrastBand {
    bins: std::ops::Range<usize>,
    support: usize,
}

/// Bin ranges for the octave bands plus the residual top band.
fn contrast_bands(freqs: &[f32]) -> Vec<ContrastBand> {
    let mut edges = vec![0.0f32; CONTRAST_BANDS + 2];
    for (i, e) in edges.iter_mut().enumerate().skip(1) {
        *e = CONTRAST_FMIN_HZ * 2f32.powi(i as i32 - 1);
    }

    let mut bands = Vec::with_capacity(CONTRAST_BANDS + 1);
    for k in 0..=CONTRAST_BANDS {
        let (lo, hi) = (edges[k], edges[k + 1]);
        let first = freqs.iter().position(|&f| f >= lo);
        let last = freqs.iter().rposition(|&f| f <= hi);
        let (Some(mut start), Some(mut end)) = (first, last.map(|l| l + 1)) else {
            bands.push(ContrastBand {
                bins: 0..0,
                support: 0,
            });
            continue;
        };
        // Each band reaches one bin below its lower edge.
        if k > 0 {
            start = start.saturating_sub(1);
        }
        if k == CONTRAST_BANDS {
            end = freqs.len();
        }
        // The quantile size counts the bin at the upper edge even though
        // octave bands stop one bin short of it.
        let support = end - start;
        if k < CONTRAST_BANDS {
            end = end.saturating_sub(1).max(start);
        }
        bands.push(ContrastBand {
            bins: start..end,
            support,
        });
    }
    bands
}

#[inline]
fn db(x: f32) -> f32 {
    10.0 * x.max(AMIN).log10()
}

/// Octave-band peak/valley contrast in dB, `[CONTRAST_BANDS + 1, n_frames]`.
#[must_use]
pub fn spectral_contrast(spec: &Spectrogram, freqs: &[f32]) -> FeatureMatrix {
    let bands = contrast_bands(freqs);
    let mut out = FeatureMatrix::zeros(bands.len(), spec.n_frames());
    let mut sorted = Vec::new();

    for (t, frame) in spec.frames().enumerate() {
        for (k, band) in bands.iter().enumerate() {
            if band.bins.is_empty() {
                continue;
            }
            sorted.clear();
            sorted.extend_from_slice(&frame[band.bins.clone()]);
            sorted.sort_by(f32::total_cmp);

            let n = sorted.len();
            let alph = ((CONTRAST_QUANTILE * band.support as f32).round_ties_even() as usize)
                .clamp(1, n);
            let valley = sorted[..alph].iter().sum::<f32>() / alph as f32;
            let peak = sorted[n - alph..].iter().sum::<f32>() / alph as f32;
            out.set(k, t, db(peak) - db(valley));
        }
    }
    out
}
