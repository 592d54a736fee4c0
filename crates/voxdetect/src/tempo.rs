//! Global tempo estimation from an onset-strength envelope.
//!
//! The envelope is the band-averaged positive first difference of the dB mel
//! spectrogram. Its autocorrelation is scored against a log-normal prior
//! centered at `TEMPO_START_BPM` and the best lag is converted to BPM.

use crate::constants::{TEMPO_AC_SECONDS, TEMPO_MAX_BPM, TEMPO_START_BPM};

/// Onset strength per frame from a frame-major `[n_frames * n_mels]` dB buffer.
#[must_use]
pub fn onset_envelope(log_mel: &[f32], n_mels: usize) -> Vec<f32> {
    let n_frames = log_mel.len() / n_mels;
    let mut env = vec![0.0f32; n_frames];
    for t in 1..n_frames {
        let cur = &log_mel[t * n_mels..(t + 1) * n_mels];
        let prev = &log_mel[(t - 1) * n_mels..t * n_mels];
        let rise: f32 = cur.iter().zip(prev).map(|(c, p)| (c - p).max(0.0)).sum();
        env[t] = rise / n_mels as f32;
    }
    env
}

/// BPM for an autocorrelation lag measured in frames.
#[inline]
fn lag_to_bpm(lag: usize, sample_rate_hz: u32, hop: usize) -> f32 {
    60.0 * sample_rate_hz as f32 / (hop as f32 * lag as f32)
}

/// Estimate tempo in BPM; `0.0` when the envelope carries no onsets.
#[must_use]
pub fn estimate_tempo(envelope: &[f32], sample_rate_hz: u32, hop: usize) -> f32 {
    if envelope.len() < 2 || !envelope.iter().any(|&v| v > 0.0) {
        return 0.0;
    }

    let ac_frames = (TEMPO_AC_SECONDS * sample_rate_hz as f32 / hop as f32).round() as usize;
    let max_lag = ac_frames.min(envelope.len() - 1);

    let zero_lag: f64 = envelope.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
    if zero_lag <= 0.0 {
        return 0.0;
    }

    let log2_start = TEMPO_START_BPM.log2();
    let mut best: Option<(f32, f32)> = None;
    for lag in 1..=max_lag {
        let bpm = lag_to_bpm(lag, sample_rate_hz, hop);
        if bpm > TEMPO_MAX_BPM {
            continue;
        }

        let ac: f64 = envelope[lag..]
            .iter()
            .zip(envelope)
            .map(|(&a, &b)| f64::from(a) * f64::from(b))
            .sum();
        let ac = (ac / zero_lag) as f32;

        let octaves = bpm.log2() - log2_start;
        let score = (1.0 + 1e6 * ac.max(0.0)).ln() - 0.5 * octaves * octaves;

        if best.is_none_or(|(s, _)| score > s) {
            best = Some((score, bpm));
        }
    }

    best.map_or(0.0, |(_, bpm)| bpm)
}
