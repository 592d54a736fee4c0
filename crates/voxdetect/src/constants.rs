//! Signal-processing and model-shape constants.
//!
//! Every window size below is derived for `SAMPLE_RATE_HZ`; changing the rate
//! means re-deriving all of them.

// Audio frontend.
pub const SAMPLE_RATE_HZ: u32 = 22_050;
pub const N_FFT: usize = 2048;
pub const HOP_LENGTH: usize = 512; // ~23ms @ 22.05kHz
pub const N_FREQ: usize = N_FFT / 2 + 1; // 1025
pub const MEL_BINS: usize = 128;

// Features.
pub const DEFAULT_N_MFCC: usize = 40;
pub const ROLLOFF_PERCENT: f32 = 0.85;
pub const CONTRAST_BANDS: usize = 6;
pub const CONTRAST_FMIN_HZ: f32 = 200.0;
pub const CONTRAST_QUANTILE: f32 = 0.02;
pub const PITCH_FMIN_HZ: f32 = 150.0;
pub const PITCH_FMAX_HZ: f32 = 4000.0;
pub const PITCH_THRESHOLD: f32 = 0.1;
pub const TEMPO_START_BPM: f32 = 120.0;
pub const TEMPO_MAX_BPM: f32 = 320.0;
pub const TEMPO_AC_SECONDS: f32 = 8.0;

// Power-to-dB conversion.
pub const AMIN: f32 = 1e-10;
pub const TOP_DB: f32 = 80.0;

// Classifier input contract: (MODEL_CHANNELS, MODEL_FRAMES).
pub const MODEL_CHANNELS: usize = 40;
pub const MODEL_FRAMES: usize = 128;
pub const NUM_CLASSES: usize = 2;
