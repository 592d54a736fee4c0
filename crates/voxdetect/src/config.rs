//! Detector configuration file (`voxdetect.json`) parsing.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_N_MFCC, MEL_BINS, SAMPLE_RATE_HZ};
use crate::explainer::ExplainerThresholds;

pub const DEFAULT_MODEL_PATH: &str = "models/voice_classifier.safetensors";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub sample_rate_hz: u32,
    pub n_mfcc: usize,
    pub model_path: PathBuf,
    /// Decoded audio beyond this many seconds is dropped. Unset means no cap.
    pub max_duration_secs: Option<f32>,
    pub explainer: ExplainerThresholds,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: SAMPLE_RATE_HZ,
            n_mfcc: DEFAULT_N_MFCC,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            max_duration_secs: None,
            explainer: ExplainerThresholds::default(),
        }
    }
}

impl DetectorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json).context("parse detector config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let json = std::fs::read_to_string(path_ref)
            .with_context(|| format!("read {}", path_ref.display()))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.sample_rate_hz == SAMPLE_RATE_HZ,
            "sample_rate_hz must be {SAMPLE_RATE_HZ}, feature windows are derived from it"
        );
        anyhow::ensure!(
            (1..=MEL_BINS).contains(&self.n_mfcc),
            "n_mfcc must be in 1..={MEL_BINS}"
        );
        if let Some(secs) = self.max_duration_secs {
            anyhow::ensure!(
                secs.is_finite() && secs > 0.0,
                "max_duration_secs must be > 0"
            );
        }
        let t = &self.explainer;
        anyhow::ensure!(
            t.pitch_std_ai_below <= t.pitch_std_human_above,
            "explainer pitch thresholds overlap"
        );
        anyhow::ensure!(
            t.tempo_ai_below <= t.tempo_human_above,
            "explainer tempo thresholds overlap"
        );
        Ok(())
    }
}
