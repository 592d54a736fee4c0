//! Label prediction from a shaped MFCC tensor.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::NUM_CLASSES;
use crate::math::{argmax, softmax_inplace};
use crate::model::{CnnWeights, DEFAULT_INIT_SEED};
use crate::tensor::ModelInput;
use crate::weights::{TrainingMetadata, WeightError, WeightStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "AI_GENERATED")]
    AiGenerated,
    #[serde(rename = "HUMAN")]
    Human,
}

impl Label {
    /// Class index 0 is AI-generated, 1 is human.
    #[must_use]
    pub fn from_index(idx: usize) -> Self {
        if idx == 1 { Self::Human } else { Self::AiGenerated }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AiGenerated => "AI_GENERATED",
            Self::Human => "HUMAN",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
    pub label: Label,
    pub confidence: f32,
    pub probabilities: [f32; NUM_CLASSES],
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("model produced non-finite logits {0:?}")]
    NonFinite([f32; NUM_CLASSES]),
}

/// Where the active parameters came from.
#[derive(Debug, Clone, PartialEq)]
pub enum WeightSource {
    Trained {
        path: PathBuf,
        epoch: Option<u32>,
        loss: Option<f32>,
    },
    Default {
        reason: String,
    },
}

/// Seam between the pipeline and whatever produces labels.
pub trait VoiceClassifier: Send + Sync {
    fn classify(&self, input: &ModelInput) -> Result<ClassificationResult, InferenceError>;

    /// True when running on untrained default parameters.
    fn is_degraded(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    weights: CnnWeights,
    source: WeightSource,
}

impl Classifier {
    /// Default-initialized classifier; always degraded.
    #[must_use]
    pub fn with_default_weights(reason: impl Into<String>) -> Self {
        Self {
            weights: CnnWeights::seeded(DEFAULT_INIT_SEED),
            source: WeightSource::Default {
                reason: reason.into(),
            },
        }
    }

    /// Load trained weights from `path`, falling back to default parameters.
    ///
    /// Never fails: a missing or incompatible artifact yields a degraded
    /// classifier and a single warning.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(c) => {
                if let WeightSource::Trained { epoch, loss, .. } = &c.source {
                    tracing::info!(path = %path.display(), ?epoch, ?loss, "loaded trained classifier weights");
                }
                c
            }
            Err(err) => {
                let reason = format!("{}: {err}", path.display());
                tracing::warn!(%reason, "classifier weights unavailable, using default parameters");
                Self::with_default_weights(reason)
            }
        }
    }

    /// Strict load: any missing tensor or shape mismatch is an error.
    pub fn try_load(path: impl AsRef<Path>) -> Result<Self, WeightError> {
        let path = path.as_ref();
        let store = WeightStore::open(path)?;
        let weights = CnnWeights::from_store(&store)?;
        let meta = store.metadata()?;
        Ok(Self {
            weights,
            source: WeightSource::Trained {
                path: path.to_path_buf(),
                epoch: meta.epoch,
                loss: meta.loss,
            },
        })
    }

    pub fn save_weights(
        &self,
        path: impl AsRef<Path>,
        epoch: Option<u32>,
        loss: Option<f32>,
    ) -> Result<(), WeightError> {
        self.weights.save(path, TrainingMetadata { epoch, loss })
    }

    #[must_use]
    pub fn weight_source(&self) -> &WeightSource {
        &self.source
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self.source, WeightSource::Default { .. })
    }

    #[must_use]
    pub fn logits(&self, input: &ModelInput) -> [f32; NUM_CLASSES] {
        self.weights.forward(input)
    }

    pub fn predict(&self, input: &ModelInput) -> Result<ClassificationResult, InferenceError> {
        let logits = self.logits(input);
        if logits.iter().any(|v| !v.is_finite()) {
            return Err(InferenceError::NonFinite(logits));
        }

        let mut probabilities = logits;
        softmax_inplace(&mut probabilities);
        let idx = argmax(&probabilities);
        let result = ClassificationResult {
            label: Label::from_index(idx),
            confidence: probabilities[idx].clamp(0.0, 1.0),
            probabilities,
        };
        tracing::debug!(label = %result.label, confidence = result.confidence, "classified");
        Ok(result)
    }
}

impl VoiceClassifier for Classifier {
    fn classify(&self, input: &ModelInput) -> Result<ClassificationResult, InferenceError> {
        self.predict(input)
    }

    fn is_degraded(&self) -> bool {
        Classifier::is_degraded(self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::weights::{TensorF32, save_f32_tensors};

    #[test]
    fn label_wire_strings() {
        assert_eq!(Label::from_index(0), Label::AiGenerated);
        assert_eq!(Label::from_index(1), Label::Human);
        assert_eq!(Label::Human.to_string(), "HUMAN");
        assert_eq!(
            serde_json::to_string(&Label::AiGenerated).expect("json"),
            "\"AI_GENERATED\""
        );
        let back: Label = serde_json::from_str("\"HUMAN\"").expect("json");
        assert_eq!(back, Label::Human);
    }

    #[test]
    fn missing_artifact_runs_degraded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let c = Classifier::load(dir.path().join("nope.safetensors"));
        assert!(c.is_degraded());
        assert!(matches!(c.weight_source(), WeightSource::Default { .. }));

        let r = c.predict(&ModelInput::zeros()).expect("predict");
        assert!((0.0..=1.0).contains(&r.confidence));
        assert!(r.confidence >= 0.5);
        let sum: f32 = r.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    /// Collects formatted log output from a scoped subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn lines_at(&self, level: &str) -> Vec<String> {
            let bytes = self.0.lock().expect("log buffer").clone();
            String::from_utf8(bytes)
                .expect("utf8 logs")
                .lines()
                .filter(|l| l.contains(level))
                .map(str::to_owned)
                .collect()
        }
    }

    #[test]
    fn missing_artifact_warns_exactly_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let c = tracing::subscriber::with_default(subscriber, || {
            Classifier::load(dir.path().join("absent.safetensors"))
        });
        assert!(c.is_degraded());

        let warnings = logs.lines_at("WARN");
        assert_eq!(warnings.len(), 1, "{warnings:?}");
        assert!(warnings[0].contains("using default parameters"));
        assert!(warnings[0].contains("absent.safetensors"));
    }

    #[test]
    fn saved_artifact_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("voice_classifier.safetensors");
        let original = Classifier::with_default_weights("test");
        original
            .save_weights(&path, Some(20), Some(0.0625))
            .expect("save");

        let loaded = Classifier::load(&path);
        assert!(!loaded.is_degraded());
        assert_eq!(
            loaded.weight_source(),
            &WeightSource::Trained {
                path: path.clone(),
                epoch: Some(20),
                loss: Some(0.0625),
            }
        );

        let data: Vec<f32> = (0..40 * 128).map(|i| (i as f32 * 0.37).sin() * 10.0).collect();
        let input = ModelInput::from_flat(data).expect("input");
        assert_eq!(loaded.logits(&input), original.logits(&input));
    }

    #[test]
    fn incompatible_artifact_falls_back_to_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("wrong.safetensors");
        save_f32_tensors(
            &path,
            &[(
                "conv1.weight".to_string(),
                TensorF32 {
                    shape: vec![32, 40, 3],
                    data: vec![0.0; 32 * 40 * 3],
                },
            )],
            TrainingMetadata::default(),
        )
        .expect("save");

        assert!(matches!(
            Classifier::try_load(&path),
            Err(WeightError::ShapeMismatch { .. })
        ));
        let c = Classifier::load(&path);
        assert!(c.is_degraded());
        assert!(c.predict(&ModelInput::zeros()).is_ok());
    }

    #[test]
    fn classifier_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Classifier>();

        let c = std::sync::Arc::new(Classifier::with_default_weights("test"));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let c = std::sync::Arc::clone(&c);
                std::thread::spawn(move || c.predict(&ModelInput::zeros()).expect("predict"))
            })
            .collect();
        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .collect();
        assert_eq!(results[0], results[1]);
    }
}
